//! Streams over a crossbeam channel. The owner of an [`Emitter`] can
//! share it with other writers.
//!
//! [`Emitter`] is the write half, [`Stream`] the read half. A stream is
//! closed once every emitter feeding it is closed or dropped; readers
//! then drain whatever is still buffered and see the end of the stream.

use std::fmt;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use thiserror::Error;
use tracing::trace;

/// Creates a stream with `capacity` buffered slots.
///
/// A capacity of 0 makes every [`Emitter::emit`] a rendezvous: it returns
/// only once a reader has taken the value.
pub fn channel<T>(capacity: usize) -> (Emitter<T>, Stream<T>) {
    let (tx, stream) = sender_channel(capacity);
    (Emitter { tx: Some(tx) }, stream)
}

/// Like [`channel`], for a writer that closes by dropping its sender.
pub(crate) fn sender_channel<T>(capacity: usize) -> (Sender<T>, Stream<T>) {
    let (tx, rx) = bounded(capacity);
    (tx, Stream { rx })
}

/// Why a value could not be emitted. The value is handed back.
#[derive(Error, PartialEq, Eq, Clone, Copy)]
pub enum StreamError<T> {
    #[error("emitting on a closed stream")]
    Closed(T),
    #[error("every reader of the stream is gone")]
    Disconnected(T),
}

impl<T> StreamError<T> {
    pub fn into_inner(self) -> T {
        match self {
            StreamError::Closed(value) | StreamError::Disconnected(value) => value,
        }
    }
}

impl<T> fmt::Debug for StreamError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Closed(_) => f.write_str("Closed(..)"),
            StreamError::Disconnected(_) => f.write_str("Disconnected(..)"),
        }
    }
}

/// Outcome of a non-blocking or timed read.
#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    Value(T),
    /// Nothing arrived yet; the stream is still open.
    Pending,
    Closed,
}

// =============================================================================
// Write half
// =============================================================================

pub struct Emitter<T> {
    tx: Option<Sender<T>>,
}

impl<T> Emitter<T> {
    /// Sends `value`, blocking until there is room for it (or, with a
    /// rendezvous stream, until a reader takes it).
    pub fn emit(&self, value: T) -> Result<(), StreamError<T>> {
        let Some(tx) = &self.tx else {
            return Err(StreamError::Closed(value));
        };
        tx.send(value)
            .map_err(|err| StreamError::Disconnected(err.into_inner()))
    }

    /// Closes this emitter. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.tx.take().is_some() {
            trace!("emitter closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Another writer for the same stream. The stream stays open until
    /// every share is closed. Returns `None` once this emitter is closed.
    pub fn share(&self) -> Option<Emitter<T>> {
        self.tx.as_ref().map(|tx| Emitter {
            tx: Some(tx.clone()),
        })
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Read half
// =============================================================================

/// Read capability of a stream.
///
/// Cloning gives a competing reader: every value is still delivered to
/// exactly one of the clones.
pub struct Stream<T> {
    rx: Receiver<T>,
}

impl<T> Stream<T> {
    /// Blocks for the next value. `None` means the stream is closed and
    /// fully drained.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Recv<T> {
        match self.rx.try_recv() {
            Ok(value) => Recv::Value(value),
            Err(TryRecvError::Empty) => Recv::Pending,
            Err(TryRecvError::Disconnected) => Recv::Closed,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Recv<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Recv::Value(value),
            Err(RecvTimeoutError::Timeout) => Recv::Pending,
            Err(RecvTimeoutError::Disconnected) => Recv::Closed,
        }
    }

    /// Values already buffered and not yet read.
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter { stream: self }
    }
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("buffered", &self.rx.len())
            .finish()
    }
}

pub struct Iter<'a, T> {
    stream: &'a Stream<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.stream.recv()
    }
}

pub struct IntoIter<T> {
    stream: Stream<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.stream.recv()
    }
}

impl<T> IntoIterator for Stream<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { stream: self }
    }
}

impl<'a, T> IntoIterator for &'a Stream<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_between_one_pair() {
        let (tx, rx) = channel(0);
        let producer = thread::spawn(move || {
            for i in 0..5 {
                tx.emit(i).unwrap();
            }
        });

        let values: Vec<i32> = rx.into_iter().collect();
        producer.join().unwrap();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut tx, rx) = channel::<u8>(1);
        tx.close();
        tx.close();
        assert!(tx.is_closed());
        assert_eq!(rx.recv(), None);
        assert_eq!(rx.try_recv(), Recv::Closed);
    }

    #[test]
    fn test_emit_after_close_returns_value() {
        let (mut tx, _rx) = channel(1);
        tx.close();
        let err = tx.emit(7).unwrap_err();
        assert_eq!(err, StreamError::Closed(7));
        assert_eq!(err.into_inner(), 7);
    }

    #[test]
    fn test_emit_without_readers_disconnects() {
        let (tx, rx) = channel(1);
        drop(rx);
        assert_eq!(tx.emit("lost"), Err(StreamError::Disconnected("lost")));
    }

    #[test]
    fn test_buffered_values_survive_close() {
        let (mut tx, rx) = channel(2);
        tx.emit(1).unwrap();
        tx.emit(2).unwrap();
        tx.close();
        assert_eq!(rx.buffered(), 2);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_shared_emitters_keep_stream_open() {
        let (mut tx, rx) = channel(4);
        let mut second = tx.share().unwrap();
        tx.close();
        assert!(tx.share().is_none());

        second.emit(9).unwrap();
        assert_eq!(rx.try_recv(), Recv::Value(9));
        assert_eq!(rx.try_recv(), Recv::Pending);

        second.close();
        assert_eq!(rx.recv_timeout(Duration::from_millis(50)), Recv::Closed);
    }

    #[test]
    fn test_cloned_readers_compete() {
        let (mut tx, rx) = channel(8);
        let other = rx.clone();
        for i in 0..8 {
            tx.emit(i).unwrap();
        }
        tx.close();

        let mut seen: Vec<i32> = Vec::new();
        seen.extend(rx.recv());
        seen.extend(other.iter());
        seen.extend(rx.iter());
        seen.sort();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}
