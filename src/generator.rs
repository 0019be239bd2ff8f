//! Lazy recurrence generators.
//!
//! A generator owns its recurrence state on a dedicated thread and emits
//! one value at a time on a [`Stream`]. It stops when the recurrence
//! ends, when its step bound runs out, when every reader is gone, or
//! when its [`CancelSignal`] fires, whichever comes first.

use std::marker::PhantomData;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{select, Sender};
use tracing::{debug, trace};

use crate::cancel::CancelSignal;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::stream::{sender_channel, Stream};

/// Result of one state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T, S> {
    /// Emit the value and continue from the new state.
    Yield(T, S),
    /// Emit the value, then end the stream.
    Last(T),
    /// End the stream without emitting.
    Halt,
}

impl<T, S> Step<T, S> {
    /// Converts the emitted value, keeping the transition.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U, S> {
        match self {
            Step::Yield(value, state) => Step::Yield(f(value), state),
            Step::Last(value) => Step::Last(f(value)),
            Step::Halt => Step::Halt,
        }
    }
}

/// Why a generator closed its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The step bound was used up.
    Exhausted,
    /// The recurrence ended on its own.
    Finished,
    Cancelled,
    /// Every reader of the stream was dropped.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Stopping(StopReason),
    Closed(StopReason),
}

enum Delivery {
    Delivered,
    Cancelled,
    Disconnected,
}

pub type Recurrence<S, T> = fn(S) -> Step<T, S>;

// =============================================================================
// Builder
// =============================================================================

pub struct Generator<S, T, F> {
    seed: S,
    next_fn: F,
    bound: Option<usize>,
    cancel: Option<CancelSignal>,
    capacity: usize,
    name: String,
    _emits: PhantomData<fn() -> T>,
}

impl<S, T, F> Generator<S, T, F>
where
    S: Send + 'static,
    T: Send + 'static,
    F: FnMut(S) -> Step<T, S> + Send + 'static,
{
    /// A generator starting from `seed` and advancing with `next_fn`.
    pub fn new(seed: S, next_fn: F) -> Self {
        Self {
            seed,
            next_fn,
            bound: None,
            cancel: None,
            capacity: 0,
            name: "generator".to_string(),
            _emits: PhantomData,
        }
    }

    /// Stops after step `steps`, so at most `steps + 1` values are emitted.
    pub fn bounded(mut self, steps: usize) -> Self {
        self.bound = Some(steps);
        self
    }

    /// Races every emission against `signal`.
    pub fn cancellable(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Buffered slots on the output stream; 0 is a rendezvous.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(self, config: &PipelineConfig) -> Self {
        let name = format!("{}-generator", config.thread_prefix);
        self.capacity(config.handoff_capacity).named(name)
    }

    /// Starts the generator and detaches it.
    pub fn start(self) -> Result<Stream<T>> {
        Ok(self.spawn()?.into_stream())
    }

    /// Starts the generator, keeping a handle to its thread.
    pub fn spawn(self) -> Result<GeneratorHandle<T>> {
        let (sender, stream) = sender_channel(self.capacity);
        let name = self.name.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(sender))
            .map_err(|err| Error::spawn(name.clone(), err))?;

        Ok(GeneratorHandle {
            stream,
            name,
            thread,
        })
    }

    fn run(self, sender: Sender<T>) -> StopReason {
        let Generator {
            seed,
            mut next_fn,
            bound,
            cancel,
            name,
            ..
        } = self;

        let mut phase = Phase::Running;
        debug!(generator = %name, "running");

        // Emissions left; `None` means unbounded.
        let mut remaining = bound.map(|steps| steps.saturating_add(1));
        let mut state = Some(seed);

        while phase == Phase::Running {
            if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                phase = Phase::Stopping(StopReason::Cancelled);
                break;
            }
            if remaining == Some(0) {
                phase = Phase::Stopping(StopReason::Exhausted);
                break;
            }
            let Some(current) = state.take() else {
                phase = Phase::Stopping(StopReason::Finished);
                break;
            };
            let (value, next) = match next_fn(current) {
                Step::Yield(value, next) => (value, Some(next)),
                Step::Last(value) => (value, None),
                Step::Halt => {
                    phase = Phase::Stopping(StopReason::Finished);
                    break;
                }
            };

            match deliver(&sender, cancel.as_ref(), value) {
                Delivery::Delivered => {
                    trace!(generator = %name, "emitted");
                    remaining = remaining.map(|left| left - 1);
                    state = next;
                }
                Delivery::Cancelled => phase = Phase::Stopping(StopReason::Cancelled),
                Delivery::Disconnected => phase = Phase::Stopping(StopReason::Disconnected),
            }
        }

        let Phase::Stopping(reason) = phase else {
            unreachable!("generator loop exits only through Stopping");
        };
        drop(state);
        drop(sender);
        phase = Phase::Closed(reason);
        debug!(generator = %name, ?phase, "stream closed");
        reason
    }
}

/// Emits `value`, or gives up as soon as `cancel` fires. When both are
/// ready the select picks one at random.
fn deliver<T>(sender: &Sender<T>, cancel: Option<&CancelSignal>, value: T) -> Delivery {
    let Some(cancel) = cancel else {
        return match sender.send(value) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Disconnected,
        };
    };

    select! {
        send(sender, value) -> res => match res {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Disconnected,
        },
        recv(cancel.receiver()) -> _ => Delivery::Cancelled,
    }
}

// =============================================================================
// Running generator
// =============================================================================

pub struct GeneratorHandle<T> {
    stream: Stream<T>,
    name: String,
    thread: JoinHandle<StopReason>,
}

impl<T> GeneratorHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The generator's output. Clone it for more competing readers.
    pub fn stream(&self) -> &Stream<T> {
        &self.stream
    }

    /// Keeps the output and detaches the thread.
    pub fn into_stream(self) -> Stream<T> {
        self.stream
    }

    /// Drops this handle's reader and waits for the generator thread.
    ///
    /// Other clones of the stream keep the generator alive until they are
    /// dropped too.
    pub fn join(self) -> Result<StopReason> {
        let GeneratorHandle {
            stream,
            name,
            thread,
        } = self;
        drop(stream);
        thread
            .join()
            .map_err(|_| Error::GeneratorPanicked { name })
    }
}

// =============================================================================
// Recurrences
// =============================================================================

pub mod recurrence {
    use super::{Generator, Recurrence, Step};

    /// `0, 1, 1, 2, 3, 5, ...`, ending before the next term would
    /// overflow `u64`.
    pub fn fibonacci_step((a, b): (u64, u64)) -> Step<u64, (u64, u64)> {
        match a.checked_add(b) {
            Some(next) => Step::Yield(a, (b, next)),
            None => Step::Last(a),
        }
    }

    /// Collatz trajectory from `n` down to 1. Halts at once for 0 and
    /// stops early if `3n + 1` overflows.
    pub fn collatz_step(n: u64) -> Step<u64, u64> {
        match n {
            0 => Step::Halt,
            1 => Step::Last(1),
            n if n % 2 == 0 => Step::Yield(n, n / 2),
            n => match n.checked_mul(3).and_then(|m| m.checked_add(1)) {
                Some(next) => Step::Yield(n, next),
                None => Step::Last(n),
            },
        }
    }

    fn advance<I: Iterator>(mut iter: I) -> Step<I::Item, I> {
        match iter.next() {
            Some(value) => Step::Yield(value, iter),
            None => Step::Halt,
        }
    }

    /// Replays the items of `values`, one per step.
    pub fn from_iter<I>(values: I) -> Generator<I::IntoIter, I::Item, Recurrence<I::IntoIter, I::Item>>
    where
        I: IntoIterator,
        I::IntoIter: Send + 'static,
        I::Item: Send + 'static,
    {
        Generator::new(
            values.into_iter(),
            advance::<I::IntoIter> as Recurrence<I::IntoIter, I::Item>,
        )
    }

    pub fn fibonacci() -> Generator<(u64, u64), u64, Recurrence<(u64, u64), u64>> {
        Generator::new((0, 1), fibonacci_step as Recurrence<(u64, u64), u64>)
    }

    pub fn collatz(start: u64) -> Generator<u64, u64, Recurrence<u64, u64>> {
        Generator::new(start, collatz_step as Recurrence<u64, u64>)
    }
}
