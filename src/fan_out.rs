//! Spreading one stream over competing workers.

use std::fmt::Display;
use std::thread;

use tracing::{debug, trace, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::stream::Stream;
use crate::tracker::CompletionTracker;

/// How many values each worker consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    per_worker: Vec<usize>,
}

impl Distribution {
    pub fn total(&self) -> usize {
        self.per_worker.iter().sum()
    }

    pub fn per_worker(&self) -> &[usize] {
        &self.per_worker
    }

    pub fn workers(&self) -> usize {
        self.per_worker.len()
    }
}

/// Consumes `stream` on `worker_count` threads and blocks until it is
/// drained.
///
/// Each value goes to exactly one worker; which one is unspecified.
pub fn distribute<T, F>(stream: Stream<T>, worker_count: usize, consume: F) -> Result<Distribution>
where
    T: Display + Send,
    F: Fn(T) + Sync,
{
    distribute_indexed(stream, worker_count, |_, value| consume(value))
}

/// Like [`distribute`], but `consume` also receives the worker index.
pub fn distribute_indexed<T, F>(
    stream: Stream<T>,
    worker_count: usize,
    consume: F,
) -> Result<Distribution>
where
    T: Display + Send,
    F: Fn(usize, T) + Sync,
{
    distribute_with(&PipelineConfig::default(), stream, worker_count, consume)
}

/// Fan-out with explicit thread naming.
///
/// Returns only after every worker has seen the stream close and finished
/// the value it was consuming. A worker whose `consume` panics is
/// reported as [`Error::WorkerPanicked`] once the others have drained.
/// If a worker thread cannot be spawned, the workers already running
/// still drain the stream before the error is returned.
pub fn distribute_with<T, F>(
    config: &PipelineConfig,
    stream: Stream<T>,
    worker_count: usize,
    consume: F,
) -> Result<Distribution>
where
    T: Display + Send,
    F: Fn(usize, T) + Sync,
{
    if worker_count == 0 {
        return Err(Error::NoWorkers);
    }

    let tracker = CompletionTracker::new(worker_count);
    let consume = &consume;

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(worker_count);

        for worker in 0..worker_count {
            let input = stream.clone();
            let tracker = &tracker;
            let name = config.thread_name("worker", worker);

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn_scoped(scope, move || {
                    let _done = tracker.guard();
                    let mut processed = 0usize;
                    for value in input {
                        trace!(worker, value = %value, "consuming");
                        consume(worker, value);
                        processed += 1;
                    }
                    debug!(worker, processed, "input drained");
                    processed
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => return Err(Error::spawn(name, err)),
            }
        }
        drop(stream);

        tracker.wait();

        let mut per_worker = Vec::with_capacity(worker_count);
        let mut panicked = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(processed) => per_worker.push(processed),
                Err(_) => {
                    warn!(worker, "worker panicked");
                    per_worker.push(0);
                    if panicked.is_none() {
                        panicked = Some(worker);
                    }
                }
            }
        }

        match panicked {
            Some(worker) => Err(Error::WorkerPanicked { worker }),
            None => Ok(Distribution { per_worker }),
        }
    })
}
