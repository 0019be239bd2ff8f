//! Merging many producers into one stream.

use std::sync::Arc;
use std::thread;

use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::stream::{channel, Emitter, Stream};
use crate::tracker::CompletionTracker;

/// Merges `streams` into one, using the default config.
///
/// See [`merge_with`].
pub fn merge<T, I>(streams: I) -> Result<Stream<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Stream<T>>,
{
    merge_with(&PipelineConfig::default(), streams)
}

/// Merges `streams` into one.
///
/// One relay thread per input copies its values to the merged stream, in
/// that input's order. Values from different inputs interleave freely.
/// The merged stream closes once, after every input has closed.
pub fn merge_with<T, I>(config: &PipelineConfig, streams: I) -> Result<Stream<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Stream<T>>,
{
    let streams: Vec<Stream<T>> = streams.into_iter().collect();
    let (emitter, merged) = channel(config.handoff_capacity);
    let tracker = Arc::new(CompletionTracker::new(streams.len()));

    for (index, input) in streams.into_iter().enumerate() {
        let out = share(&emitter);
        let tracker = Arc::clone(&tracker);
        let name = config.thread_name("relay", index);

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let done = tracker.guard();
                let mut relayed = 0usize;
                for value in input {
                    if out.emit(value).is_err() {
                        debug!(relay = index, "merged stream has no readers");
                        break;
                    }
                    relayed += 1;
                }
                // Release the share before reporting, so the closer's
                // close is the last one.
                drop(out);
                trace!(relay = index, relayed, "input closed");
                drop(done);
            })
            .map_err(|err| Error::spawn(name, err))?;
    }

    spawn_closer(config, "fan-in", tracker, emitter)?;
    Ok(merged)
}

/// Runs `producers` threads that all write to one stream.
///
/// Each producer gets its index and a shared emitter; the stream closes
/// once every producer has returned.
pub fn gather<T, F>(producers: usize, produce: F) -> Result<Stream<T>>
where
    T: Send + 'static,
    F: Fn(usize, &Emitter<T>) + Send + Sync + 'static,
{
    gather_with(&PipelineConfig::default(), producers, produce)
}

pub fn gather_with<T, F>(config: &PipelineConfig, producers: usize, produce: F) -> Result<Stream<T>>
where
    T: Send + 'static,
    F: Fn(usize, &Emitter<T>) + Send + Sync + 'static,
{
    let (emitter, gathered) = channel(config.handoff_capacity);
    let tracker = Arc::new(CompletionTracker::new(producers));
    let produce = Arc::new(produce);

    for index in 0..producers {
        let out = share(&emitter);
        let tracker = Arc::clone(&tracker);
        let produce = Arc::clone(&produce);
        let name = config.thread_name("producer", index);

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let done = tracker.guard();
                produce(index, &out);
                drop(out);
                trace!(producer = index, "producer returned");
                drop(done);
            })
            .map_err(|err| Error::spawn(name, err))?;
    }

    spawn_closer(config, "gather", tracker, emitter)?;
    Ok(gathered)
}

fn share<T>(emitter: &Emitter<T>) -> Emitter<T> {
    match emitter.share() {
        Some(out) => out,
        // Only the closer thread closes the original.
        None => unreachable!("emitter closed before its closer started"),
    }
}

fn spawn_closer<T: Send + 'static>(
    config: &PipelineConfig,
    stage: &str,
    tracker: Arc<CompletionTracker>,
    mut emitter: Emitter<T>,
) -> Result<()> {
    let name = format!("{}-{}-closer", config.thread_prefix, stage);
    let stage = stage.to_string();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            tracker.wait();
            emitter.close();
            debug!(stage = %stage, "output closed");
        })
        .map(drop)
        .map_err(|err| Error::spawn(name, err))
}

#[cfg(test)]
mod tests {
    use super::{gather, merge, merge_with};
    use crate::config::PipelineConfig;
    use crate::generator::recurrence::{collatz, from_iter};
    use crate::stream::{channel, Emitter, Recv, Stream};
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn sorted(mut values: Vec<u64>) -> Vec<u64> {
        values.sort_unstable();
        values
    }

    #[test]
    fn test_merge_collatz_streams() {
        let inputs = vec![
            collatz(10).start().unwrap(),
            collatz(20).start().unwrap(),
            collatz(30).start().unwrap(),
        ];
        let merged: Vec<u64> = merge(inputs).unwrap().into_iter().collect();
        assert_eq!(merged.len(), 7 + 8 + 19);
        assert_eq!(merged.iter().filter(|&&n| n == 1).count(), 3);
    }

    #[test]
    fn test_merge_keeps_per_input_order() {
        let evens = from_iter((0..50u64).map(|n| n * 2)).start().unwrap();
        let odds = from_iter((0..50u64).map(|n| n * 2 + 1)).start().unwrap();

        let merged: Vec<u64> = merge([evens, odds]).unwrap().into_iter().collect();
        let even_order: Vec<u64> = merged.iter().copied().filter(|n| n % 2 == 0).collect();
        let odd_order: Vec<u64> = merged.iter().copied().filter(|n| n % 2 == 1).collect();
        assert_eq!(even_order, (0..50).map(|n| n * 2).collect::<Vec<_>>());
        assert_eq!(odd_order, (0..50).map(|n| n * 2 + 1).collect::<Vec<_>>());
    }

    #[test]
    fn test_merge_nothing_closes_immediately() {
        let merged = merge(Vec::<Stream<u64>>::new()).unwrap();
        assert_eq!(merged.recv_timeout(Duration::from_secs(1)), Recv::Closed);
    }

    #[test]
    fn test_merge_waits_for_slowest_input() {
        let (mut open, pending) = channel(0);
        let done = from_iter([1u64, 2]).start().unwrap();
        let merged = merge([done, pending]).unwrap();

        assert_eq!(sorted(vec![merged.recv().unwrap(), merged.recv().unwrap()]), vec![1, 2]);
        assert_eq!(merged.recv_timeout(Duration::from_millis(50)), Recv::Pending);

        open.emit(3).unwrap();
        assert_eq!(merged.recv(), Some(3));
        open.close();
        assert_eq!(merged.recv_timeout(Duration::from_secs(1)), Recv::Closed);
    }

    #[test]
    fn test_gather_several_senders() {
        let gathered = gather(2, |sender, out: &Emitter<String>| {
            for v in 0..3 {
                out.emit(format!("{} from sender {}", v, sender)).unwrap();
            }
        })
        .unwrap();

        let messages: HashSet<String> = gathered.into_iter().collect();
        assert_eq!(messages.len(), 6);
        assert!(messages.contains("2 from sender 1"));
    }

    #[test]
    fn test_gather_zero_producers() {
        let gathered = gather(0, |_, _: &Emitter<u8>| {}).unwrap();
        assert_eq!(gathered.recv(), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_merge_conserves_values(inputs in prop::collection::vec(prop::collection::vec(any::<u64>(), 0..20), 0..6)) {
            let config = PipelineConfig { handoff_capacity: 2, ..PipelineConfig::default() };
            let streams: Vec<Stream<u64>> = inputs
                .iter()
                .map(|values| from_iter(values.clone()).start().unwrap())
                .collect();

            let merged: Vec<u64> = merge_with(&config, streams).unwrap().into_iter().collect();
            let expected: Vec<u64> = inputs.into_iter().flatten().collect();
            prop_assert_eq!(sorted(merged), sorted(expected));
        }
    }
}
