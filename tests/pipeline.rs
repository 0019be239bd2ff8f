use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chan_patterns::generator::recurrence::{collatz, fibonacci};
use chan_patterns::{fan_in, fan_out, CancelSignal, Error, PipelineConfig, StopReason};

fn collatz_terms(start: u64) -> Vec<u64> {
    collatz(start).start().unwrap().into_iter().collect()
}

#[test]
fn test_collatz_fan_in_fan_out() {
    let streams = [10, 20, 30].map(|start| collatz(start).start().unwrap());
    let merged = fan_in::merge(streams).unwrap();

    let counts = Mutex::new(HashMap::new());
    let report = fan_out::distribute(merged, 3, |term| {
        *counts.lock().unwrap().entry(term).or_insert(0usize) += 1;
    })
    .unwrap();

    let mut expected = HashMap::new();
    for start in [10, 20, 30] {
        for term in collatz_terms(start) {
            *expected.entry(term).or_insert(0usize) += 1;
        }
    }

    assert_eq!(report.total(), 34);
    assert_eq!(counts.into_inner().unwrap(), expected);
}

#[test]
fn test_cancel_stops_every_merged_generator() {
    let (signal, trigger) = CancelSignal::new();
    let handles: Vec<_> = (0..3)
        .map(|_| fibonacci().cancellable(signal.clone()).spawn().unwrap())
        .collect();
    let streams: Vec<_> = handles.iter().map(|h| h.stream().clone()).collect();
    let merged = fan_in::merge(streams).unwrap();

    let seen = AtomicUsize::new(0);
    let report = fan_out::distribute(merged, 2, |_| {
        if seen.fetch_add(1, Ordering::SeqCst) + 1 == 30 {
            trigger.trigger();
        }
    })
    .unwrap();

    assert!(report.total() >= 30);
    for handle in handles {
        assert_eq!(handle.join().unwrap(), StopReason::Cancelled);
    }
}

#[test]
fn test_configured_pipeline_with_buffering() {
    let config = PipelineConfig::from_toml_str(
        r#"
        handoff_capacity = 8
        workers = 4
        thread_prefix = "it"
        "#,
    )
    .unwrap();

    let streams = (1..=5u64)
        .map(|start| collatz(start).with_config(&config).start().unwrap())
        .collect::<Vec<_>>();
    let merged = fan_in::merge_with(&config, streams).unwrap();
    let report = fan_out::distribute_with(&config, merged, config.workers, |_, _| {}).unwrap();

    let expected: usize = (1..=5).map(|s| collatz_terms(s).len()).sum();
    assert_eq!(report.total(), expected);
    assert_eq!(report.workers(), 4);
}

#[test]
fn test_zero_workers_never_hangs() {
    let merged = fan_in::merge([collatz(7).start().unwrap()]).unwrap();
    assert!(matches!(
        fan_out::distribute(merged, 0, |_| {}),
        Err(Error::NoWorkers)
    ));
}
