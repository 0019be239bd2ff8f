//! Channel composition patterns
//!
//! Producer/consumer building blocks on top of `crossbeam::channel`:
//!
//! - [`generator`]: a thread that lazily emits a recurrence on a [`Stream`],
//!   bounded by a step count or stopped early through a [`CancelSignal`].
//! - [`fan_in`]: merge several streams into one.
//! - [`fan_out`]: spread one stream over competing workers.
//! - [`tracker`]: the wait-group used at every merge/split point.
//!
//! ```
//! use chan_patterns::{fan_in, fan_out, generator::recurrence, Generator};
//!
//! let streams = [10, 20, 30]
//!     .into_iter()
//!     .map(|start| Generator::new(start, recurrence::collatz_step).start())
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//!
//! let merged = fan_in::merge(streams).unwrap();
//! let report = fan_out::distribute(merged, 3, |n| println!("{}", n)).unwrap();
//! assert_eq!(report.total(), 7 + 8 + 19);
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod fan_in;
pub mod fan_out;
pub mod generator;
pub mod stream;
pub mod tracker;

pub use cancel::{CancelSignal, CancelTrigger};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use fan_out::Distribution;
pub use generator::{Generator, GeneratorHandle, Step, StopReason};
pub use stream::{channel, Emitter, Stream, StreamError};
pub use tracker::CompletionTracker;
