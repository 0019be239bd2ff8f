use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the composition stages.
///
/// Cancellation is not represented here: a cancelled generator simply
/// closes its stream early and reports [`crate::StopReason::Cancelled`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("generator thread '{name}' panicked")]
    GeneratorPanicked { name: String },

    #[error("fan-out needs at least one worker")]
    NoWorkers,

    #[error("fan-out worker {worker} panicked while consuming")]
    WorkerPanicked { worker: usize },

    #[error("completion tracker released more times than its {registered} registered parties")]
    TrackerOverflow { registered: usize },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn spawn(name: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            source,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
