//! Pipeline tuning loaded from TOML.
//!
//! ```toml
//! handoff_capacity = 0   # 0 = rendezvous, like an unbuffered channel
//! workers = 3
//! thread_prefix = "chan"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Buffered slots between a producer and its readers.
    pub handoff_capacity: usize,
    /// Fan-out worker count used by the host programs.
    pub workers: usize,
    /// Prefix for every spawned thread name.
    pub thread_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            handoff_capacity: 0,
            workers: 3,
            thread_prefix: "chan".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.thread_prefix.trim().is_empty() {
            return Err(Error::Config("thread_prefix must not be empty".into()));
        }
        Ok(())
    }

    pub(crate) fn thread_name(&self, role: &str, index: usize) -> String {
        format!("{}-{}-{}", self.thread_prefix, role, index)
    }
}
