//! Engine and runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Loaded configurations are validated before use.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WeftResult};

/// Query runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of query workers.
    pub workers: usize,
    /// Maximum queued queries.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1024,
        }
    }
}

/// Query engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum depth of nested queries issued while constructing parameters.
    /// Deeper queries resolve nothing.
    pub max_nested_query_depth: usize,
    /// Resolve independent target nodes on scoped threads.
    pub parallel_targets: bool,
    /// Upper bound on concurrently resolved target nodes.
    pub max_parallel_targets: usize,
    /// Treat empty strings as absent values.
    pub ignore_empty_strings: bool,
    /// Worker pool settings for [`QueryRuntime`](crate::QueryRuntime).
    pub runtime: RuntimeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_nested_query_depth: 8,
            parallel_targets: false,
            max_parallel_targets: 4,
            ignore_empty_strings: true,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> WeftResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidField {
            field: "config".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> WeftResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidField {
            field: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Checks every setting is usable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_parallel_targets == 0 {
            return Err(ValidationError::InvalidField {
                field: "max_parallel_targets".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.runtime.workers == 0 {
            return Err(ValidationError::InvalidField {
                field: "runtime.workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.runtime.queue_capacity == 0 {
            return Err(ValidationError::InvalidField {
                field: "runtime.queue_capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_nested_query_depth, 8);
        assert!(config.ignore_empty_strings);
    }

    #[test]
    fn partial_override() {
        let config =
            EngineConfig::from_json_str(r#"{"parallel_targets": true, "runtime": {"workers": 8}}"#).unwrap();
        assert!(config.parallel_targets);
        assert_eq!(config.runtime.workers, 8);
        assert_eq!(config.runtime.queue_capacity, 1024);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(EngineConfig::from_json_str(r#"{"max_parallel_targets": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"runtime": {"workers": 0}}"#).is_err());
        assert!(EngineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_nested_query_depth": 2}}"#).unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_nested_query_depth, 2);

        let missing = file.path().with_extension("missing");
        assert!(EngineConfig::from_file(missing).is_err());
    }
}
