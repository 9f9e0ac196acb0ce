use crate::logic::batch::BatchScheduler;
use crate::logic::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub batch: BatchConfig,
    pub retry: RetryConfig,
    pub demo: DemoConfig,
}

/// Which driver adapter fronts the graph store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Traversal backend: ID-driven, batched phases
    #[default]
    Gremlin,
    /// Legacy query-language backend: bulk phases with retry
    Cypher,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub reader_batch_size: usize,
    pub writer_batch_size: usize,
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

/// Hierarchy built by the demo binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    pub instance_id: String,
    pub dimension_name: String,
    pub code_list_id: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            reader_batch_size: 1000,
            writer_batch_size: 150,
            max_workers: 10,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 20,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            instance_id: "cpih-2021-1".to_string(),
            dimension_name: "aggregate".to_string(),
            code_list_id: "cpih1dim1aggid".to_string(),
        }
    }
}

impl BatchConfig {
    pub fn reader(&self) -> BatchScheduler {
        BatchScheduler::new(self.reader_batch_size, self.max_workers)
    }

    pub fn writer(&self) -> BatchScheduler {
        BatchScheduler::new(self.writer_batch_size, self.max_workers)
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Environment variables, e.g. HIERARCHY_BATCH__MAX_WORKERS=4
        config = config.add_source(
            config::Environment::with_prefix("HIERARCHY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.backend, BackendKind::Gremlin);
        assert_eq!(config.batch.reader().batch_size(), 1000);
        assert_eq!(config.batch.writer().batch_size(), 150);
        assert_eq!(config.batch.writer().max_workers(), 10);
        assert_eq!(config.retry.policy().max_attempts(), 5);
    }

    #[test]
    fn test_backend_kind_is_lowercase() {
        let kind: BackendKind = serde_json::from_str("\"cypher\"").unwrap();
        assert_eq!(kind, BackendKind::Cypher);
        assert_eq!(serde_json::to_string(&BackendKind::Gremlin).unwrap(), "\"gremlin\"");
    }

    #[test]
    fn test_load_without_file_or_env_uses_defaults() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.demo.code_list_id, "cpih1dim1aggid");
    }
}
