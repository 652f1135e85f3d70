//! Service configuration
//!
//! Every tunable has a default here. The `docscout` binary overrides them
//! from command-line flags, each of which falls back to an environment
//! variable (see `src/main.rs`).

use std::time::Duration;

use crate::agent::AgentConfig;
use crate::corpus::CorpusConfig;

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: String,
    /// Base URL of the Ollama server
    pub ollama_url: String,
    /// Burst capacity of the /api/rag rate limiter
    pub rate_limit_burst: u64,
    /// Sustained queries per second admitted by the rate limiter
    pub rate_limit_per_sec: f64,
    /// Upper bound on one query, model calls included
    pub request_timeout_secs: u64,
    /// OTLP collector endpoint; traces are only exported when set
    pub otlp_endpoint: Option<String>,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            rate_limit_burst: 20,
            rate_limit_per_sec: 2.0,
            request_timeout_secs: 120,
            otlp_endpoint: None,
            log_json: false,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub agent: AgentConfig,
    pub corpus: CorpusConfig,
    pub server: ServerConfig,
}

/// Error type for invalid configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric setting is out of range
    OutOfRange { field: &'static str, message: String },
    /// A required list is empty
    Empty(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::OutOfRange { field, message } => write!(f, "{}: {}", field, message),
            ConfigError::Empty(field) => write!(f, "{} must not be empty", field),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Check the settings that would otherwise fail at request time
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_steps",
                message: "must be at least 1".to_string(),
            });
        }
        if self.corpus.extensions.is_empty() {
            return Err(ConfigError::Empty("extensions"));
        }
        if self.corpus.default_read_limit == 0
            || self.corpus.default_read_limit > self.corpus.max_read_limit
        {
            return Err(ConfigError::OutOfRange {
                field: "default_read_limit",
                message: format!("must be between 1 and {}", self.corpus.max_read_limit),
            });
        }
        if self.corpus.default_max_results == 0
            || self.corpus.default_max_results > self.corpus.max_results_limit
        {
            return Err(ConfigError::OutOfRange {
                field: "default_max_results",
                message: format!("must be between 1 and {}", self.corpus.max_results_limit),
            });
        }
        if self.server.rate_limit_burst == 0 || self.server.rate_limit_per_sec <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "rate_limit",
                message: "burst and rate must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_steps, 15);
        assert_eq!(config.corpus.default_max_results, 20);
        assert_eq!(config.corpus.default_read_limit, 200);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_steps() {
        let mut config = Config::default();
        config.agent.max_steps = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "max_steps", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inconsistent_limits() {
        let mut config = Config::default();
        config.corpus.default_max_results = 500;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.corpus.extensions.clear();
        assert_eq!(config.validate(), Err(ConfigError::Empty("extensions")));
    }
}
