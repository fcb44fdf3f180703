use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Default project config file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "clinrefine.yaml";

/// Prefix of environment overrides; `__` separates nested keys
pub const ENV_PREFIX: &str = "CLINREFINE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid parallelism: {0}. Must be between 1 and 64")]
    InvalidParallelism(usize),

    #[error("Invalid iterations: {0}. Must be at least 1")]
    InvalidIterations(u32),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: compact, pretty, json")]
    InvalidLogFormat(String),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("{0} cannot be empty")]
    EmptyValue(&'static str),

    #[error("{0} must be greater than 0")]
    ZeroValue(&'static str),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `clinrefine.yaml` in the working directory, or the explicit `path`
    /// 3. Environment variables (`CLINREFINE_*`, `__` for nesting)
    ///
    /// CLI flags are applied by the caller on top of the result, which must
    /// then be re-validated.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let file = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                p.to_path_buf()
            }
            None => Path::new(DEFAULT_CONFIG_FILE).to_path_buf(),
        };

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration (file: {})", file.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let refine = &config.refine;
        if refine.parallelism == 0 || refine.parallelism > 64 {
            return Err(ConfigError::InvalidParallelism(refine.parallelism));
        }
        if refine.iterations == 0 {
            return Err(ConfigError::InvalidIterations(refine.iterations));
        }
        if refine.max_failures_for_judge == 0 {
            return Err(ConfigError::ZeroValue("refine.max_failures_for_judge"));
        }

        if config.server.url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("server.url"));
        }
        if config.server.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("server.request_timeout_secs"));
        }
        if config.server.initial_backoff_ms > config.server.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.server.initial_backoff_ms,
                config.server.max_backoff_ms,
            ));
        }

        if config.llm.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("llm.base_url"));
        }
        if config.llm.model.trim().is_empty() {
            return Err(ConfigError::EmptyValue("llm.model"));
        }
        if config.llm.timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("llm.timeout_secs"));
        }
        if config.llm.rate_limit_rps <= 0.0 || config.llm.rate_limit_rps.is_nan() {
            return Err(ConfigError::InvalidRateLimit(config.llm.rate_limit_rps));
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["compact", "pretty", "json"];
        if !valid_log_formats.contains(&config.logging.format.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refine.iterations, 5);
        assert_eq!(config.refine.parallelism, 3);
        assert_eq!(config.refine.max_failures_for_judge, 20);
        assert_eq!(config.server.url, "http://localhost:8080");
        assert_eq!(config.paths.prompts_file.to_str(), Some("prompts.json"));
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
server:
  url: http://diag:9000
refine:
  iterations: 3
  parallelism: 8
llm:
  model: other-model
logging:
  level: debug
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.server.url, "http://diag:9000");
        assert_eq!(config.server.request_timeout_secs, 90);
        assert_eq!(config.refine.iterations, 3);
        assert_eq!(config.refine.parallelism, 8);
        assert_eq!(config.refine.min_prompt_chars, 50);
        assert_eq!(config.llm.model, "other-model");
        assert_eq!(config.logging.level, "debug");
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_parallelism_bounds() {
        let mut config = Config::default();
        config.refine.parallelism = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidParallelism(0))
        ));

        config.refine.parallelism = 65;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidParallelism(65))
        ));

        config.refine.parallelism = 64;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_iterations() {
        let mut config = Config::default();
        config.refine.iterations = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidIterations(0))
        ));
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogFormat(format)) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidLogFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_backoff_ordering() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 10_000;
        config.retry.max_backoff_ms = 1_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(10_000, 1_000))
        ));
    }

    #[test]
    fn test_validate_rate_limit() {
        let mut config = Config::default();
        config.llm.rate_limit_rps = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(_))
        ));
    }

    #[test]
    fn test_load_file_then_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "refine:\n  iterations: 7\n  parallelism: 2\nserver:\n  url: http://from-file:1").unwrap();

        temp_env::with_vars(
            [
                ("CLINREFINE_REFINE__PARALLELISM", Some("12")),
                ("CLINREFINE_SERVER__URL", None::<&str>),
            ],
            || {
                let config = ConfigLoader::load(Some(file.path())).unwrap();
                assert_eq!(config.refine.iterations, 7);
                assert_eq!(config.refine.parallelism, 12);
                assert_eq!(config.server.url, "http://from-file:1");
            },
        );
    }

    #[test]
    fn test_load_rejects_invalid_env_value() {
        temp_env::with_var("CLINREFINE_REFINE__PARALLELISM", Some("0"), || {
            let err = ConfigLoader::load(None).unwrap_err();
            assert!(err.downcast_ref::<ConfigError>().is_some());
        });
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let err = ConfigLoader::load(Some(Path::new("/nonexistent/clinrefine.yaml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
