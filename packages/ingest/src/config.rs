//! Run configuration.
//!
//! Settings come from a TOML file. `--config` names one explicitly;
//! otherwise `masters.toml` in the working directory is used when present,
//! and the embedded `config/default.toml` when not. CLI flags are applied
//! on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use masters_game_models::SourceDescriptor;
use masters_pgn::ParseOptions;
use masters_source::archive::DEFAULT_RECORD_SUFFIX;
use masters_source::registry::{self, RegistryError};
use masters_source::retry::RetryPolicy;
use serde::Deserialize;

use crate::classify::RatingClassifier;

/// Config file looked up in the working directory when `--config` is not
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "masters.toml";

const EMBEDDED_CONFIG: &str = include_str!("../config/default.toml");

/// Errors from loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid source list: {0}")]
    Registry(#[from] RegistryError),

    #[error("{field} must be at least 1")]
    ZeroSetting { field: &'static str },

    #[error("no sources configured")]
    NoSources,
}

/// Everything a run needs, after file and CLI values are merged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Prefix joined with each source's archive name. May be a local
    /// directory or `file://` URL for offline runs.
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Pause between consecutive source attempts.
    pub throttle_ms: u64,
    pub worker_count: usize,
    pub batch_size: usize,
    /// Extra attempts for transient download failures.
    pub download_retries: u32,
    /// Archive entry suffix holding the PGN text.
    pub record_suffix: String,
    /// Where the corpus JSON is written.
    pub output: PathBuf,
    /// Optional separate `[[sources]]` file, relative to the config file.
    pub sources_file: Option<PathBuf>,
    pub classifier: RatingClassifier,
    pub sources: Vec<SourceDescriptor>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let parse = ParseOptions::default();
        Self {
            base_url: "https://www.pgnmentor.com/players/".to_string(),
            user_agent: concat!("masters_ingest/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: masters_source::fetch::DEFAULT_TIMEOUT.as_secs(),
            throttle_ms: 1_000,
            worker_count: parse.worker_count,
            batch_size: parse.batch_size,
            download_retries: 0,
            record_suffix: DEFAULT_RECORD_SUFFIX.to_string(),
            output: PathBuf::from("data/masters.json"),
            sources_file: None,
            classifier: RatingClassifier::default(),
            sources: Vec::new(),
        }
    }
}

impl IngestConfig {
    /// Loads the configuration from `path`, the working-directory default,
    /// or the embedded default, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid
    /// TOML, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let Some(path) = path else {
            log::debug!("no {DEFAULT_CONFIG_FILE} found, using embedded defaults");
            return Self::parse(EMBEDDED_CONFIG);
        };

        log::info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: Self = toml::from_str(&text)?;
        if let Some(sources_file) = config.sources_file.clone() {
            let sources_path = path
                .parent()
                .map_or_else(|| sources_file.clone(), |dir| dir.join(&sources_file));
            config.sources = load_sources_file(&sources_path)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `text` is not valid TOML or fails
    /// validation.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero worker count or batch size, an
    /// empty source list, or duplicate source labels.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroSetting {
                field: "worker_count",
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroSetting {
                field: "batch_size",
            });
        }
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        registry::validate(&self.sources)?;
        Ok(())
    }

    #[must_use]
    pub const fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            worker_count: self.worker_count,
            batch_size: self.batch_size,
        }
    }

    #[must_use]
    pub const fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.download_retries)
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub throttle_ms: Option<u64>,
    pub worker_count: Option<usize>,
    pub batch_size: Option<usize>,
    pub download_retries: Option<u32>,
    pub output: Option<PathBuf>,
}

impl Overrides {
    /// Applies every set override to `config` and re-validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override breaks validation (e.g.,
    /// `--workers 0`).
    pub fn apply(self, config: &mut IngestConfig) -> Result<(), ConfigError> {
        if let Some(throttle_ms) = self.throttle_ms {
            config.throttle_ms = throttle_ms;
        }
        if let Some(worker_count) = self.worker_count {
            config.worker_count = worker_count;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(download_retries) = self.download_retries {
            config.download_retries = download_retries;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        config.validate()
    }
}

fn load_sources_file(path: &Path) -> Result<Vec<SourceDescriptor>, ConfigError> {
    log::info!("Loading sources from {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(registry::parse_sources_toml(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_is_valid() {
        let config = IngestConfig::parse(EMBEDDED_CONFIG).unwrap();
        assert!(!config.sources.is_empty());
        assert!(config.worker_count >= 1);
        assert_eq!(config.output, PathBuf::from("data/masters.json"));
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = IngestConfig::parse(
            r#"
[[sources]]
label = "Carlsen"
archive = "Carlsen.zip"
"#,
        )
        .unwrap();
        assert_eq!(config.throttle_ms, 1_000);
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert_eq!(config.record_suffix, ".pgn");
        assert_eq!(config.parse_options(), ParseOptions::default());
        assert!(config.classifier.require_players);
    }

    #[test]
    fn reads_classifier_table() {
        let config = IngestConfig::parse(
            r#"
throttle_ms = 0

[classifier]
min_rating = 2600
require_result = true

[[sources]]
label = "Carlsen"
archive = "Carlsen.zip"
"#,
        )
        .unwrap();
        assert_eq!(config.classifier.min_rating, Some(2600));
        assert!(config.classifier.require_result);
        assert!(config.classifier.require_players);
        assert_eq!(config.throttle(), Duration::ZERO);
    }

    #[test]
    fn rejects_zero_workers() {
        let err = IngestConfig::parse(
            r#"
worker_count = 0

[[sources]]
label = "Carlsen"
archive = "Carlsen.zip"
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ZeroSetting {
                field: "worker_count"
            }
        ));
    }

    #[test]
    fn rejects_empty_and_duplicate_sources() {
        assert!(matches!(
            IngestConfig::parse("batch_size = 10").unwrap_err(),
            ConfigError::NoSources
        ));

        let err = IngestConfig::parse(
            r#"
[[sources]]
label = "Carlsen"
archive = "Carlsen.zip"

[[sources]]
label = "Carlsen"
archive = "Carlsen2.zip"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Registry(_)));
    }

    #[test]
    fn loads_separate_sources_file() {
        let dir = std::env::temp_dir().join(format!("masters-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("sources.toml"),
            "[[sources]]\nlabel = \"Tal\"\narchive = \"Tal.zip\"\n",
        )
        .unwrap();
        let config_path = dir.join("masters.toml");
        std::fs::write(&config_path, "sources_file = \"sources.toml\"\n").unwrap();

        let config = IngestConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.sources, vec![SourceDescriptor::new("Tal", "Tal.zip")]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = IngestConfig::load(Some(Path::new("/nonexistent/masters.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().starts_with("failed to read /nonexistent/masters.toml"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = IngestConfig::parse(EMBEDDED_CONFIG).unwrap();
        Overrides {
            throttle_ms: Some(0),
            worker_count: Some(8),
            output: Some(PathBuf::from("/tmp/out.json")),
            ..Overrides::default()
        }
        .apply(&mut config)
        .unwrap();

        assert_eq!(config.throttle_ms, 0);
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.output, PathBuf::from("/tmp/out.json"));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut config = IngestConfig::parse(EMBEDDED_CONFIG).unwrap();
        let err = Overrides {
            batch_size: Some(0),
            ..Overrides::default()
        }
        .apply(&mut config)
        .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroSetting { field: "batch_size" }));
    }
}
