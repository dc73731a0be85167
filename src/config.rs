use std::sync::OnceLock;
use std::{fs, path::Path};

use log::{warn, LevelFilter};
use serde::Deserialize;

use crate::feature::FeatureThreadStrategy;

pub mod error;

use error::{ConfigError, ConfigResult};

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "MVI_LOG";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MviConfig {
    #[serde(default)]
    pub feature: FeatureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Fail a feature whose reducer runs off the thread that built it.
    #[serde(default)]
    pub verify_same_thread: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> ConfigResult<LevelFilter> {
        self.level
            .parse()
            .map_err(|_| {
                ConfigError::invalid("logging.level", self.level.as_str(), "one of off, error, warn, info, debug, trace")
            })
    }
}

impl MviConfig {
    pub fn from_toml_str(toml_str: &str) -> ConfigResult<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|source| ConfigError::Malformed { source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(name) = &self.feature.name {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("feature.name", name.as_str(), "a non-blank name"));
            }
        }
        self.logging.level_filter().map(|_| ())
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Installs `env_logger` with the configured level. `MVI_LOG` takes precedence.
/// Later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    let env = env_logger::Env::default().filter_or(LOG_ENV, config.level.as_str());
    let _ = env_logger::Builder::from_env(env).try_init();
}

static DEFAULT_THREAD_STRATEGY: OnceLock<FeatureThreadStrategy> = OnceLock::new();

/// Sets the strategy used by features built without an explicit one.
///
/// Write-once: returns `false` and leaves the default untouched if it was
/// already set, or already read by a feature (which locks it to
/// [`FeatureThreadStrategy::ExecuteOnCurrentThread`]).
pub fn set_default_thread_strategy(strategy: FeatureThreadStrategy) -> bool {
    match DEFAULT_THREAD_STRATEGY.set(strategy) {
        Ok(()) => true,
        Err(ignored) => {
            warn!(
                "Default thread strategy is already locked to {:?}, ignoring {:?}",
                default_thread_strategy(),
                ignored
            );
            false
        }
    }
}

/// The process-wide default strategy. Reading it locks it.
pub fn default_thread_strategy() -> FeatureThreadStrategy {
    DEFAULT_THREAD_STRATEGY
        .get_or_init(|| FeatureThreadStrategy::ExecuteOnCurrentThread)
        .clone()
}
