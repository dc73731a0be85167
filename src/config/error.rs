use std::fmt;
use std::io;

/// Why an [`MviConfig`](super::MviConfig) could not be produced.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read
    Unreadable { path: String, source: io::Error },
    /// The TOML is malformed or has fields of the wrong type
    Malformed { source: toml::de::Error },
    /// A key parsed fine but holds a value no feature can use
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: impl Into<String>, expected: &'static str) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.into(),
            expected,
        }
    }

    /// The dotted key that failed validation, e.g. `logging.level`.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            ConfigError::InvalidValue { key, .. } => Some(*key),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Unreadable { path, source } => {
                write!(f, "Can't read mvi config '{}': {}", path, source)
            }
            ConfigError::Malformed { source } => {
                write!(f, "Malformed mvi config: {}", source)
            }
            ConfigError::InvalidValue {
                key,
                value,
                expected,
            } => {
                write!(f, "Invalid mvi config: {} = {:?}, expected {}", key, value, expected)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Unreadable { source, .. } => Some(source),
            ConfigError::Malformed { source } => Some(source),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
