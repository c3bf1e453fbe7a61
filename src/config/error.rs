use thiserror::Error;

/// Errors raised while declaring environments or resolving bindings.
///
/// These are boot-time failures: request handling never catches them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment '{0}' is already declared")]
    DuplicateEnvironment(String),

    #[error("Environment '{0}' is not declared in this definition")]
    UnknownEnvironment(String),

    #[error("Inheriting '{parent}' from '{child}' would create a cycle")]
    CyclicInheritance { child: String, parent: String },

    #[error("Environment '{0}' not found")]
    EnvironmentNotFound(String),

    #[error("Key '{key}' is already bound in environment '{environment}'")]
    DuplicateBinding { environment: String, key: String },

    #[error("Key '{0}' not found")]
    KeyNotFound(String),

    #[error("Circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("Key '{key}' does not hold a value of type {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("Failed to construct '{key}': {message}")]
    Construction { key: String, message: String },

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cache error: {0}")]
    Cache(String),
}

impl ConfigError {
    /// Wrap any displayable failure raised by a factory or recipe constructor.
    pub fn construction(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ConfigError::Construction {
            key: key.into(),
            message: err.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
