use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("exposition failure: {0}")]
    ExpositionFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("watcher error: {0}")]
    Watch(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
