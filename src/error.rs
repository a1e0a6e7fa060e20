use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid campaign definition: {0}")]
    Definition(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Adds context to an error for better debugging and error reporting
    pub fn with_context(self, context: &str) -> Self {
        match self {
            Self::Configuration(message) => {
                Self::Configuration(format!("{}: {}", context, message))
            }
            Self::Definition(message) => Self::Definition(format!("{}: {}", context, message)),
            Self::Serialization(message) => {
                Self::Serialization(format!("{}: {}", context, message))
            }
            Self::Validation(message) => Self::Validation(format!("{}: {}", context, message)),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
