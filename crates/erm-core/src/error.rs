use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {key}: {message}")]
    Store { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErmError {
    pub fn store(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            key: key.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ErmError>;
