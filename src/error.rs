use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelensError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid rule catalog: {0}")]
    Catalog(String),

    #[error("Collection from '{origin}' failed: {message}")]
    Collection { origin: String, message: String },

    #[error("Engine invariant violated: {0}")]
    Invariant(String),

    #[error("Monitor state corrupted: {0}")]
    StateCorruption(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelensError {
    pub fn collection(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collection {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Configuration and catalog problems are detected before any pass runs and
    /// exit with 1; everything else surfaced out of a pass exits with 2.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Catalog(_) => 1,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelensError>;
