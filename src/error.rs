use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeaderError>;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Word not in vocabulary: {0:?}")]
    KeyNotFound(String),
}

impl HeaderError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        HeaderError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, HeaderError::InvalidArgument(_))
    }

    pub fn is_key_not_found(&self) -> bool {
        matches!(self, HeaderError::KeyNotFound(_))
    }
}
