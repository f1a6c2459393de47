use std::{path::PathBuf, time::Duration};

use strum::Display;
use thiserror::Error;

/// Everything that can go wrong while turning one prompt into one image file.
/// None of these abort a batch, they end up in the item's result.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no API key configured")]
    MissingCredential,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("no candidates in response")]
    NoCandidates,

    #[error("no image in response")]
    NoImageData,

    #[error("couldn't write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request failed: {0}")]
    Network(String),

    #[error("unexpected response body: {0}")]
    MalformedResponse(String),

    #[error("image payload is not valid base64: {0}")]
    InvalidImageData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    MissingCredential,
    Timeout,
    HttpError,
    NoCandidates,
    NoImageData,
    IoError,
    Network,
    MalformedResponse,
    InvalidImageData,
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential => ErrorKind::MissingCredential,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Http { .. } => ErrorKind::HttpError,
            Self::NoCandidates => ErrorKind::NoCandidates,
            Self::NoImageData => ErrorKind::NoImageData,
            Self::Io { .. } => ErrorKind::IoError,
            Self::Network(_) => ErrorKind::Network,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::InvalidImageData(_) => ErrorKind::InvalidImageData,
        }
    }
}
