// Error taxonomy for the upload pipeline.
//
// Every component returns `Result`; the binary renders the error as one
// diagnostic line and exits with status 1. Host resolution is the only step
// that never produces one of these.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing, malformed or incomplete configuration document
    #[error("{message}")]
    Config { message: String },

    /// Empty or unusable path/URL from the user
    #[error("{message}")]
    Input { message: String },

    /// Local source path does not exist
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// Local read or remote download failed
    #[error("{message}")]
    Fetch { message: String },

    /// Source bytes are not a decodable image
    #[error("cannot decode image: {message}")]
    Decode { message: String },

    /// The WebP encoder rejected the bitmap
    #[error("cannot encode webp: {message}")]
    Encode { message: String },

    /// Transport-level failure talking to a remote service (DNS, TLS, timeout)
    #[error("{service} request failed: {message}")]
    Network {
        service: &'static str,
        message: String,
    },

    /// Token service answered with a non-2xx status
    #[error("{service} http error: {status} {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Unexpected JSON shape from a remote service
    #[error("{message}")]
    Protocol { message: String },

    /// Storage ingestion answered with a non-2xx status
    #[error("upload failed: {status} {body}")]
    Upload { status: u16, body: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Error::Input {
            message: message.into(),
        }
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Error::Fetch {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    /// Short stable name of the error kind, used in the diagnostic line and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } => "ConfigError",
            Error::Input { .. } => "InputError",
            Error::NotFound { .. } => "NotFoundError",
            Error::Fetch { .. } => "FetchError",
            Error::Decode { .. } => "DecodeError",
            Error::Encode { .. } => "EncodeError",
            Error::Network { .. } => "NetworkError",
            Error::Upstream { .. } => "UpstreamError",
            Error::Protocol { .. } => "ProtocolError",
            Error::Upload { .. } => "UploadError",
        }
    }
}
