use thiserror::Error;

/// Top-level error type for Hive.
#[derive(Debug, Error)]
pub enum HiveError {
    /// No session is registered under the given id.
    #[error("session '{0}' not found")]
    NotFound(String),

    /// A session with the given id is already registered.
    #[error("session '{0}' already exists")]
    AlreadyExists(String),

    /// The session exists but its connection is not open.
    #[error("session '{0}' is not connected")]
    NotConnected(String),

    /// The provider rejected or failed a send.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Uploaded file has the wrong type or is too large.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// Session id cannot be used as a storage key.
    #[error("invalid session id '{0}'")]
    InvalidSessionId(String),

    /// Destination contains no usable digits.
    #[error("invalid destination '{0}'")]
    InvalidDestination(String),

    /// Error from a connection provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Credential or artifact storage error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
