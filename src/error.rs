pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Upload failed: {0}")]
    Upload(String),
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("Fatal error: {0}")]
    Fatal(anyhow::Error),
}

/// Rejected user input. Shown inline, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid file type. Accepted: {accepted}")]
    UnsupportedFileType { accepted: String },
    #[error("File size must be less than {max_mb}MB")]
    FileTooLarge { max_mb: u64 },
    #[error("{section} allows at most {max} {kind}")]
    MediaLimit {
        section: &'static str,
        kind: &'static str,
        max: usize,
    },
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    InvalidCredential,
    Other,
}

#[derive(Debug, thiserror::Error)]
#[error("{}", .kind.user_message())]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn invalid_credential() -> Self {
        Self {
            kind: AuthErrorKind::InvalidCredential,
            message: "invalid credential".to_string(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: AuthErrorKind::Other,
            message: message.into(),
        }
    }
}

impl AuthErrorKind {
    /// Text shown on the login form.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthErrorKind::InvalidCredential => "Invalid email or password",
            AuthErrorKind::Other => "Failed to login. Please try again.",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("unique constraint violated in {collection}")]
    Conflict { collection: String },
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Store(StoreError::Database(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Store(StoreError::Serde(e))
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Fatal(e)
    }
}
