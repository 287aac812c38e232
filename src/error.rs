//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror` (see
//! [`crate::remote::RemoteError`] and [`crate::ai::ProviderError`]), while
//! CLI/main uses `anyhow` for convenient error propagation.

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration error
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Remote media-service error
    #[error("Remote error: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    /// AI provider error
    #[error("Provider error: {0}")]
    Provider(#[from] crate::ai::ProviderError),

    /// Vector index error
    #[error("Index error: {0}")]
    Index(String),

    /// Playlist generation/export error
    #[error("Playlist error: {0}")]
    Playlist(String),

    /// Operation cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create an index error.
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Create a playlist error.
    pub fn playlist(message: impl Into<String>) -> Self {
        Self::Playlist(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::index("dimension mismatch");
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(Error::Cancelled.to_string(), "Operation cancelled");
    }
}
