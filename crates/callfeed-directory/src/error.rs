use thiserror::Error;

/// Directory failures. Callers on the read path log these and fall back to
/// unenriched rows; they never reach an HTTP client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
