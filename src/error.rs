use thiserror::Error;

#[derive(Error, Debug)]
pub enum DualSubsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No usable track locator: {0}")]
    ResolutionFailed(String),

    #[error("Track fetch failed: {0}")]
    FetchFailed(String),

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid SRT format: {0}")]
    InvalidSrt(String),

    #[error("Session closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, DualSubsError>;
