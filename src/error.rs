use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not load credit cards: {0}")]
    Fetch(String),

    #[error("Could not save credit card: {0}")]
    Save(String),

    #[error("Another change is still in progress")]
    Busy,

    #[error("Credit card screen is closed")]
    Detached,

    #[error("Unknown credit card: {0}")]
    UnknownCard(String),

    #[error("{0}")]
    Validation(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, CardError>;
