use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Uploaded file contains no data rows")]
    EmptyInput,

    #[error("Missing required query parameter: {0}")]
    MissingGroupKey(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No records found")]
    NoRecords,

    #[error("No records match the given filters")]
    NoMatches,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Could not find a free identifier after {0} attempts")]
    IdentifierExhaustion(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse failure class, used by the front ends to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad upload or request shape. Never retried.
    Input,
    /// Empty store or empty result set. Not a fault.
    NotFound,
    /// Storage, configuration or identifier-space failure.
    Store,
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Input(_)
            | CatalogError::EmptyInput
            | CatalogError::MissingGroupKey(_)
            | CatalogError::Csv(_) => ErrorKind::Input,
            CatalogError::NoRecords | CatalogError::NoMatches => ErrorKind::NotFound,
            CatalogError::Store(_)
            | CatalogError::DuplicateIdentifier(_)
            | CatalogError::IdentifierExhaustion(_)
            | CatalogError::Config(_)
            | CatalogError::Sqlite(_)
            | CatalogError::Io(_)
            | CatalogError::Json(_) => ErrorKind::Store,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Input => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Store => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
