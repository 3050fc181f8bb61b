use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A short ID prefix matched more than one record: `(id, title)` pairs.
    #[error("Ambiguous ID: {} matches", .0.len())]
    AmbiguousId(Vec<(String, String)>),

    /// A rule whose parameters do not describe a fireable pattern.
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),
}
