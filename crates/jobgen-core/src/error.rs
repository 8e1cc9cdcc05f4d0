use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The plan handed in by the optimizer is malformed (dangling handles,
    /// cycles, wrong input arity).
    #[error("Malformed plan: {0}")]
    Plan(String),

    #[error("Job graph definition error: {0}")]
    Graph(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encode(e.to_string())
    }
}
