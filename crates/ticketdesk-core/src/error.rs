use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An index or embedding adapter could not serve the retrieval step.
    #[error("Retrieval unavailable ({component}): {message}")]
    RetrievalUnavailable { component: &'static str, message: String },

    /// Generation output failed schema validation on the original call and
    /// on the single corrective retry.
    #[error("Malformed generation output after {attempts} attempts: {reason}")]
    MalformedGenerationOutput { attempts: usize, reason: String },

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: &'static str, after_ms: u64 },
}

impl Error {
    pub fn retrieval(component: &'static str, err: &anyhow::Error) -> Self {
        Error::RetrievalUnavailable { component, message: format!("{err:#}") }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
