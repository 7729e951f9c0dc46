use std::fmt;

/// Represents the different types of errors that can occur in the experiment pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// Missing or malformed records detected before any split attempt
    DataIntegrity(String),
    /// A label stratum is too small to sample the requested fraction
    InsufficientData(String),
    /// The external model or tokenization capability cannot be reached
    BackendUnavailable(String),
    /// A generation batch did not complete within the configured bound
    GenerationTimeout(String),
    /// Writing a result artifact failed; computed metrics remain valid
    Persistence(String),
    /// Invalid input parameters
    Validation(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataIntegrity(msg) => write!(f, "Data integrity error: {}", msg),
            Self::InsufficientData(msg) => write!(f, "Insufficient data: {}", msg),
            Self::BackendUnavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            Self::GenerationTimeout(msg) => write!(f, "Generation timeout: {}", msg),
            Self::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::DataIntegrity(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Persistence(err.to_string())
    }
}
