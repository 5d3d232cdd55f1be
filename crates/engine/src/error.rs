use thiserror::Error;

/// Failures reported by the external data collaborators.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("No data for '{0}'")]
    NotFound(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Fatal startup configuration problems. These are the only errors that abort
/// pipeline startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Circular dependency between startup steps: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{0}' is declared more than once")]
    DuplicateStep(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Not enough data to score '{0}'")]
    NoData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
