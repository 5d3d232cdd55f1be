use thiserror::Error;

#[derive(Error, Debug)]
pub enum SufficiencyError {
    #[error("Data source error: {0}")]
    Source(String),

    #[error("Indicator calculation failed: {0}")]
    Indicators(String),
}
