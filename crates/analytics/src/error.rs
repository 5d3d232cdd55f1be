use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Indicator could not be initialised: {0}")]
    InvalidParameters(String),
}
