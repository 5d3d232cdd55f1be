use thiserror::Error;

#[derive(Error, Debug)]
pub enum StandardizationError {
    #[error("Series '{0}' has no definition in the catalog")]
    UnknownSeries(String),

    #[error("Rolling window must cover at least 2 periods, got {0}")]
    InvalidWindow(usize),
}
