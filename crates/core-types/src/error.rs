use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A unit or transform code that does not name a known variant.
    #[error("Unrecognized {kind} code '{value}'")]
    UnknownCode { kind: &'static str, value: String },
}
