use thiserror::Error;

/// Errors reported by the diff computation entry points.
///
/// Only caller contract violations surface as errors; malformed HTML,
/// unresolvable token positions and degenerate ranges all degrade to
/// best-effort output instead (see the module docs of [`crate::html::merge`]
/// and [`crate::render`]).
#[derive(Debug, Clone, Error)]
pub enum DiffError {
    /// The caller passed input that violates the API contract, e.g. a JSON
    /// value under a text-only comparison method. Never retried or recovered.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Syntax highlighting failed while producing rendered lines.
    #[error("highlighting failed: {0}")]
    Highlight(String),

    /// The background diff worker shut down before answering.
    #[error("diff worker unavailable")]
    WorkerUnavailable,
}

impl From<syntect::Error> for DiffError {
    fn from(err: syntect::Error) -> Self {
        DiffError::Highlight(err.to_string())
    }
}
