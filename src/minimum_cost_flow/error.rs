use thiserror::Error;

pub type Result<T> = std::result::Result<T, McfError>;

/// Failure kinds surfaced by the solver API.
///
/// Solve outcomes (unfeasible, unbounded, stopped) are not errors; they are
/// reported through [`crate::minimum_cost_flow::Status`] together with their
/// certificates.
#[derive(Error, Debug)]
pub enum McfError {
    /// Malformed load arrays, out-of-range names, self-loops, or a rejected
    /// text-format line.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An add operation would exceed the node or arc bound fixed at load.
    #[error("no room for a new {0}")]
    NoRoom(&'static str),

    /// Touching a closed arc with a data change, or opening an arc that is
    /// not closed.
    #[error("illegal mutation: {0}")]
    IllegalMutation(String),

    /// An invariant breach inside the solver; the current solve is aborted.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl McfError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        McfError::InvalidInput(msg.into())
    }

    pub(crate) fn illegal(msg: impl Into<String>) -> Self {
        McfError::IllegalMutation(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        McfError::Internal(msg.into())
    }
}
