use std::io;

/// Errors surfaced by the foreign-call layer and the random source.
///
/// Socket wrappers report OS failures as [`io::Error`] inside
/// [`Outcome::Failed`](crate::Outcome::Failed); they are lifted into
/// [`Error::System`] at the foreign-call boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wrong kind of value passed where a descriptor, integer or buffer was expected.
    #[error("{procedure}: expected {expected}, got {found}")]
    TypeMismatch {
        procedure: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// The operation could not complete without suspending.
    #[error("operation would block")]
    WouldBlock,

    /// Any other negative syscall result.
    #[error(transparent)]
    System(#[from] io::Error),

    /// Malformed random bound.
    #[error("invalid bound: {0}")]
    InvalidBound(String),

    /// State retrieval mismatch, e.g. a random state of the wrong size.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Raw OS error code, if this is a [`Error::System`] failure carrying one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::System(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
