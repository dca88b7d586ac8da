use std::{io, task::Poll};

use crate::{Error, SuspendRequest};

/// Result of one attempt of a suspension-aware socket operation.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The syscall completed.
    Ready(T),
    /// The syscall failed with anything other than would-block.
    Failed(io::Error),
    /// The socket is not ready and the task was not suspended: no scheduler
    /// is registered, the caller asked for a zero timeout, or the socket is
    /// not in non-blocking mode.
    WouldBlock,
    /// The request was handed to the scheduler, which will drive the task
    /// back into the same call later. Not an error.
    Blocked(SuspendRequest),
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    /// Map the ready value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ready(value) => Outcome::Ready(f(value)),
            Self::Failed(err) => Outcome::Failed(err),
            Self::WouldBlock => Outcome::WouldBlock,
            Self::Blocked(request) => Outcome::Blocked(request),
        }
    }

    /// Chain a step that only runs on a ready value.
    pub fn and_then<U, F: FnOnce(T) -> Outcome<U>>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ready(value) => f(value),
            Self::Failed(err) => Outcome::Failed(err),
            Self::WouldBlock => Outcome::WouldBlock,
            Self::Blocked(request) => Outcome::Blocked(request),
        }
    }

    /// Convert into a `Result` for callers polling by hand.
    ///
    /// Both would-block and blocked become [`Error::WouldBlock`].
    pub fn into_result(self) -> crate::Result<T> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Failed(err) => Err(Error::System(err)),
            Self::WouldBlock | Self::Blocked(_) => Err(Error::WouldBlock),
        }
    }

    /// Convert into a [`Poll`]: blocked is pending, would-block is an
    /// [`io::ErrorKind::WouldBlock`] error.
    pub fn into_poll(self) -> Poll<io::Result<T>> {
        match self {
            Self::Ready(value) => Poll::Ready(Ok(value)),
            Self::Failed(err) => Poll::Ready(Err(err)),
            Self::WouldBlock => Poll::Ready(Err(io::ErrorKind::WouldBlock.into())),
            Self::Blocked(_) => Poll::Pending,
        }
    }
}
