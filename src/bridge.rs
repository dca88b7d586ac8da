//! Hand-off point between the socket wrappers and an external scheduler.

use std::{fmt::Display, os::fd::RawFd, time::Duration};

/// Readiness a suspended task is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// accept and receive.
    Read,
    /// send.
    Write,
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "readable"),
            Self::Write => write!(f, "writable"),
        }
    }
}

/// Scheduler hook invoked when a wrapper observes a would-block condition.
///
/// The implementation must arrange for the *current* logical task to be
/// driven again, re-entering the same wrapper call, once `fd` becomes ready in
/// the requested direction or `timeout` elapses. It must not block the
/// calling OS thread.
///
/// There is one slot per direction: read waiters and write waiters.
pub trait Blocker: Send + Sync {
    /// Park the current task until `fd` is readable.
    ///
    /// - `timeout` `None` means no deadline.
    fn wait_readable(&self, fd: RawFd, timeout: Option<Duration>);

    /// Park the current task until `fd` is writable.
    fn wait_writable(&self, fd: RawFd, timeout: Option<Duration>);
}

/// One would-block event eligible for suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuspendRequest {
    pub fd: RawFd,
    pub direction: Direction,
    /// `None` means wait with no deadline.
    pub timeout: Option<Duration>,
}

impl SuspendRequest {
    /// Hand this request to the slot of `blocker` matching its direction.
    pub fn submit(&self, blocker: &dyn Blocker) {
        log::debug!(target:"green_net", "{} suspend", self);

        match self.direction {
            Direction::Read => blocker.wait_readable(self.fd, self.timeout),
            Direction::Write => blocker.wait_writable(self.fd, self.timeout),
        }
    }
}

impl Display for SuspendRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.timeout {
            Some(timeout) => write!(f, "fd({}) wait {} for {:?}", self.fd, self.direction, timeout),
            None => write!(f, "fd({}) wait {}", self.fd, self.direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Slots {
        read: Mutex<Vec<(RawFd, Option<Duration>)>>,
        write: Mutex<Vec<(RawFd, Option<Duration>)>>,
    }

    impl Blocker for Slots {
        fn wait_readable(&self, fd: RawFd, timeout: Option<Duration>) {
            self.read.lock().unwrap().push((fd, timeout));
        }

        fn wait_writable(&self, fd: RawFd, timeout: Option<Duration>) {
            self.write.lock().unwrap().push((fd, timeout));
        }
    }

    #[test]
    fn submit_picks_slot_by_direction() {
        let slots = Slots::default();

        SuspendRequest {
            fd: 7,
            direction: Direction::Read,
            timeout: None,
        }
        .submit(&slots);

        SuspendRequest {
            fd: 8,
            direction: Direction::Write,
            timeout: Some(Duration::from_secs(2)),
        }
        .submit(&slots);

        assert_eq!(*slots.read.lock().unwrap(), vec![(7, None)]);
        assert_eq!(
            *slots.write.lock().unwrap(),
            vec![(8, Some(Duration::from_secs(2)))]
        );
    }
}
