//! `poll(2)` readiness check used by [`PollReactor`](crate::reactor::PollReactor).

use std::{
    collections::HashMap,
    fmt::Display,
    io::{Error, Result},
    os::fd::RawFd,
    time::Duration,
};

use errno::{errno, set_errno};
use libc::{nfds_t, pollfd, POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollEvent {
    Readable(RawFd),
    Writable(RawFd),
}

impl Display for PollEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Readable(v) => {
                write!(f, "PollEvent readable({})", v)
            }
            Self::Writable(v) => {
                write!(f, "PollEvent writable({})", v)
            }
        }
    }
}

/// Stateless wrapper over `poll(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPoller;

impl UnixPoller {
    pub fn new() -> Self {
        Self
    }

    /// Wait up to `timeout` for any of `events`, returning those that fired.
    ///
    /// Error and hang-up conditions fire every direction requested for the
    /// fd, so the waiting task retries and observes the failure itself. An
    /// interrupted wait returns no events.
    pub fn poll_once(&self, events: &[PollEvent], timeout: Duration) -> Result<Vec<PollEvent>> {
        let mut fds: HashMap<RawFd, i16> = HashMap::new();

        for event in events {
            match event {
                PollEvent::Readable(fd) => {
                    *fds.entry(*fd).or_default() |= POLLIN;
                }
                PollEvent::Writable(fd) => {
                    *fds.entry(*fd).or_default() |= POLLOUT;
                }
            }
        }

        let mut poll_fds: Vec<pollfd> = fds
            .into_iter()
            .map(|(fd, events)| pollfd {
                fd,
                events,
                revents: 0,
            })
            .collect();

        // Round up so sub-millisecond timeouts do not spin.
        let timeout_ms = ((timeout.as_nanos() + 999_999) / 1_000_000).min(i32::MAX as u128) as i32;

        let fired = unsafe {
            libc::poll(
                poll_fds.as_mut_ptr(),
                poll_fds.len() as nfds_t,
                timeout_ms,
            )
        };

        if fired < 0 {
            let e = errno();

            set_errno(e);

            if e.0 == libc::EINTR {
                log::trace!(target:"green_reactor", "poll interrupted");
                return Ok(vec![]);
            }

            log::debug!(target:"green_reactor", "poll error({})", e);

            return Err(Error::from_raw_os_error(e.0));
        }

        let mut raised = Vec::with_capacity(fired as usize);

        for poll_fd in poll_fds.iter().filter(|p| p.revents != 0) {
            let failed = poll_fd.revents & (POLLERR | POLLHUP | POLLNVAL) != 0;

            if poll_fd.events & POLLIN != 0 && (failed || poll_fd.revents & POLLIN != 0) {
                raised.push(PollEvent::Readable(poll_fd.fd));
            }

            if poll_fd.events & POLLOUT != 0 && (failed || poll_fd.revents & POLLOUT != 0) {
                raised.push(PollEvent::Writable(poll_fd.fd));
            }
        }

        log::trace!(target:"green_reactor", "raised {:?}", raised);

        Ok(raised)
    }
}
