use std::{
    fmt,
    io::{Error, Result},
    os::fd::{AsRawFd, RawFd},
};

use once_cell::sync::OnceCell;

/// Socket handle passed to the suspension-aware wrappers.
///
/// The handle does not own the fd: dropping it never closes the socket.
/// It records whether the socket has been switched to non-blocking mode;
/// that mark is set at most once and never cleared.
pub struct Descriptor {
    fd: RawFd,
    nonblocking: OnceCell<()>,
}

impl Descriptor {
    /// Wrap a raw socket fd. The socket is not marked non-blocking yet.
    pub fn new(fd: RawFd) -> Self {
        Self {
            fd,
            nonblocking: OnceCell::new(),
        }
    }

    /// Raw os fd.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Returns true once [`ensure_nonblocking`](Self::ensure_nonblocking) has succeeded.
    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking.get().is_some()
    }

    /// Switch the socket to non-blocking mode, once.
    ///
    /// Later calls return immediately without touching the fd flags.
    pub fn ensure_nonblocking(&self) -> Result<()> {
        self.nonblocking
            .get_or_try_init(|| unsafe { noblock(self.fd) })
            .map(|_| ())
    }
}

impl Descriptor {
    /// Record the mark if the socket is already non-blocking at the os level,
    /// e.g. switched by the embedder before wrapping it.
    ///
    /// Never changes the fd flags. Returns true if the descriptor is marked.
    pub fn adopt_nonblocking(&self) -> bool {
        if self.is_nonblocking() {
            return true;
        }

        let flags = unsafe { libc::fcntl(self.fd, libc::F_GETFL) };

        if flags < 0 || flags & libc::O_NONBLOCK == 0 {
            return false;
        }

        log::trace!(target:"green_net", "fd({}) adopt O_NONBLOCK", self.fd);

        _ = self.nonblocking.set(());

        true
    }
}

impl AsRawFd for Descriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("fd", &self.fd)
            .field("nonblocking", &self.is_nonblocking())
            .finish()
    }
}

unsafe fn noblock(fd: RawFd) -> Result<()> {
    use libc::*;

    let flags = fcntl(fd, F_GETFL);

    if flags < 0 {
        return Err(Error::last_os_error());
    }

    if flags & O_NONBLOCK != 0 {
        log::trace!(target:"green_net", "fd({}) already O_NONBLOCK", fd);
        return Ok(());
    }

    if fcntl(fd, F_SETFL, flags | O_NONBLOCK) < 0 {
        return Err(Error::last_os_error());
    }

    log::debug!(target:"green_net", "fd({}) set O_NONBLOCK", fd);

    Ok(())
}
