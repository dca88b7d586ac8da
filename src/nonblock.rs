//! Listening sockets are switched to non-blocking mode.

use errno::{errno, set_errno};

use crate::Descriptor;

/// Put `socket` into the listening state with `backlog`.
///
/// On success the socket is marked non-blocking before returning, so every
/// later accept on it can be suspended. On failure the blocking mode is left
/// untouched and `false` is returned; the os error code stays in `errno`.
///
/// Calling this again on a socket that is already listening returns `true`
/// without toggling the blocking mode a second time.
pub fn make_listening(socket: &Descriptor, backlog: i32) -> bool {
    let fd = socket.fd();

    if unsafe { libc::listen(fd, backlog) } < 0 {
        let e = errno();

        log::debug!(target:"green_net", "fd({}) listen({}) failed, {}", fd, backlog, e);

        set_errno(e);

        return false;
    }

    if let Err(err) = socket.ensure_nonblocking() {
        log::debug!(target:"green_net", "fd({}) listening but not non-blocking, {}", fd, err);

        if let Some(code) = err.raw_os_error() {
            set_errno(errno::Errno(code));
        }

        return false;
    }

    log::trace!(target:"green_net", "fd({}) listen({})", fd, backlog);

    true
}
