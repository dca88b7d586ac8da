//! Suspension-aware accept, sendto and recvfrom.
//!
//! Every wrapper issues its syscall exactly once. A would-block result is
//! handed to the scheduler registered in the [`Context`] when the socket is
//! non-blocking and the caller's [`Timeout`] allows it; the wrapper then
//! returns [`Outcome::Blocked`] and expects to be called again with the same
//! arguments once the scheduler resumes the task. Any other failure is
//! returned as [`Outcome::Failed`] and never reaches the scheduler.

use std::{
    ffi::c_void,
    io::Error,
    mem::size_of,
    net::SocketAddr,
    os::fd::RawFd,
    ptr::null,
};

use errno::{errno, set_errno};
use os_socketaddr::OsSocketAddr;

use crate::{Context, Descriptor, Direction, Outcome, SuspendRequest, Timeout};

/// Connection returned by [`accept`].
#[derive(Debug)]
pub struct Accepted {
    /// New connection socket, already in non-blocking mode. The caller owns
    /// the fd and closes it.
    pub descriptor: Descriptor,
    /// Peer address, `None` for address families other than ipv4/ipv6.
    pub peer: Option<SocketAddr>,
}

/// Datagram returned by [`recv_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Bytes written into the caller's buffer.
    pub len: usize,
    /// Sender address, `None` for address families other than ipv4/ipv6.
    pub from: Option<SocketAddr>,
}

/// Accept a connection on a listening socket.
///
/// Accept always waits with no deadline when it suspends. The accepted socket
/// is switched to non-blocking mode before it is returned.
pub fn accept(context: &Context, socket: &Descriptor) -> Outcome<Accepted> {
    let fd = socket.fd();

    let mut remote = [0u8; size_of::<libc::sockaddr_in6>()];

    let mut len = remote.len() as libc::socklen_t;

    let conn_fd = unsafe {
        libc::accept(
            fd,
            remote.as_mut_ptr() as *mut libc::sockaddr,
            &mut len as *mut libc::socklen_t,
        )
    };

    // errno must be read before anything else can touch it.
    let outcome = classify(conn_fd as isize);

    log::trace!(target:"green_net", "fd({}) accept {}", fd, conn_fd);

    let outcome = settle(context, socket, Direction::Read, Timeout::Forever, outcome);

    outcome.and_then(|conn_fd| {
        let descriptor = Descriptor::new(conn_fd as RawFd);

        if let Err(err) = descriptor.ensure_nonblocking() {
            log::debug!(target:"green_net", "fd({}) accepted connection({}) not usable, {}", fd, conn_fd, err);

            unsafe { libc::close(conn_fd as RawFd) };

            return Outcome::Failed(err);
        }

        let peer = peer_addr(&remote, len);

        log::trace!(target:"green_net", "fd({}) accept connection({}) from ({:?})", fd, conn_fd, peer);

        Outcome::Ready(Accepted { descriptor, peer })
    })
}

/// Send one datagram, to `to` or, when `None`, to the connected peer.
pub fn send_to(
    context: &Context,
    socket: &Descriptor,
    buf: &[u8],
    to: Option<SocketAddr>,
    timeout: Timeout,
) -> Outcome<usize> {
    let fd = socket.fd();

    let addr: Option<OsSocketAddr> = to.map(Into::into);

    let (addr_ptr, addr_len) = match &addr {
        Some(addr) => (addr.as_ptr(), addr.len()),
        None => (null(), 0),
    };

    let len = unsafe {
        libc::sendto(
            fd,
            buf.as_ptr() as *const c_void,
            buf.len(),
            0,
            addr_ptr,
            addr_len,
        )
    };

    let outcome = classify(len);

    log::trace!(target:"green_net", "fd({}) sendto({:?}) {}", fd, to, len);

    settle(context, socket, Direction::Write, timeout, outcome).map(|len| len as usize)
}

/// Receive one datagram into `buf`.
pub fn recv_from(
    context: &Context,
    socket: &Descriptor,
    buf: &mut [u8],
    timeout: Timeout,
) -> Outcome<Received> {
    let fd = socket.fd();

    let mut remote = [0u8; size_of::<libc::sockaddr_in6>()];

    let mut addr_len = remote.len() as libc::socklen_t;

    let len = unsafe {
        libc::recvfrom(
            fd,
            buf.as_mut_ptr() as *mut c_void,
            buf.len(),
            0,
            remote.as_mut_ptr() as *mut libc::sockaddr,
            &mut addr_len as *mut libc::socklen_t,
        )
    };

    let outcome = classify(len);

    log::trace!(target:"green_net", "fd({}) recvfrom {}", fd, len);

    settle(context, socket, Direction::Read, timeout, outcome).map(|len| Received {
        len: len as usize,
        from: peer_addr(&remote, addr_len),
    })
}

/// Split a raw syscall return into ready, would-block and failed.
fn classify(ret: isize) -> Outcome<isize> {
    if ret >= 0 {
        return Outcome::Ready(ret);
    }

    let e = errno();

    set_errno(e);

    if e.0 == libc::EAGAIN || e.0 == libc::EWOULDBLOCK {
        Outcome::WouldBlock
    } else {
        Outcome::Failed(Error::from_raw_os_error(e.0))
    }
}

/// Turn a would-block outcome into a suspension when eligible.
fn settle<T>(
    context: &Context,
    socket: &Descriptor,
    direction: Direction,
    timeout: Timeout,
    outcome: Outcome<T>,
) -> Outcome<T> {
    if !outcome.is_would_block() {
        return outcome;
    }

    let fd = socket.fd();

    if !timeout.may_suspend() {
        log::trace!(target:"green_net", "fd({}) WOULDBLOCK, zero timeout", fd);
        return Outcome::WouldBlock;
    }

    // The caller may still read EAGAIN from errno after this returns.
    let e = errno();

    let nonblocking = socket.adopt_nonblocking();

    set_errno(e);

    // Readiness of a blocking socket is not something a scheduler can wait on.
    if !nonblocking {
        log::debug!(target:"green_net", "fd({}) WOULDBLOCK on blocking socket", fd);
        return Outcome::WouldBlock;
    }

    let blocker = match context.blocker() {
        Some(blocker) => blocker,
        None => {
            log::trace!(target:"green_net", "fd({}) WOULDBLOCK, no scheduler", fd);
            return Outcome::WouldBlock;
        }
    };

    let request = SuspendRequest {
        fd,
        direction,
        timeout: timeout.deadline(),
    };

    request.submit(blocker.as_ref());

    Outcome::Blocked(request)
}

fn peer_addr(remote: &[u8], len: libc::socklen_t) -> Option<SocketAddr> {
    // The kernel reports the untruncated length.
    let len = len.min(remote.len() as libc::socklen_t);

    unsafe { OsSocketAddr::copy_from_raw(remote.as_ptr() as *const libc::sockaddr, len) }
        .into_addr()
}
