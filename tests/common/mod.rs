#![allow(dead_code)]

use std::{
    os::fd::RawFd,
    sync::{Arc, Mutex},
    time::Duration,
};

use greenio::{Blocker, Context, Direction};

/// Bridge recording every suspension instead of parking anything.
#[derive(Default)]
pub struct RecordingBlocker {
    pub calls: Mutex<Vec<(RawFd, Direction, Option<Duration>)>>,
}

impl RecordingBlocker {
    pub fn calls(&self) -> Vec<(RawFd, Direction, Option<Duration>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Blocker for RecordingBlocker {
    fn wait_readable(&self, fd: RawFd, timeout: Option<Duration>) {
        self.calls
            .lock()
            .unwrap()
            .push((fd, Direction::Read, timeout));
    }

    fn wait_writable(&self, fd: RawFd, timeout: Option<Duration>) {
        self.calls
            .lock()
            .unwrap()
            .push((fd, Direction::Write, timeout));
    }
}

pub fn recording_context() -> (Arc<RecordingBlocker>, Context) {
    let blocker = Arc::new(RecordingBlocker::default());

    let context = Context::with_blocker(blocker.clone());

    (blocker, context)
}

/// Owned fd closed on drop.
pub struct Fd(pub RawFd);

impl Drop for Fd {
    fn drop(&mut self) {
        unsafe { libc::close(self.0) };
    }
}

/// Connected pair of unix datagram sockets.
pub fn datagram_pair() -> (Fd, Fd) {
    let mut fds = [0 as RawFd; 2];

    let ret = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_DGRAM, 0, fds.as_mut_ptr()) };

    assert_eq!(ret, 0, "socketpair: {}", std::io::Error::last_os_error());

    (Fd(fds[0]), Fd(fds[1]))
}

/// Unlistened ipv4 tcp socket bound to an ephemeral loopback port.
pub fn bound_tcp_socket() -> (Fd, std::net::SocketAddr) {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };

    assert!(fd >= 0, "socket: {}", std::io::Error::last_os_error());

    let fd = Fd(fd);

    let addr: os_socketaddr::OsSocketAddr = "127.0.0.1:0"
        .parse::<std::net::SocketAddr>()
        .unwrap()
        .into();

    let ret = unsafe { libc::bind(fd.0, addr.as_ptr(), addr.len()) };

    assert_eq!(ret, 0, "bind: {}", std::io::Error::last_os_error());

    let mut local = [0u8; std::mem::size_of::<libc::sockaddr_in6>()];

    let mut len = local.len() as libc::socklen_t;

    let ret = unsafe {
        libc::getsockname(fd.0, local.as_mut_ptr() as *mut libc::sockaddr, &mut len)
    };

    assert_eq!(ret, 0, "getsockname: {}", std::io::Error::last_os_error());

    let local = unsafe {
        os_socketaddr::OsSocketAddr::copy_from_raw(local.as_ptr() as *const libc::sockaddr, len)
    };

    let local = local.into_addr().unwrap();

    (fd, local)
}

pub fn has_nonblock_flag(fd: RawFd) -> bool {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };

    assert!(flags >= 0);

    flags & libc::O_NONBLOCK != 0
}

/// Fill the send buffer of `fd` until the kernel refuses more.
pub fn fill_send_buffer(fd: RawFd) {
    let chunk = [0u8; 1024];

    loop {
        let ret = unsafe {
            libc::send(
                fd,
                chunk.as_ptr() as *const libc::c_void,
                chunk.len(),
                libc::MSG_DONTWAIT,
            )
        };

        if ret < 0 {
            let err = std::io::Error::last_os_error();

            assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock, "{}", err);

            return;
        }
    }
}
