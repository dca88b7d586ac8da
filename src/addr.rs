//! Socket address helpers.

use os_socketaddr::OsSocketAddr;

/// Canonical text of the ip address in `addr`, e.g. `127.0.0.1` or `::1`.
///
/// Returns `None` for address families other than ipv4/ipv6.
pub fn address_text(addr: OsSocketAddr) -> Option<String> {
    addr.into_addr().map(|addr| addr.ip().to_string())
}

/// The raw `sin_port` field of `addr`, still in network byte order.
///
/// No `ntohs` is applied: callers convert with [`u16::from_be`]. ipv6
/// addresses keep their port at the same offset, so they read the same way.
pub fn address_port(addr: &OsSocketAddr) -> u16 {
    let sa = addr.as_ptr() as *const libc::sockaddr_in;

    unsafe { (*sa).sin_port }
}
