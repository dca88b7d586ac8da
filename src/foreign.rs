//! Interpreter-facing procedures.
//!
//! An embedding interpreter calls these with its own dynamically typed
//! [`Value`]s. Arguments are checked here and mismatches reported as
//! [`Error::TypeMismatch`]; would-block conditions are turned into the
//! [`Value::Blocked`] and [`Value::WouldBlock`] sentinels, never errors.

use std::{net::SocketAddr, sync::Arc};

use os_socketaddr::OsSocketAddr;

use crate::{
    addr, nonblock,
    random::RandomSource,
    syscall::{self, Received},
    Context, Descriptor, Error, Outcome, Result, Timeout, TimeoutValue,
};

/// Dynamically typed interpreter value.
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Bool(bool),
    Fixnum(i64),
    Flonum(f64),
    /// Arbitrary-width integer as sign and little-endian 32-bit magnitude.
    Bignum {
        negative: bool,
        limbs: Vec<u32>,
    },
    Bytes(Vec<u8>),
    Str(String),
    Fileno(Arc<Descriptor>),
    /// The task was suspended; the scheduler will call the procedure again.
    Blocked,
    /// Not ready and not suspended; the caller has to poll.
    WouldBlock,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "boolean",
            Self::Fixnum(_) => "fixnum",
            Self::Flonum(_) => "flonum",
            Self::Bignum { .. } => "bignum",
            Self::Bytes(_) => "bytevector",
            Self::Str(_) => "string",
            Self::Fileno(_) => "fileno",
            Self::Blocked => "io-blocked",
            Self::WouldBlock => "io-would-block",
        }
    }
}

fn mismatch(procedure: &'static str, expected: &'static str, found: &Value) -> Error {
    Error::TypeMismatch {
        procedure,
        expected,
        found: found.type_name(),
    }
}

fn fileno<'a>(procedure: &'static str, value: &'a Value) -> Result<&'a Descriptor> {
    match value {
        Value::Fileno(descriptor) => Ok(descriptor),
        other => Err(mismatch(procedure, "fileno", other)),
    }
}

/// `#f` and void mean no timeout; fixnums and flonums are seconds.
fn timeout(procedure: &'static str, value: &Value) -> Result<Timeout> {
    match value {
        Value::Bool(false) | Value::Void => Ok(Timeout::Forever),
        Value::Fixnum(secs) => Ok(Timeout::classify(Some(TimeoutValue::Integer(*secs)))),
        Value::Flonum(secs) => Ok(Timeout::classify(Some(TimeoutValue::Real(*secs)))),
        other => Err(mismatch(procedure, "real number or #f", other)),
    }
}

fn settle<T, F: FnOnce(T) -> Value>(outcome: Outcome<T>, f: F) -> Result<Value> {
    match outcome {
        Outcome::Ready(value) => Ok(f(value)),
        Outcome::Failed(err) => Err(Error::System(err)),
        Outcome::WouldBlock => Ok(Value::WouldBlock),
        Outcome::Blocked(_) => Ok(Value::Blocked),
    }
}

/// `(listen fileno backlog)` → `#t` / `#f`.
pub fn listen(fileno_value: &Value, backlog: &Value) -> Result<Value> {
    let socket = fileno("listen", fileno_value)?;

    let backlog = match backlog {
        Value::Fixnum(n) => i32::try_from(*n).unwrap_or(i32::MAX),
        other => return Err(mismatch("listen", "fixnum", other)),
    };

    Ok(Value::Bool(nonblock::make_listening(socket, backlog)))
}

/// `(set-nonblocking! fileno)`: switch a socket to non-blocking mode so
/// later sends and receives on it may suspend.
pub fn set_nonblocking(fileno_value: &Value) -> Result<Value> {
    let socket = fileno("set-nonblocking!", fileno_value)?;

    socket.ensure_nonblocking()?;

    Ok(Value::Void)
}

/// `(accept fileno)` → new fileno or a sentinel.
pub fn accept(context: &Context, fileno_value: &Value) -> Result<Value> {
    let socket = fileno("accept", fileno_value)?;

    settle(syscall::accept(context, socket), |accepted| {
        Value::Fileno(Arc::new(accepted.descriptor))
    })
}

/// `(sendto fileno bytes addr timeout)` → bytes sent or a sentinel.
pub fn sendto(
    context: &Context,
    fileno_value: &Value,
    buf: &[u8],
    to: Option<SocketAddr>,
    timeout_value: &Value,
) -> Result<Value> {
    let socket = fileno("sendto", fileno_value)?;

    let timeout = timeout("sendto", timeout_value)?;

    settle(syscall::send_to(context, socket, buf, to, timeout), |len| {
        Value::Fixnum(len as i64)
    })
}

/// `(recvfrom fileno bytes timeout)` → bytes received or a sentinel.
pub fn recvfrom(
    context: &Context,
    fileno_value: &Value,
    buf: &mut [u8],
    timeout_value: &Value,
) -> Result<Value> {
    let socket = fileno("recvfrom", fileno_value)?;

    let timeout = timeout("recvfrom", timeout_value)?;

    settle(
        syscall::recv_from(context, socket, buf, timeout),
        |Received { len, .. }| Value::Fixnum(len as i64),
    )
}

/// `(sockaddr-name addr)` → string.
pub fn sockaddr_name(addr: OsSocketAddr) -> Result<Value> {
    addr::address_text(addr)
        .map(Value::Str)
        .ok_or_else(|| Error::NotSupported("address family".to_owned()))
}

/// `(sockaddr-port addr)` → raw network-order port.
pub fn sockaddr_port(addr: &OsSocketAddr) -> Value {
    Value::Fixnum(addr::address_port(addr) as i64)
}

/// `(random-integer source bound)`.
pub fn random_integer(source: &mut RandomSource, bound: &Value) -> Result<Value> {
    match bound {
        Value::Fixnum(n) => source.integer(*n).map(Value::Fixnum),
        Value::Bignum { negative, limbs } => {
            let limbs = source.big_integer(*negative, limbs)?;

            Ok(match limbs.as_slice() {
                [] => Value::Fixnum(0),
                [lo] => Value::Fixnum(*lo as i64),
                _ => Value::Bignum {
                    negative: false,
                    limbs,
                },
            })
        }
        other => Err(mismatch("random-integer", "integer", other)),
    }
}

/// `(random-real source)`.
pub fn random_real(source: &mut RandomSource) -> Value {
    Value::Flonum(source.real())
}

/// `(random-source-state-ref source)` → bytevector.
pub fn random_source_state_ref(source: &RandomSource) -> Value {
    Value::Bytes(source.state())
}

/// `(random-source-state-set! source state)`.
pub fn random_source_state_set(source: &mut RandomSource, state: &Value) -> Result<Value> {
    match state {
        Value::Bytes(bytes) => source.set_state(bytes).map(|_| Value::Void),
        other => Err(mismatch("random-source-state-set!", "bytevector", other)),
    }
}

/// `(random-source-randomize! source)`.
pub fn random_source_randomize(source: &mut RandomSource) -> Value {
    source.randomize();
    Value::Void
}

/// `(random-source-pseudo-randomize! source seed)`.
pub fn random_source_pseudo_randomize(source: &mut RandomSource, seed: &Value) -> Result<Value> {
    match seed {
        Value::Fixnum(seed) => {
            source.pseudo_randomize(*seed);
            Ok(Value::Void)
        }
        other => Err(mismatch("random-source-pseudo-randomize!", "fixnum", other)),
    }
}
