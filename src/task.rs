//! futures integration: the logical task a suspension belongs to, and a
//! future that re-drives a socket wrapper until it stops suspending.

use std::{
    cell::RefCell,
    future::Future,
    io::{Error, ErrorKind, Result},
    net::SocketAddr,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Poll, Waker},
};

use crate::{
    syscall::{self, Accepted, Received},
    Context, Descriptor, Outcome, Timeout,
};

thread_local! {
    static CURRENT: RefCell<Option<TaskHandle>> = RefCell::new(None);
}

/// Handle a [`Blocker`](crate::Blocker) keeps to resume a suspended task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    waker: Waker,
    timed_out: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new(waker: Waker) -> Self {
        Self {
            waker,
            timed_out: Default::default(),
        }
    }

    /// Resume the task: the descriptor it waits on is ready.
    pub fn wake(&self) {
        self.waker.wake_by_ref();
    }

    /// Resume the task because its deadline passed.
    pub fn expire(&self) {
        self.timed_out.store(true, Ordering::Release);
        self.waker.wake_by_ref();
    }

    /// Returns true, once, after [`expire`](Self::expire).
    pub fn take_timed_out(&self) -> bool {
        self.timed_out.swap(false, Ordering::AcqRel)
    }
}

/// Run `f` with `task` as the current task of this thread.
pub fn enter<R, F: FnOnce() -> R>(task: TaskHandle, f: F) -> R {
    struct Reset(Option<TaskHandle>);

    impl Drop for Reset {
        fn drop(&mut self) {
            let prev = self.0.take();
            CURRENT.with(|current| *current.borrow_mut() = prev);
        }
    }

    let prev = CURRENT.with(|current| current.borrow_mut().replace(task));

    let _reset = Reset(prev);

    f()
}

/// The task currently running a socket wrapper on this thread, if any.
pub fn current() -> Option<TaskHandle> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Future re-driving a socket wrapper each time the scheduler resumes it.
///
/// `op` receives the timeout to use for the attempt: the caller's timeout,
/// or [`Timeout::Never`] for the one last attempt made after the scheduler
/// reported the deadline as passed. A would-block result on that attempt
/// resolves to [`ErrorKind::TimedOut`].
pub struct Retry<F> {
    op: F,
    timeout: Timeout,
    task: Option<TaskHandle>,
}

impl<F> Retry<F> {
    pub fn new(timeout: Timeout, op: F) -> Self {
        Self {
            op,
            timeout,
            task: None,
        }
    }
}

impl<F, T> Future for Retry<F>
where
    F: FnMut(Timeout) -> Outcome<T> + Unpin,
{
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        let task = match this.task.take() {
            Some(task) => TaskHandle {
                waker: cx.waker().clone(),
                timed_out: task.timed_out,
            },
            None => TaskHandle::new(cx.waker().clone()),
        };

        let expired = task.take_timed_out();

        let timeout = if expired {
            Timeout::Never
        } else {
            this.timeout
        };

        let op = &mut this.op;

        match enter(task.clone(), || op(timeout)) {
            Outcome::Ready(value) => Poll::Ready(Ok(value)),
            Outcome::Failed(err) => Poll::Ready(Err(err)),
            Outcome::WouldBlock if expired => Poll::Ready(Err(Error::new(
                ErrorKind::TimedOut,
                format!("timeout after {:?}", this.timeout),
            ))),
            Outcome::WouldBlock => Poll::Ready(Err(ErrorKind::WouldBlock.into())),
            Outcome::Blocked(request) => {
                log::trace!("{} pending", request);
                this.task = Some(task);
                Poll::Pending
            }
        }
    }
}

/// Accept a connection, suspending the calling task while none is pending.
pub fn accept<'a>(
    context: &'a Context,
    socket: &'a Descriptor,
) -> impl Future<Output = Result<Accepted>> + 'a {
    Retry::new(Timeout::Forever, move |_| syscall::accept(context, socket))
}

/// Send one datagram, suspending the calling task while the socket is full.
pub fn send_to<'a>(
    context: &'a Context,
    socket: &'a Descriptor,
    buf: &'a [u8],
    to: Option<SocketAddr>,
    timeout: Timeout,
) -> impl Future<Output = Result<usize>> + 'a {
    Retry::new(timeout, move |timeout| {
        syscall::send_to(context, socket, buf, to, timeout)
    })
}

/// Receive one datagram, suspending the calling task while none is queued.
pub fn recv_from<'a>(
    context: &'a Context,
    socket: &'a Descriptor,
    buf: &'a mut [u8],
    timeout: Timeout,
) -> impl Future<Output = Result<Received>> + 'a {
    Retry::new(timeout, move |timeout| {
        syscall::recv_from(context, socket, &mut *buf, timeout)
    })
}
