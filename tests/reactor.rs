mod common;

use std::{
    cell::RefCell,
    io::ErrorKind,
    net::{TcpStream, UdpSocket},
    os::fd::AsRawFd,
    rc::Rc,
    sync::Arc,
    time::{Duration, Instant},
};

use common::{bound_tcp_socket, Fd};
use futures::{executor::LocalPool, task::LocalSpawnExt};
use greenio::{make_listening, reactor::PollReactor, task, Context, Descriptor, Timeout};

fn run_until<F: Fn() -> bool>(pool: &mut LocalPool, reactor: &PollReactor, done: F) {
    let start = Instant::now();

    while !done() {
        pool.run_until_stalled();

        if done() {
            break;
        }

        assert!(start.elapsed() < Duration::from_secs(10), "reactor loop stuck");

        reactor.poll_once(Duration::from_millis(20)).unwrap();
    }
}

#[test]
fn recv_resumes_after_datagram() {
    _ = pretty_env_logger::try_init();

    let reactor = PollReactor::default();

    let context = Arc::new(Context::with_blocker(Arc::new(reactor.clone())));

    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();

    let server_addr = server.local_addr().unwrap();

    let received = Rc::new(RefCell::new(None));

    let mut pool = LocalPool::new();

    {
        let context = context.clone();
        let received = received.clone();

        pool.spawner()
            .spawn_local(async move {
                let socket = Descriptor::new(server.as_raw_fd());

                socket.ensure_nonblocking().unwrap();

                let mut buf = [0u8; 64];

                let r = task::recv_from(&context, &socket, &mut buf, Timeout::Forever)
                    .await
                    .unwrap();

                *received.borrow_mut() = Some((buf[..r.len].to_vec(), r.from));
            })
            .unwrap();
    }

    pool.run_until_stalled();

    // The task is parked on the reactor.
    assert_eq!(reactor.waiters(), 1);
    assert!(received.borrow().is_none());

    client.send_to(b"hello world", server_addr).unwrap();

    run_until(&mut pool, &reactor, || received.borrow().is_some());

    let (data, from) = received.borrow_mut().take().unwrap();

    assert_eq!(data, b"hello world");
    assert_eq!(from, Some(client.local_addr().unwrap()));
    assert_eq!(reactor.waiters(), 0);
}

#[test]
fn recv_deadline_times_out() {
    _ = pretty_env_logger::try_init();

    let reactor = PollReactor::new(Duration::from_millis(5), 64);

    let context = Arc::new(Context::with_blocker(Arc::new(reactor.clone())));

    let server = UdpSocket::bind("127.0.0.1:0").unwrap();

    let result = Rc::new(RefCell::new(None));

    let mut pool = LocalPool::new();

    {
        let context = context.clone();
        let result = result.clone();

        pool.spawner()
            .spawn_local(async move {
                let socket = Descriptor::new(server.as_raw_fd());

                socket.ensure_nonblocking().unwrap();

                let mut buf = [0u8; 64];

                let timeout = Timeout::from(Duration::from_millis(50));

                let r = task::recv_from(&context, &socket, &mut buf, timeout).await;

                *result.borrow_mut() = Some(r.map(|r| r.len));
            })
            .unwrap();
    }

    let start = Instant::now();

    run_until(&mut pool, &reactor, || result.borrow().is_some());

    assert!(start.elapsed() >= Duration::from_millis(45));

    match result.borrow_mut().take().unwrap() {
        Err(err) => assert_eq!(err.kind(), ErrorKind::TimedOut),
        Ok(len) => panic!("unexpected datagram of {} bytes", len),
    }

    assert_eq!(reactor.waiters(), 0);
}

#[test]
fn accept_resumes_on_connect() {
    _ = pretty_env_logger::try_init();

    let reactor = PollReactor::default();

    let context = Arc::new(Context::with_blocker(Arc::new(reactor.clone())));

    let (listener, local) = bound_tcp_socket();

    let peer = Rc::new(RefCell::new(None));

    let mut pool = LocalPool::new();

    {
        let context = context.clone();
        let peer = peer.clone();
        let fd = listener.0;

        pool.spawner()
            .spawn_local(async move {
                let socket = Descriptor::new(fd);

                assert!(make_listening(&socket, 5));

                let accepted = task::accept(&context, &socket).await.unwrap();

                let _conn = Fd(accepted.descriptor.fd());

                assert!(accepted.descriptor.is_nonblocking());

                *peer.borrow_mut() = accepted.peer;
            })
            .unwrap();
    }

    pool.run_until_stalled();

    assert_eq!(reactor.waiters(), 1);

    let client = TcpStream::connect(local).unwrap();

    run_until(&mut pool, &reactor, || peer.borrow().is_some());

    assert_eq!(*peer.borrow(), Some(client.local_addr().unwrap()));
}

#[test]
fn send_without_scheduler_completes() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();

    let context = Context::new();

    let socket = Descriptor::new(client.as_raw_fd());

    let sent = futures::executor::block_on(task::send_to(
        &context,
        &socket,
        b"ping",
        Some(server.local_addr().unwrap()),
        Timeout::Never,
    ))
    .unwrap();

    assert_eq!(sent, 4);
}
