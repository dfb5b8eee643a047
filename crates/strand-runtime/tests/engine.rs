//! Engine integration tests over real sockets
//!
//! A single shared engine runs an echo handler that prefixes replies
//! with the id of the worker that served the connection.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::unix::io::RawFd;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use strand_runtime::{
    recv_async, send_async, ConnHandler, Engine, EngineConfig, IoError, Listener, Worker,
};

const RECV_TIMEOUT_MS: u64 = 500;

fn echo_handler(fd: RawFd, worker: &Worker) {
    let mut buf = [0u8; 1024];
    loop {
        match recv_async(worker, fd, &mut buf, 0, RECV_TIMEOUT_MS) {
            Ok(0) => break,
            Ok(n) => {
                let mut reply = format!("w{}:", worker.id()).into_bytes();
                reply.extend_from_slice(&buf[..n]);
                if send_async(worker, fd, &reply, 0).is_err() {
                    break;
                }
            }
            Err(IoError::Timeout) => {
                let _ = send_async(worker, fd, b"TIMEOUT", 0);
                break;
            }
            Err(_) => break,
        }
    }
    worker.close_connection(fd);
}

/// Start the shared two-worker engine once, returning its port.
fn engine_port() -> u16 {
    static PORT: OnceLock<u16> = OnceLock::new();
    *PORT.get_or_init(|| {
        let handler: Arc<ConnHandler> = Arc::new(|fd, w: &Worker| echo_handler(fd, w));

        let listener = Listener::bind("0", 128).expect("bind");
        let port = listener.local_port().expect("local_port");

        let mut engine =
            Engine::new(EngineConfig::new().num_workers(2).stack_size(256 * 1024), handler).expect("engine");
        engine.start();

        std::thread::spawn(move || {
            let _ = engine.dispatch(&listener);
        });

        port
    })
}

fn connect() -> TcpStream {
    let stream = TcpStream::connect(("127.0.0.1", engine_port())).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

fn roundtrip(stream: &mut TcpStream, msg: &[u8]) -> Vec<u8> {
    stream.write_all(msg).unwrap();
    let mut buf = [0u8; 2048];
    let n = stream.read(&mut buf).unwrap();
    buf[..n].to_vec()
}

#[test]
fn test_echo_roundtrip() {
    let mut stream = connect();
    let reply = roundtrip(&mut stream, b"hello");
    let reply = String::from_utf8(reply).unwrap();
    assert!(
        reply.starts_with("w0:") || reply.starts_with("w1:"),
        "unexpected reply {:?}",
        reply
    );
    assert!(reply.ends_with("hello"));
}

#[test]
fn test_keepalive_multiple_roundtrips() {
    let mut stream = connect();
    for i in 0..5 {
        let msg = format!("msg-{}", i);
        let reply = String::from_utf8(roundtrip(&mut stream, msg.as_bytes())).unwrap();
        assert!(reply.ends_with(&msg), "reply {:?} for {:?}", reply, msg);
    }
}

#[test]
fn test_round_robin_distribution() {
    // Dedicated engine so connections from other tests cannot skew the
    // accept count. Over four accepts each of the two workers serves
    // exactly two.
    let handler: Arc<ConnHandler> = Arc::new(|fd, w: &Worker| echo_handler(fd, w));
    let listener = Listener::bind("0", 128).expect("bind");
    let port = listener.local_port().expect("local_port");
    let mut engine = Engine::new(EngineConfig::new().num_workers(2).stack_size(256 * 1024), handler).expect("engine");
    engine.start();
    std::thread::spawn(move || {
        let _ = engine.dispatch(&listener);
    });

    let mut ids = Vec::new();
    for _ in 0..4 {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reply = String::from_utf8(roundtrip(&mut stream, b"x")).unwrap();
        let id: usize = reply[1..reply.find(':').unwrap()].parse().unwrap();
        ids.push(id);
    }
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 0, 1, 1]);
}

#[test]
fn test_parked_task_wakes_on_late_data() {
    let mut stream = connect();

    // Give the task time to park on the fd before any data arrives
    std::thread::sleep(Duration::from_millis(60));

    let reply = String::from_utf8(roundtrip(&mut stream, b"late")).unwrap();
    assert!(reply.ends_with("late"));
}

#[test]
fn test_slow_client_does_not_starve_others() {
    // Open a connection and leave it idle; its task stays parked
    let _idle = connect();
    std::thread::sleep(Duration::from_millis(30));

    // A second connection on the same engine completes promptly
    let started = Instant::now();
    let mut stream = connect();
    let reply = String::from_utf8(roundtrip(&mut stream, b"fast")).unwrap();
    assert!(reply.ends_with("fast"));
    assert!(
        started.elapsed() < Duration::from_millis(200),
        "slow path took {:?}",
        started.elapsed()
    );
}

#[test]
fn test_recv_timeout_fires_for_silent_peer() {
    let mut stream = connect();

    // Send nothing; the handler's timed receive must expire on its own
    let started = Instant::now();
    let mut buf = [0u8; 64];
    let n = stream.read(&mut buf).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(&buf[..n], b"TIMEOUT");
    assert!(
        elapsed >= Duration::from_millis(RECV_TIMEOUT_MS - 50),
        "timeout fired too early: {:?}",
        elapsed
    );
    assert!(
        elapsed < Duration::from_secs(3),
        "timeout fired too late: {:?}",
        elapsed
    );

    // After the reply the server closes; read returns EOF
    let n = stream.read(&mut buf).unwrap();
    assert_eq!(n, 0);
}

#[test]
fn test_peer_close_mid_connection() {
    // Open, exchange one message, then drop the socket abruptly. The
    // server task must observe the close and exit without taking the
    // worker down; a follow-up connection still works.
    {
        let mut stream = connect();
        let _ = roundtrip(&mut stream, b"bye");
    }

    std::thread::sleep(Duration::from_millis(30));

    let mut stream = connect();
    let reply = String::from_utf8(roundtrip(&mut stream, b"still-alive")).unwrap();
    assert!(reply.ends_with("still-alive"));
}
