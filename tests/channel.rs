use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use taskrelay::channel::{ResultListener, ResultSender, send, send_to_port};
use taskrelay::types::TaskHandle;
use taskrelay_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn datagrams_arrive_in_order_with_sequence_numbers() {
    init_tracing();
    let mut listener = ResultListener::bind_port(0).unwrap();
    let port = listener.local_addr().port();

    for payload in ["1 of 3", "2 of 3", "3 of 3"] {
        assert!(send_to_port(port, payload));
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        let msg = with_timeout(listener.next()).await.expect("listener closed");
        received.push((msg.sequence, msg.text().into_owned()));
    }

    assert_eq!(
        received,
        vec![
            (0, "1 of 3".to_string()),
            (1, "2 of 3".to_string()),
            (2, "3 of 3".to_string()),
        ]
    );
}

#[tokio::test]
async fn delivery_follows_send_order_not_payload_order() {
    init_tracing();
    let mut listener = ResultListener::bind_port(0).unwrap();
    let target = listener.local_addr();
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();

    for payload in ["0 of 10", "2 of 10", "1 of 10"] {
        socket.send_to(payload.as_bytes(), target).unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        let msg = with_timeout(listener.next()).await.expect("listener closed");
        received.push((msg.sequence, msg.text().into_owned()));
    }

    assert_eq!(
        received,
        vec![
            (0, "0 of 10".to_string()),
            (1, "2 of 10".to_string()),
            (2, "1 of 10".to_string()),
        ]
    );
}

#[tokio::test]
async fn sequences_are_counted_per_source_and_sources_can_be_named() {
    init_tracing();
    let mut listener = ResultListener::bind_port(0).unwrap();
    let target = listener.local_addr();

    let a = UdpSocket::bind("127.0.0.1:0").unwrap();
    let b = UdpSocket::bind("127.0.0.1:0").unwrap();
    listener.map_source(a.local_addr().unwrap(), TaskHandle::new("sender-a"));

    a.send_to(b"a0", target).unwrap();
    b.send_to(b"b0", target).unwrap();
    a.send_to(b"a1", target).unwrap();

    let mut msgs = Vec::new();
    for _ in 0..3 {
        msgs.push(with_timeout(listener.next()).await.unwrap());
    }

    let from_a: Vec<_> = msgs
        .iter()
        .filter(|m| m.source == a.local_addr().unwrap())
        .map(|m| (m.sequence, m.source_handle.clone()))
        .collect();
    assert_eq!(
        from_a,
        vec![
            (0, Some(TaskHandle::new("sender-a"))),
            (1, Some(TaskHandle::new("sender-a"))),
        ]
    );

    let from_b = msgs
        .iter()
        .find(|m| m.source == b.local_addr().unwrap())
        .unwrap();
    assert_eq!(from_b.sequence, 0);
    assert_eq!(from_b.source_handle, None);
}

#[tokio::test]
async fn done_sentinel_is_recognised() {
    let mut listener = ResultListener::bind_port(0).unwrap();
    let sender = ResultSender::new(listener.local_addr());

    sender.send("progress");
    sender.send("done\n");

    let first = with_timeout(listener.next()).await.unwrap();
    let second = with_timeout(listener.next()).await.unwrap();
    assert!(!first.is_done());
    assert!(second.is_done());
}

#[test]
fn sending_without_a_listener_neither_blocks_nor_fails() {
    // Reserve a port, then free it so nothing listens there.
    let port = {
        let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };

    let started = Instant::now();
    for i in 0..5 {
        send_to_port(port, format!("{i}"));
    }
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    send(addr, "done");

    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn stopped_listener_delivers_nothing_new() {
    let mut listener = ResultListener::bind_port(0).unwrap();
    let port = listener.local_addr().port();
    listener.stop();

    with_timeout(async {
        while listener.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    send_to_port(port, "late");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(listener.try_next().is_none());
}
