//! End-to-end fan-out through `ChannelTransport`, the way the relay wires it.

use std::sync::Arc;
use std::time::Duration;

use joblog_multiplexer::{
    ChannelSink, ChannelTransport, LogMultiplexer, LogViewer, Subscriber, DEFAULT_SINK_CAPACITY,
};
use joblog_types::ControlMessage;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc::UnboundedReceiver;

fn setup() -> (Arc<LogMultiplexer>, UnboundedReceiver<String>) {
    let (transport, rx) = ChannelTransport::new();
    (Arc::new(LogMultiplexer::new(Arc::new(transport))), rx)
}

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<ControlMessage> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|frame| serde_json::from_str(&frame).unwrap())
        .collect()
}

#[test]
fn two_viewers_one_wire_subscription() {
    let (mux, mut wire) = setup();

    let first = LogViewer::open(mux.clone(), "nightly");
    let second = LogViewer::open(mux.clone(), "nightly");
    assert_eq!(
        drain(&mut wire),
        vec![ControlMessage::SubscribeLogs {
            id: "1".into(),
            name: "nightly".into()
        }]
    );

    mux.handle_frame(r#"{"type":"log_chunk","name":"nightly","content":"compiling\n"}"#)
        .unwrap();
    mux.handle_frame(r#"{"type":"log_chunk","name":"nightly","content":"\u001b[32mok\u001b[0m\n"}"#)
        .unwrap();
    assert_eq!(first.current(), second.current());
    assert_eq!(first.current().as_str(), "compiling\n\x1b[32mok\x1b[0m\n");

    drop(first);
    assert!(drain(&mut wire).is_empty());
    drop(second);
    assert_eq!(
        drain(&mut wire),
        vec![ControlMessage::UnsubscribeLogs {
            name: "nightly".into()
        }]
    );
}

#[test]
fn late_viewer_sees_canonical_history() {
    let (mux, _wire) = setup();
    let rule = "-".repeat(40);
    mux.dispatch_chunk("deploy", "build ok\n");
    mux.dispatch_chunk("deploy", &format!("{rule}\n{rule}\n\n\n"));
    mux.dispatch_chunk("deploy", "deploying\n");

    let viewer = LogViewer::open(mux, "deploy");
    assert_eq!(viewer.canonical(10), "build ok\n----------\n\ndeploying\n");
}

#[tokio::test]
async fn channel_sink_receives_every_chunk_in_order() {
    let (mux, _wire) = setup();
    let (sink, mut rx) = ChannelSink::channel(DEFAULT_SINK_CAPACITY);
    let sub = Subscriber::new(sink);
    let id = sub.id();
    mux.subscribe("job", sub);

    for line in ["a\n", "b\n", "c\n"] {
        mux.dispatch_chunk("job", line);
    }

    let mut seen = Vec::new();
    for _ in 0..3 {
        let snap = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(snap.as_str().to_string());
    }
    assert_eq!(seen, vec!["a\n", "a\nb\n", "a\nb\nc\n"]);

    assert!(mux.unsubscribe("job", id).removed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn viewers_on_other_threads_converge() {
    let (mux, _wire) = setup();
    let viewers: Vec<LogViewer> = (0..4).map(|_| LogViewer::open(mux.clone(), "job")).collect();

    let producer = {
        let mux = mux.clone();
        tokio::spawn(async move {
            for i in 0..100 {
                mux.dispatch_chunk("job", &format!("{i}\n"));
                if i % 10 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };
    producer.await.unwrap();

    let expected: String = (0..100).map(|i| format!("{i}\n")).collect();
    for viewer in &viewers {
        assert_eq!(viewer.current().as_str(), expected);
    }
    assert_eq!(mux.subscriber_count("job"), 4);
    drop(viewers);
    assert_eq!(mux.subscriber_count("job"), 0);
}
