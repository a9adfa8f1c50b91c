//! Notification sink delivery: ordering, pacing and failure isolation.

use std::sync::Arc;
use std::time::Duration;

use jipcy_core::fakes::RecordingTransport;
use jipcy_core::{NotificationSink, NotifyConfig, NotifyTarget, ProgressEvent};
use tokio_util::sync::CancellationToken;

fn started(key: &str) -> ProgressEvent {
    ProgressEvent::Started {
        key: key.to_string(),
        title: format!("title {}", key),
    }
}

fn start(transport: Arc<RecordingTransport>, config: NotifyConfig) -> NotificationSink {
    NotificationSink::start(
        transport,
        NotifyTarget::new("C01").in_thread("1700000000.000100"),
        &config,
        CancellationToken::new(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_delivers_in_enqueue_order() {
    let transport = Arc::new(RecordingTransport::new());
    let sink = start(transport.clone(), NotifyConfig::default());

    let notifier = sink.handle();
    for i in 1..=5 {
        notifier.notify(started(&format!("OPS-{}", i)));
    }
    drop(notifier);
    let stats = sink.close().await;

    assert_eq!(stats.delivered, 5);
    assert_eq!(stats.failed, 0);
    let texts = transport.texts();
    let expected: Vec<String> = (1..=5)
        .map(|i| format!("▶️ Started: `OPS-{}` - title OPS-{}", i, i))
        .collect();
    assert_eq!(texts, expected);

    let posts = transport.posts();
    assert!(posts
        .iter()
        .all(|p| p.channel == "C01" && p.thread_ts.as_deref() == Some("1700000000.000100")));
}

#[tokio::test(start_paused = true)]
async fn test_posts_are_spaced_by_interval() {
    let transport = Arc::new(RecordingTransport::new());
    let sink = start(transport.clone(), NotifyConfig::default());

    let notifier = sink.handle();
    for i in 0..4 {
        notifier.notify(started(&format!("OPS-{}", i)));
    }
    drop(notifier);
    sink.close().await;

    let posts = transport.posts();
    assert_eq!(posts.len(), 4);
    for pair in posts.windows(2) {
        assert!(
            pair[1].at - pair[0].at >= Duration::from_millis(500),
            "posts closer than the interval"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_delivery_failures_are_counted_and_skipped() {
    let transport = Arc::new(RecordingTransport::new().failing_when_contains("OPS-2"));
    let sink = start(transport.clone(), NotifyConfig::default());

    let notifier = sink.handle();
    for key in ["OPS-1", "OPS-2", "OPS-3"] {
        notifier.notify(started(key));
    }
    drop(notifier);
    let stats = sink.close().await;

    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(transport.posts().len(), 3);
}

#[tokio::test]
async fn test_full_buffer_keeps_completion_events() {
    let transport = Arc::new(RecordingTransport::new());
    let sink = start(
        transport.clone(),
        NotifyConfig {
            interval_ms: 1,
            capacity: 1,
        },
    );

    // The consumer has not been polled yet, so only the first Started fits.
    let notifier = sink.handle();
    for key in ["OPS-1", "OPS-2", "OPS-3"] {
        notifier.notify(started(key));
    }
    let cancel = CancellationToken::new();
    for key in ["OPS-1", "OPS-2", "OPS-3"] {
        notifier
            .send(
                ProgressEvent::Completed {
                    key: key.to_string(),
                    title: format!("title {}", key),
                    score: 0.5,
                    excluded: false,
                },
                &cancel,
            )
            .await;
    }
    drop(notifier);
    let stats = sink.close().await;

    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.delivered, 4);
    assert_eq!(
        transport.texts(),
        vec![
            "▶️ Started: `OPS-1` - title OPS-1".to_string(),
            "✅ Done: `OPS-1` - title OPS-1 (similarity: 0.50)".to_string(),
            "✅ Done: `OPS-2` - title OPS-2 (similarity: 0.50)".to_string(),
            "✅ Done: `OPS-3` - title OPS-3 (similarity: 0.50)".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_send_gives_up_when_cancelled() {
    let transport = Arc::new(RecordingTransport::new());
    let sink = start(
        transport.clone(),
        NotifyConfig {
            interval_ms: 1,
            capacity: 1,
        },
    );

    let notifier = sink.handle();
    notifier.notify(started("OPS-1"));
    let cancel = CancellationToken::new();
    cancel.cancel();
    // Buffer is full and the consumer has not run; a cancelled send returns at once.
    notifier.send(started("OPS-2"), &cancel).await;
    drop(notifier);
    let stats = sink.close().await;

    assert_eq!(stats.delivered, 1);
    assert_eq!(transport.texts().len(), 1);
}

#[tokio::test]
async fn test_cancel_stops_without_draining() {
    let transport = Arc::new(RecordingTransport::new());
    let cancel = CancellationToken::new();
    let sink = NotificationSink::start(
        transport.clone(),
        NotifyTarget::new("C01"),
        &NotifyConfig::default(),
        cancel.clone(),
    );

    let notifier = sink.handle();
    for i in 0..10 {
        notifier.notify(started(&format!("OPS-{}", i)));
    }
    cancel.cancel();
    let stats = sink.close().await;

    assert_eq!(stats.delivered, 0);
    assert!(transport.posts().is_empty());

    // Handles that outlive the sink must not block or panic.
    notifier.notify(started("OPS-late"));
}

#[tokio::test]
async fn test_rendering_neutralises_titles() {
    let transport = Arc::new(RecordingTransport::new());
    let sink = start(transport.clone(), NotifyConfig::default());

    let notifier = sink.handle();
    notifier.notify(ProgressEvent::Failed {
        key: "OPS-9".into(),
        title: "<!here> db down".into(),
        attempts: 3,
        error: "mail ops@example.com".into(),
    });
    drop(notifier);
    sink.close().await;

    let texts = transport.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("❌ Failed: `OPS-9`"));
    assert!(!texts[0].contains('@'));
    assert!(!texts[0].contains("<!here>"));
}
