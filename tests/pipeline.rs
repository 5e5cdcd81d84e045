// End-to-end tests: submission → moderation → callback over real HTTP.
use std::sync::Arc;

use relay::prelude::*;
use relay::LocalRelay;
use relay_core::trace::{MemorySink, SpanRecord};
use reqwest::StatusCode;
use serde_json::Value;
use test_case::test_case;

async fn start() -> (LocalRelay, MemorySink) {
    let sink = MemorySink::new();
    let relay = LocalRelay::start(Arc::new(sink.clone()))
        .await
        .expect("relay started");
    (relay, sink)
}

async fn submit(client: &reqwest::Client, relay: &LocalRelay, message: &str) -> (StatusCode, String) {
    let response = client
        .post(format!("{}/send_message", relay.submission_url()))
        .form(&[("message", message)])
        .send()
        .await
        .expect("request sent");
    let status = response.status();
    (status, response.text().await.expect("body"))
}

async fn pending_snapshot(client: &reqwest::Client, relay: &LocalRelay) -> PendingMessages {
    client
        .get(format!("{}/", relay.moderation_url()))
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("json")
}

fn single(sink: &MemorySink, operation: &str) -> SpanRecord {
    let spans = sink.spans_for_operation(operation);
    assert_eq!(spans.len(), 1, "expected one {operation} span");
    spans.into_iter().next().expect("span")
}

#[tokio::test]
async fn hello_flows_through_both_queues() {
    let (relay, _sink) = start().await;
    let client = reqwest::Client::new();

    let (status, body) = submit(&client, &relay, "hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Message received successfully");

    let queues = relay.queues();
    assert_eq!(queues.read_all(QueueName::Pending).await.unwrap(), vec!["hello"]);
    assert_eq!(
        queues.read_all(QueueName::Approved).await.unwrap(),
        vec!["APPROVED: hello"]
    );

    relay.stop().await;
}

#[tokio::test]
async fn one_trace_spans_every_hop() {
    let (relay, sink) = start().await;
    let client = reqwest::Client::new();
    submit(&client, &relay, "hello").await;

    let send = single(&sink, "send_message");
    let forward = single(&sink, "admin_request");
    let approve = single(&sink, "approve_message");
    let callback = single(&sink, "user_callback");
    let approved = single(&sink, "message_approved");

    for span in [&forward, &approve, &callback, &approved] {
        assert_eq!(span.trace_id, send.trace_id);
    }
    assert!(send.parent_span_id.is_none());
    assert_eq!(forward.parent_span_id.as_ref(), Some(&send.span_id));
    assert_eq!(approve.parent_span_id.as_ref(), Some(&forward.span_id));
    assert_eq!(callback.parent_span_id.as_ref(), Some(&approve.span_id));
    assert_eq!(approved.parent_span_id.as_ref(), Some(&callback.span_id));

    assert_eq!(send.service, "submission");
    assert_eq!(approve.service, "moderation");
    assert!(approved.has_event("message approved"));

    relay.stop().await;
}

#[tokio::test]
async fn inbound_trace_context_is_continued() {
    let (relay, sink) = start().await;
    let response = reqwest::Client::new()
        .post(format!("{}/send_message", relay.submission_url()))
        .header(
            "uber-trace-id",
            "4bf92f3577b34da6a3ce929d0e0e4736:00f067aa0ba902b7:0:1",
        )
        .form(&[("message", "traced")])
        .send()
        .await
        .expect("request sent");
    assert_eq!(response.status(), StatusCode::OK);

    let send = single(&sink, "send_message");
    assert_eq!(send.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
    assert_eq!(send.parent_span_id.as_deref(), Some("00f067aa0ba902b7"));
    assert_eq!(single(&sink, "message_approved").trace_id, send.trace_id);

    relay.stop().await;
}

#[tokio::test]
async fn unreachable_moderation_leaves_orphaned_pending_entry() {
    let (relay, sink) = start().await;
    let LocalRelay {
        submission,
        moderation,
        shared,
    } = relay;
    moderation.stop().await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/send_message", submission.addr))
        .form(&[("message", "hello")])
        .send()
        .await
        .expect("request sent");
    assert!(response.status().is_server_error());

    assert_eq!(
        shared.queues.read_all(QueueName::Pending).await.unwrap(),
        vec!["hello"]
    );
    assert!(shared
        .queues
        .read_all(QueueName::Approved)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        single(&sink, "send_message").tag("error"),
        Some(&Value::from(true))
    );

    submission.stop().await;
}

#[test_case(1 ; "single submission")]
#[test_case(8 ; "a few concurrent submissions")]
#[test_case(32 ; "many concurrent submissions")]
#[tokio::test]
async fn concurrent_identical_submissions_are_all_kept(count: usize) {
    let (relay, sink) = start().await;
    let client = reqwest::Client::new();

    let results = futures::future::join_all((0..count).map(|_| submit(&client, &relay, "same"))).await;
    assert!(results.iter().all(|(status, _)| *status == StatusCode::OK));

    let queues = relay.queues();
    let pending = queues.read_all(QueueName::Pending).await.unwrap();
    let approved = queues.read_all(QueueName::Approved).await.unwrap();
    assert_eq!(pending.len(), count);
    assert_eq!(approved.len(), count);
    assert!(approved.iter().all(|entry| entry == "APPROVED: same"));
    assert_eq!(sink.spans_for_operation("send_message").len(), count);

    relay.stop().await;
}

#[tokio::test]
async fn snapshots_are_stable_without_writes() {
    let (relay, _sink) = start().await;
    let client = reqwest::Client::new();
    submit(&client, &relay, "first").await;
    submit(&client, &relay, "second").await;

    let first = pending_snapshot(&client, &relay).await;
    let second = pending_snapshot(&client, &relay).await;
    assert_eq!(first, second);
    assert_eq!(first.messages, vec!["first", "second"]);

    relay.stop().await;
}

#[tokio::test]
async fn missing_field_never_reaches_the_queue() {
    let (relay, _sink) = start().await;
    let response = reqwest::Client::new()
        .post(format!("{}/send_message", relay.submission_url()))
        .form(&[("body", "hello")])
        .send()
        .await
        .expect("request sent");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(relay
        .queues()
        .read_all(QueueName::Pending)
        .await
        .unwrap()
        .is_empty());

    relay.stop().await;
}

#[tokio::test]
async fn both_services_report_health() {
    let (relay, _sink) = start().await;
    let client = reqwest::Client::new();
    for base in [relay.submission_url(), relay.moderation_url()] {
        let body: Value = client
            .get(format!("{base}/health"))
            .send()
            .await
            .expect("request sent")
            .json()
            .await
            .expect("json");
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }
    relay.stop().await;
}
