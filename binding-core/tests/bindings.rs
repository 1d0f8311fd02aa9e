//! End-to-end behaviour of the binding service
//!
//! Covers the observable guarantees of the core:
//! - retry budget and aggregate errors
//! - logical-request metrics accounting
//! - error responses instead of failures on the send path
//! - registry consistency under concurrent add/remove

mod common;

use binding_core::{
    BindingConfig, BindingService, ConnectorSpec, MetricsExporter, Request, SendRequest,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn service(calls: Arc<AtomicU32>) -> Arc<BindingService> {
    Arc::new(BindingService::new(
        Arc::new(common::registry(calls)),
        Arc::new(MetricsExporter::new().unwrap()),
    ))
}

fn binding(name: &str, target: &str) -> BindingConfig {
    BindingConfig::new(name, ConnectorSpec::new("idle"), ConnectorSpec::new(target))
}

#[tokio::test]
async fn test_fixed_retry_against_failing_target() {
    let calls = Arc::new(AtomicU32::new(0));
    let svc = service(calls.clone());
    svc.add(
        &binding("orders", "failing")
            .with_property("retry_attempts", "3")
            .with_property("retry_delay_type", "fixed")
            .with_property("retry_delay_milliseconds", "100"),
    )
    .await
    .unwrap();

    let start = Instant::now();
    let resp = svc.send("orders", Request::new("payload")).await;
    let elapsed = start.elapsed();

    assert!(resp.is_error);
    assert!(elapsed >= Duration::from_millis(200), "elapsed {:?}", elapsed);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(resp.error.contains("after 3 attempts"));
    for n in 1..=3 {
        assert!(resp.error.contains(&format!("attempt {} failed", n)), "{}", resp.error);
    }

    let report = &svc.stats()[0];
    assert_eq!(report.request_count, 1);
    assert_eq!(report.errors_count, 1);
}

#[tokio::test]
async fn test_metrics_accumulate_success_and_failure() {
    let svc = service(Arc::new(AtomicU32::new(0)));
    svc.add(&binding("b1", "echo")).await.unwrap();

    let ok = svc.send("b1", Request::new("abcd")).await;
    assert!(!ok.is_error);
    let failed = svc
        .send("b1", Request::new("efgh").with_metadata("fail", "true"))
        .await;
    assert!(failed.is_error);

    let stats = svc.stats();
    assert_eq!(stats.len(), 1);
    let report = &stats[0];
    assert_eq!(report.key, "b1-idle-echo");
    assert_eq!(report.request_count, 2);
    assert_eq!(report.request_volume, 8);
    assert_eq!(report.response_count, 1);
    assert_eq!(report.response_volume, 4);
    assert_eq!(report.errors_count, 1);
}

#[tokio::test]
async fn test_metrics_continue_across_readd() {
    let svc = service(Arc::new(AtomicU32::new(0)));
    svc.add(&binding("b1", "echo")).await.unwrap();
    svc.send("b1", Request::new("ab")).await;
    svc.remove("b1").await.unwrap();

    svc.add(&binding("b1", "echo")).await.unwrap();
    svc.send("b1", Request::new("cd")).await;

    let report = &svc.stats()[0];
    assert_eq!(report.request_count, 2);
    assert_eq!(report.request_volume, 4);
}

#[tokio::test]
async fn test_send_body_to_unknown_binding() {
    let svc = service(Arc::new(AtomicU32::new(0)));
    let body: SendRequest =
        serde_json::from_str(r#"{"binding": "nowhere", "payload": {"data": "aGk="}}"#).unwrap();

    let resp = svc.send_body(body).await;
    assert!(resp.is_error);
    assert!(resp.error.contains("nowhere"));
}

#[tokio::test]
async fn test_metadata_property_reaches_target() {
    let svc = service(Arc::new(AtomicU32::new(0)));
    svc.add(&binding("b1", "echo").with_property("metadata", r#"{"fail": "true"}"#))
        .await
        .unwrap();

    let resp = svc.send("b1", Request::new("x")).await;
    assert!(resp.is_error);
    assert!(resp.error.contains("requested failure"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_remove_distinct_names() {
    let svc = service(Arc::new(AtomicU32::new(0)));

    let mut tasks = Vec::new();
    for i in 0..32 {
        let svc = svc.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("b{:02}", i);
            svc.add(&binding(&name, "echo")).await.unwrap();
            if i % 2 == 0 {
                svc.remove(&name).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let expected: Vec<String> = (0..32).filter(|i| i % 2 == 1).map(|i| format!("b{:02}", i)).collect();
    assert_eq!(svc.list(), expected);
    let statuses: Vec<String> = svc.status().into_iter().map(|s| s.binding).collect();
    assert_eq!(statuses, expected);
}
