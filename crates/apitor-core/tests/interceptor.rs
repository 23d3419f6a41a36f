#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use apitor_core::defaults::*;
use apitor_core::{Metric, MetricKind, Monitor, MonitorConfig, MonitorError, RequestFacts};

fn ago(ms: u64) -> Instant {
    Instant::now()
        .checked_sub(Duration::from_millis(ms))
        .expect("clock too close to boot")
}

fn facts(caller: &str, path: &str, elapsed_ms: u64) -> RequestFacts {
    RequestFacts {
        start: ago(elapsed_ms),
        caller: caller.into(),
        method: "GET".into(),
        path: path.into(),
        status: 200,
        request_bytes: 120,
        response_bytes: 340,
    }
}

fn monitor(slow_time: u64, exclude: &[&str]) -> Arc<Monitor> {
    let mut m = Monitor::new(MonitorConfig {
        slow_time,
        exclude_paths: exclude.iter().map(|s| s.to_string()).collect(),
        ..MonitorConfig::default()
    });
    m.register_default_metrics().unwrap();
    Arc::new(m)
}

fn counter(m: &Monitor, name: &str, labels: &[&str]) -> f64 {
    m.get_metric(name).unwrap().value(labels).unwrap()
}

#[tokio::test]
async fn single_request_updates_expected_series() {
    let m = monitor(1, &["/health"]);
    m.intercept(facts("1.2.3.4", "/items", 50)).await.unwrap();

    assert_eq!(counter(&m, REQUEST_TOTAL, &[]), 1.0);
    assert_eq!(counter(&m, REQUEST_UV_TOTAL, &[]), 1.0);
    assert_eq!(counter(&m, URI_REQUEST_TOTAL, &["/items", "GET", "200"]), 1.0);
    assert_eq!(counter(&m, REQUEST_BODY_TOTAL, &[]), 120.0);
    assert_eq!(counter(&m, RESPONSE_BODY_TOTAL, &[]), 340.0);

    let duration = m.get_metric(REQUEST_DURATION).unwrap();
    assert_eq!(duration.sample_count(&["/items"]).unwrap(), 1);
    let observed = duration.sample_sum(&["/items"]).unwrap();
    assert!((0.05..1.0).contains(&observed), "observed {observed}");

    let slow = m.get_metric(SLOW_REQUEST_TOTAL).unwrap();
    assert_eq!(slow.series_count(), 0);
}

#[tokio::test]
async fn excluded_and_exposition_paths_are_not_measured() {
    let m = monitor(1, &["/health"]);
    m.intercept(facts("1.2.3.4", "/health", 10)).await.unwrap();
    m.intercept(facts("1.2.3.4", "/debug/metrics", 10)).await.unwrap();

    for name in DEFAULT_METRICS {
        assert_eq!(m.get_metric(name).unwrap().series_count(), 0, "{name} touched");
    }
}

#[tokio::test]
async fn unknown_request_size_is_skipped() {
    let m = monitor(5, &[]);
    let mut f = facts("1.2.3.4", "/upload", 10);
    f.request_bytes = -1;
    f.response_bytes = 0;
    m.intercept(f).await.unwrap();

    assert_eq!(m.get_metric(REQUEST_BODY_TOTAL).unwrap().series_count(), 0);
    assert_eq!(m.get_metric(RESPONSE_BODY_TOTAL).unwrap().series_count(), 0);
    assert_eq!(counter(&m, REQUEST_TOTAL, &[]), 1.0);
}

#[tokio::test]
async fn zero_request_size_is_still_recorded() {
    let m = monitor(5, &[]);
    let mut f = facts("1.2.3.4", "/", 10);
    f.request_bytes = 0;
    m.intercept(f).await.unwrap();
    assert_eq!(m.get_metric(REQUEST_BODY_TOTAL).unwrap().series_count(), 1);
}

#[tokio::test]
async fn unique_caller_counted_once() {
    let m = monitor(5, &[]);
    m.intercept(facts("9.9.9.9", "/a", 10)).await.unwrap();
    m.intercept(facts("9.9.9.9", "/b", 10)).await.unwrap();
    assert_eq!(counter(&m, REQUEST_UV_TOTAL, &[]), 1.0);
    assert_eq!(counter(&m, REQUEST_TOTAL, &[]), 2.0);

    m.intercept(facts("8.8.8.8", "/a", 10)).await.unwrap();
    assert_eq!(counter(&m, REQUEST_UV_TOTAL, &[]), 2.0);
}

#[tokio::test]
async fn slow_threshold_uses_whole_seconds() {
    let m = monitor(2, &[]);
    m.intercept(facts("1.1.1.1", "/slow", 2500)).await.unwrap();
    assert_eq!(counter(&m, SLOW_REQUEST_TOTAL, &["/slow", "GET", "200"]), 1.0);

    m.intercept(facts("1.1.1.1", "/fast", 1900)).await.unwrap();
    assert_eq!(counter(&m, SLOW_REQUEST_TOTAL, &["/fast", "GET", "200"]), 0.0);

    // truncation: 2.9s is still "2 whole seconds", not more than 2
    m.intercept(facts("1.1.1.1", "/edge", 2900)).await.unwrap();
    assert_eq!(counter(&m, SLOW_REQUEST_TOTAL, &["/edge", "GET", "200"]), 0.0);
}

#[tokio::test]
async fn metadata_values_follow_key_order() {
    let mut m = Monitor::new(MonitorConfig {
        metadata: vec![("env".into(), "prod".into()), ("zone".into(), "a1".into())],
        ..MonitorConfig::default()
    });
    m.register_default_metrics().unwrap();
    let m = Arc::new(m);

    m.intercept(facts("1.2.3.4", "/items", 10)).await.unwrap();

    assert_eq!(counter(&m, REQUEST_TOTAL, &["prod", "a1"]), 1.0);
    assert_eq!(
        counter(&m, URI_REQUEST_TOTAL, &["/items", "GET", "200", "prod", "a1"]),
        1.0
    );
    let text = m.gather_text().unwrap();
    assert!(text.contains(r#"request_total{env="prod",zone="a1"} 1"#));
}

#[tokio::test]
async fn first_failure_reported_and_siblings_still_apply() {
    let mut m = Monitor::default();
    // duration registered with the wrong kind, most defaults missing
    m.add_metric(Metric::new(MetricKind::Counter, REQUEST_DURATION).labels(["uri"]))
        .unwrap();
    m.add_metric(
        Metric::new(MetricKind::Counter, URI_REQUEST_TOTAL).labels(["uri", "method", "code"]),
    )
    .unwrap();
    let m = Arc::new(m);

    let err = m
        .intercept(facts("1.2.3.4", "/items", 10))
        .await
        .expect_err("updates must fail");
    assert!(matches!(
        err,
        MonitorError::NotFound(_) | MonitorError::WrongKind { .. }
    ));

    assert_eq!(counter(&m, URI_REQUEST_TOTAL, &["/items", "GET", "200"]), 1.0);
    assert_eq!(m.get_metric(REQUEST_DURATION).unwrap().series_count(), 0);
}

#[tokio::test]
async fn custom_interceptors_run_per_request() {
    let seen = Arc::new(AtomicUsize::new(0));
    let mut m = Monitor::default();
    m.register_default_metrics().unwrap();
    {
        let seen = Arc::clone(&seen);
        m.add_interceptor(move |f: &RequestFacts| {
            assert_eq!(f.method, "GET");
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    m.add_interceptor(|f: &RequestFacts| {
        if f.path == "/boom" {
            Err(MonitorError::Internal("hook failed".into()))
        } else {
            Ok(())
        }
    });
    let m = Arc::new(m);

    m.intercept(facts("1.2.3.4", "/ok", 10)).await.unwrap();
    let err = m.intercept(facts("1.2.3.4", "/boom", 10)).await.unwrap_err();
    assert!(matches!(err, MonitorError::Internal(_)));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    // metric updates for the failing request still happened
    assert_eq!(counter(&m, URI_REQUEST_TOTAL, &["/boom", "GET", "200"]), 1.0);
}

#[tokio::test]
async fn custom_gauge_via_parsed_kind() {
    let mut m = Monitor::default();
    m.add_metric(
        Metric::parse("gauge", "inflight")
            .unwrap()
            .description("requests in flight")
            .labels(["pool"]),
    )
    .unwrap();
    let g = m.get_metric("inflight").unwrap();
    g.set_value(&["db"], 3.0).unwrap();
    g.add(&["db"], 2.0).unwrap();
    assert_eq!(g.value(&["db"]).unwrap(), 5.0);
}

#[tokio::test]
async fn dropped_intercept_still_records() {
    let m = monitor(5, &[]);

    // poll once so every task is submitted, then abandon the future
    let finished = tokio::select! {
        biased;
        _ = m.intercept(facts("7.7.7.7", "/gone", 10)) => true,
        _ = std::future::ready(()) => false,
    };
    assert!(!finished);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counter(&m, REQUEST_TOTAL, &[]), 1.0);
    assert_eq!(counter(&m, REQUEST_UV_TOTAL, &[]), 1.0);
    assert_eq!(counter(&m, URI_REQUEST_TOTAL, &["/gone", "GET", "200"]), 1.0);

    // the caller was recorded by the detached unique-caller task
    m.intercept(facts("7.7.7.7", "/gone", 10)).await.unwrap();
    assert_eq!(counter(&m, REQUEST_UV_TOTAL, &[]), 1.0);
}
