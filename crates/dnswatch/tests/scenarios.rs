//! End-to-end scenarios: configuration in, snapshot out.

mod common;

use common::*;
use dnswatch::{
    ChannelNotifier, ConfigFormat, Protocol, ProberSet, Watcher, WatcherConfig,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn watcher(yaml: &str) -> Watcher {
    let config = WatcherConfig::parse(yaml, ConfigFormat::Yaml).unwrap();
    Watcher::from_config(&config).unwrap()
}

fn http_record(content: &str, rule: &str, targets: &[(&str, String)], extra: &str) -> String {
    let mut out = format!(
        "          - name: {NAME}\n            type: A\n            ttl: 60\n            content: \"{content}\"\n            eval_rule: \"{rule}\"\n            notify_triggers: [changed]\n            targets:\n"
    );
    for (name, url) in targets {
        out.push_str(&format!(
            "              - {{ name: {name}, protocol: http, dest: \"{url}\", timeout_ms: 2000{extra} }}\n"
        ));
    }
    out
}

async fn serve(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn alive(watcher: &Watcher, content: &str) -> bool {
    watcher.snapshot().find(ZONE, NAME, content).unwrap().alive
}

#[tokio::test]
async fn test_healthy_http_target_is_alive() {
    let server = serve(200).await;
    let url = format!("{}/health", server.uri());
    let watcher = watcher(&yaml_config(&http_record(
        "192.0.2.10",
        "%(a)",
        &[("a", url)],
        ", http_status: [\"200\"]",
    )));

    assert_eq!(watcher.check_once().await, 1);
    assert!(alive(&watcher, "192.0.2.10"));
    assert!(watcher.state().records().all(|r| r.alive()));
}

#[tokio::test]
async fn test_disallowed_status_is_dead_without_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let url = format!("{}/health", server.uri());
    let watcher = watcher(&yaml_config(&http_record(
        "192.0.2.10",
        "%(a)",
        &[("a", url)],
        ", http_status: [\"200\"], retry: 3, retry_wait_ms: 50",
    )));

    watcher.check_once().await;
    assert!(!alive(&watcher, "192.0.2.10"));
    server.verify().await;
}

#[tokio::test]
async fn test_negated_target_rule() {
    let a = serve(200).await;
    let b = serve(200).await;
    let watcher = watcher(&yaml_config(&http_record(
        "192.0.2.10",
        "%(a) && !%(b)",
        &[
            ("a", format!("{}/health", a.uri())),
            ("b", format!("{}/health", b.uri())),
        ],
        "",
    )));

    watcher.check_once().await;
    assert!(!alive(&watcher, "192.0.2.10"));
}

#[tokio::test]
async fn test_negative_record_tracks_group() {
    let one = serve(503).await;
    let two = serve(503).await;
    let records = http_record(
        "192.0.2.10",
        "%(a)",
        &[("a", format!("{}/health", one.uri()))],
        ", http_status: [\"2..\"]",
    ) + &http_record(
        "192.0.2.11",
        "%(a)",
        &[("a", format!("{}/health", two.uri()))],
        ", http_status: [\"2..\"]",
    );
    let watcher = watcher(&yaml_config(&records));

    watcher.check_once().await;
    assert!(!alive(&watcher, "192.0.2.10"));
    assert!(!alive(&watcher, "192.0.2.11"));
    let negative = watcher.snapshot().find(ZONE, NAME, NEGATIVE).cloned().unwrap();
    assert!(negative.negative);
    assert_eq!(negative.record_type, "A");
    assert!(negative.alive);

    two.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&two)
        .await;

    watcher.check_once().await;
    assert!(alive(&watcher, "192.0.2.11"));
    assert!(!alive(&watcher, NEGATIVE));
}

#[tokio::test]
async fn test_force_down_overrides_verdict() {
    let server = serve(200).await;
    let watcher = watcher(&yaml_config(&http_record(
        "192.0.2.10",
        "%(a)",
        &[("a", format!("{}/health", server.uri()))],
        "",
    )));

    watcher.check_once().await;
    assert!(alive(&watcher, "192.0.2.10"));

    let changed = watcher
        .state()
        .set_force_down(ZONE, NAME, "a", "192.0.2.10", true)
        .unwrap();
    assert_eq!(changed, 1);
    assert!(!alive(&watcher, "192.0.2.10"));
    assert!(alive(&watcher, NEGATIVE));

    // The computed verdict is untouched and stays in force after more cycles.
    watcher.check_once().await;
    assert!(watcher.state().records().all(|r| r.alive()));
    assert!(!alive(&watcher, "192.0.2.10"));

    watcher
        .state()
        .set_force_down(ZONE, NAME, "A", "192.0.2.10", false)
        .unwrap();
    assert!(alive(&watcher, "192.0.2.10"));
}

#[tokio::test]
async fn test_transition_reaches_notifier() {
    let server = serve(200).await;
    let yaml = yaml_config(&http_record(
        "192.0.2.10",
        "%(a)",
        &[("a", format!("{}/health", server.uri()))],
        "",
    ));
    let config = WatcherConfig::parse(&yaml, ConfigFormat::Yaml).unwrap();
    let (notifier, mut rx) = ChannelNotifier::channel(8);
    let watcher = Watcher::builder(Arc::new(config.build_state()), ProberSet::standard().unwrap())
        .notifier(Arc::new(notifier))
        .build();

    watcher.check_once().await;
    let up = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(up.zone, ZONE);
    assert_eq!(up.group, GROUP);
    assert!(!up.previous && up.current);

    // Unchanged verdict: nothing is sent.
    watcher.check_once().await;
    assert!(tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn test_single_flight_under_tick_pressure() {
    let yaml = yaml_config(&format!(
        "          - name: {NAME}\n            type: A\n            ttl: 60\n            content: \"192.0.2.10\"\n            watch_interval: 1\n            eval_rule: \"%(a)\"\n            targets:\n              - {{ name: a, protocol: tcp, dest: \"192.0.2.10:80\" }}\n"
    ));
    let config = WatcherConfig::parse(&yaml, ConfigFormat::Yaml).unwrap();
    let prober = Arc::new(SlowProber::new(Duration::from_millis(150)));
    let probers = ProberSet::empty().with(Protocol::Tcp, Arc::clone(&prober) as Arc<dyn dnswatch::Prober>);
    let watcher = Watcher::builder(Arc::new(config.build_state()), probers)
        .tick(Duration::from_millis(10))
        .build();

    watcher.start().unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    watcher.stop().await;
    watcher.wait_idle().await;

    let calls = prober.calls.load(Ordering::SeqCst);
    assert_eq!(prober.max_active.load(Ordering::SeqCst), 1);
    assert!((2..=5).contains(&calls), "calls = {calls}");
    assert!(watcher.state().records().all(|r| !r.in_progress()));
}
