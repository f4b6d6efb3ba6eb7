// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Real sockets: HttpServer on an ephemeral port, HttpPeerClient against it

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use metricx::client::HttpPeerClient;
use metricx::codec::HistoryRequest;
use metricx::config::{Exchange, ExchangeConfig};
use metricx::http_server::HttpServer;
use metricx::metric::{MetricId, Timestamped};
use metricx::sync::{JobScheduler, PeerAuth, PeerClient, RemoteLink, TokioScheduler};
use metricx::ExchangeError;
use tokio::net::TcpListener;

const HOSTED: &str = r#"
request_logging = false

[access]
secrets = ["secret"]

[[access.tokens]]
token = "reader"
permissions = ["list", "last"]
accessibleMetrics = ["log"]

[[metrics]]
name = "log"
description = "application log"

[[metrics]]
name = "idle"

[[metrics]]
name = "inbox"
remotely_updatable = true
"#;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn start(config: &ExchangeConfig, listener: TcpListener) -> Exchange {
    let client: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new().unwrap());
    let scheduler: Arc<dyn JobScheduler> = Arc::new(TokioScheduler::current().unwrap());
    let exchange = config.build_with(client, scheduler).unwrap();
    let server = HttpServer::new(config.server(), Arc::clone(&exchange.handler));
    tokio::spawn(async move { server.serve(listener).await });
    exchange
}

fn at(seconds: i64) -> DateTime<chrono::Utc> {
    DateTime::from_timestamp_millis(seconds * 1000).unwrap()
}

#[tokio::test]
async fn test_client_against_live_server() {
    let (listener, url) = bind().await;
    let config = ExchangeConfig::from_toml(HOSTED).unwrap();
    let exchange = start(&config, listener);
    exchange.metrics.get_by_name("log").unwrap().record("test");

    let client = HttpPeerClient::new().unwrap();
    let root = RemoteLink::new(&url).with_auth(PeerAuth::token("secret"));
    let log = MetricId::of("log");

    let listed = client.list(&root).await.unwrap();
    assert_eq!(listed.len(), 3);

    let last = client.last(&root, &log).await.unwrap().unwrap();
    assert_eq!(last.value, serde_json::json!("test"));
    assert!(client.last(&root, &MetricId::of("idle")).await.unwrap().is_none());

    let all = client.last_all(&root).await.unwrap();
    assert_eq!(all.len(), 1);
    let extended = client.extended_list(&root).await.unwrap();
    assert_eq!(extended[&log].info.description, "application log");

    let history = client
        .history(&root, &log, &HistoryRequest::everything())
        .await
        .unwrap();
    assert_eq!(history, vec![last]);
}

#[tokio::test]
async fn test_denials_surface_as_remote_status() {
    let (listener, url) = bind().await;
    let config = ExchangeConfig::from_toml(HOSTED).unwrap();
    let _exchange = start(&config, listener);
    let client = HttpPeerClient::new().unwrap();

    let reader = RemoteLink::new(&url).with_auth(PeerAuth::token("reader"));
    let listed = client.list(&reader).await.unwrap();
    assert_eq!(listed.len(), 1);

    let err = client
        .history(&reader, &MetricId::of("log"), &HistoryRequest::everything())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::RemoteStatus { status: 401, .. }), "{:?}", err);

    let anonymous = RemoteLink::new(&url);
    let err = client.list(&anonymous).await.unwrap_err();
    assert!(matches!(err, ExchangeError::RemoteStatus { status: 400, .. }), "{:?}", err);
}

#[tokio::test]
async fn test_push_over_http() {
    let (listener, url) = bind().await;
    let config = ExchangeConfig::from_toml(HOSTED).unwrap();
    let exchange = start(&config, listener);
    let client = HttpPeerClient::new().unwrap();
    let root = RemoteLink::new(&url).with_auth(PeerAuth::token("secret"));
    let inbox = MetricId::of("inbox");

    let values = vec![Timestamped::new(at(2), "b"), Timestamped::new(at(1), "a")];
    client.push_values(&root, &inbox, &values).await.unwrap();
    let stored = exchange.metrics.get(&inbox).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.last().unwrap().value, serde_json::json!("b"));

    // Not remotely updatable.
    let err = client
        .push_values(&root, &MetricId::of("log"), &values)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::RemoteStatus { status: 412, .. }), "{:?}", err);

    // Notify-only push without a pull binding.
    let err = client.notify_push(&root, &inbox).await.unwrap_err();
    assert!(matches!(err, ExchangeError::RemoteStatus { status: 412, .. }), "{:?}", err);
}

#[tokio::test]
async fn test_two_instances_synchronize_over_http() {
    let (origin_listener, origin_url) = bind().await;
    let (replica_listener, replica_url) = bind().await;

    let origin_config = ExchangeConfig::from_toml(&format!(
        r#"
request_logging = false

[access]
[[access.tokens]]
token = "replica-reads"
permissions = ["history"]

[[metrics]]
name = "cpu"

[[peers]]
name = "replica"
base_url = "{replica_url}"
token = "origin-pushes"

[[sync]]
metric = "cpu"
peer = "replica"
remote_metric = "cpu_of_origin"
direction = "push"
"#
    ))
    .unwrap();

    let replica_config = ExchangeConfig::from_toml(&format!(
        r#"
request_logging = false

[access]
[[access.tokens]]
token = "origin-pushes"
permissions = ["push"]

[[metrics]]
name = "cpu_of_origin"
remotely_updatable = true

[[peers]]
name = "origin"
base_url = "{origin_url}"
token = "replica-reads"

[[sync]]
metric = "cpu_of_origin"
peer = "origin"
remote_metric = "cpu"
"#
    ))
    .unwrap();

    let origin = start(&origin_config, origin_listener);
    let replica = start(&replica_config, replica_listener);

    let cpu = origin.metrics.get_by_name("cpu").unwrap();
    cpu.append((1..=5).map(|i| Timestamped::new(at(i), i * 10)).collect());

    let mirror = replica.metrics.get_by_name("cpu_of_origin").unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while mirror.len() < 5 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(
        mirror.history(&HistoryRequest::everything()),
        cpu.history(&HistoryRequest::everything())
    );
}
