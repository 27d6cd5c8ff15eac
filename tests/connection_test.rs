//! Integration tests for ConnectionManager using wiremock
//!
//! These tests validate connect, refresh and failure handling against mock
//! data servers.

mod common;

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    address_of, mount_data_resources, mount_dataset, mount_resource, mount_status, sample_records,
    status_body,
};
use expense_sync::client::{ClientConfig, ClientError, ConnectionManager, ConnectionState};

fn manager() -> ConnectionManager {
    let config = ClientConfig::default()
        .with_probe_timeout(Duration::from_secs(1))
        .with_fetch_timeout(Duration::from_secs(2));
    ConnectionManager::new(&config).unwrap()
}

/// Test a successful connect exposes all four resources from one fetch
#[tokio::test]
async fn test_connect_fetches_everything() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 5)).await;
    let address = address_of(&server);

    let manager = manager();
    let before = Utc::now();
    let dataset = manager.connect(&address).await.unwrap();
    let after = Utc::now();

    assert_eq!(manager.state(), ConnectionState::Connected(address.clone()));
    assert_eq!(dataset.address, address);
    assert_eq!(dataset.items.len(), 5);
    assert_eq!(dataset.stats.total_items, 5);
    assert_eq!(dataset.products.len(), 4);
    assert_eq!(dataset.establishments.len(), 3);
    assert!(dataset.fetched_at >= before && dataset.fetched_at <= after);

    let view = manager.snapshot();
    assert!(view.last_error.is_none());
    assert_eq!(view.dataset.as_deref(), Some(&*dataset));
}

/// Test sub-second timeouts still allow a normal connect and refresh
#[tokio::test]
async fn test_sub_second_timeouts() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 3)).await;

    let config = ClientConfig::default()
        .with_probe_timeout(Duration::from_millis(800))
        .with_fetch_timeout(Duration::from_millis(800));
    let manager = ConnectionManager::new(&config).unwrap();

    let dataset = manager.connect(&address_of(&server)).await.unwrap();
    assert_eq!(dataset.items.len(), 3);
    assert!(manager.refresh().await.is_ok());
}

/// Test a URL-style address is normalized to host:port
#[tokio::test]
async fn test_connect_with_url() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 2)).await;

    let manager = manager();
    let dataset = manager.connect(&format!("{}/", server.uri())).await.unwrap();

    assert_eq!(dataset.address, address_of(&server));
}

/// Test one failing resource fails the whole connect
#[tokio::test]
async fn test_connect_with_failing_products() {
    let server = MockServer::start().await;
    let records = sample_records("a", 5);
    mount_status(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_data_resources(&server, &records).await;

    let manager = manager();
    let result = manager.connect(&address_of(&server)).await;

    assert_eq!(result, Err(ClientError::ServerError { status: 500 }));
    assert_eq!(
        manager.state(),
        ConnectionState::Failed(ClientError::ServerError { status: 500 })
    );
    assert!(manager.dataset().is_none());
}

/// Test a server with a different signature is rejected
#[tokio::test]
async fn test_connect_wrong_app_name() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "/api/status",
        ResponseTemplate::new(200).set_body_json(status_body("photo-share")),
    )
    .await;
    mount_data_resources(&server, &sample_records("a", 3)).await;

    let manager = manager();
    let result = manager.connect(&address_of(&server)).await;

    assert!(matches!(result, Err(ClientError::Incompatible(_))));
    assert!(matches!(
        manager.state(),
        ConnectionState::Failed(ClientError::Incompatible(_))
    ));
    assert!(manager.dataset().is_none());
}

/// Test an unrelated HTTP service (no /api/status) is incompatible
#[tokio::test]
async fn test_connect_to_unrelated_service() {
    let server = MockServer::start().await;

    let manager = manager();
    let result = manager.connect(&address_of(&server)).await;

    assert!(matches!(result, Err(ClientError::Incompatible(_))));
}

/// Test a slow status probe times out as unreachable
#[tokio::test]
async fn test_connect_timeout() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "/api/status",
        ResponseTemplate::new(200)
            .set_body_json(status_body("expense-tracker"))
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let manager = manager();
    let started = Instant::now();
    let result = manager.connect(&address_of(&server)).await;

    assert!(matches!(result, Err(ClientError::Unreachable(_))));
    assert!(started.elapsed() < Duration::from_secs(3));
}

/// Test a failed refresh keeps the previous dataset
#[tokio::test]
async fn test_refresh_failure_keeps_dataset() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 5)).await;

    let manager = manager();
    let first = manager.connect(&address_of(&server)).await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = manager.refresh().await;
    assert_eq!(result, Err(ClientError::ServerError { status: 500 }));

    let view = manager.snapshot();
    assert!(view.state.is_connected());
    assert_eq!(view.last_error, Some(ClientError::ServerError { status: 500 }));
    let kept = view.dataset.unwrap();
    assert_eq!(kept.fetched_at, first.fetched_at);
    assert_eq!(kept.items.len(), 5);
}

/// Test a successful refresh clears the previous error
#[tokio::test]
async fn test_refresh_recovers() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 5)).await;

    let manager = manager();
    manager.connect(&address_of(&server)).await.unwrap();

    server.reset().await;
    let result = manager.refresh().await;
    assert!(result.is_err());
    assert!(manager.snapshot().last_error.is_some());

    mount_dataset(&server, &sample_records("a", 5)).await;
    manager.refresh().await.unwrap();
    assert!(manager.snapshot().last_error.is_none());
}

/// Test refresh replaces the dataset wholesale
#[tokio::test]
async fn test_refresh_replaces_dataset() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 5)).await;

    let manager = manager();
    let first = manager.connect(&address_of(&server)).await.unwrap();
    assert_eq!(first.items.len(), 5);

    server.reset().await;
    mount_dataset(&server, &sample_records("b", 8)).await;

    let second = manager.refresh().await.unwrap();
    assert_eq!(second.items.len(), 8);
    assert_eq!(second.stats.total_items, 8);
    assert!(second.fetched_at >= first.fetched_at);

    let ids: HashSet<_> = manager
        .dataset()
        .unwrap()
        .items
        .iter()
        .map(|item| item.id.clone())
        .collect();
    let expected: HashSet<_> = (1..=8).map(|i| format!("b-{i}")).collect();
    assert_eq!(ids, expected);
}

/// Test switching servers drops the old dataset, reconnecting the same one keeps it
#[tokio::test]
async fn test_switching_servers() {
    let first = MockServer::start().await;
    mount_dataset(&first, &sample_records("a", 3)).await;
    let second = MockServer::start().await;
    mount_status(&second).await;

    let manager = manager();
    manager.connect(&address_of(&first)).await.unwrap();

    // Different address: the old dataset is gone even though connect fails
    assert!(manager.connect(&address_of(&second)).await.is_err());
    assert!(manager.dataset().is_none());

    // Same address failing again: the last dataset for it survives
    manager.connect(&address_of(&first)).await.unwrap();
    first.reset().await;
    mount_status(&first).await;
    assert!(manager.connect(&address_of(&first)).await.is_err());
    let kept = manager.dataset().unwrap();
    assert_eq!(kept.address, address_of(&first));
    assert!(matches!(manager.state(), ConnectionState::Failed(_)));
}

/// Test subscribers observe the connect sequence
#[tokio::test]
async fn test_subscribe_sees_connect() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 2)).await;
    let address = address_of(&server);

    let manager = manager();
    let mut view = manager.subscribe();
    assert_eq!(view.borrow().state, ConnectionState::Disconnected);

    manager.connect(&address).await.unwrap();

    assert!(view.has_changed().unwrap());
    let current = view.borrow_and_update().clone();
    assert_eq!(current.state, ConnectionState::Connected(address));
    assert_eq!(current.dataset.unwrap().items.len(), 2);
}

/// Test disconnect clears everything
#[tokio::test]
async fn test_disconnect() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 2)).await;

    let manager = manager();
    manager.connect(&address_of(&server)).await.unwrap();
    manager.disconnect().await;

    let view = manager.snapshot();
    assert_eq!(view.state, ConnectionState::Disconnected);
    assert!(view.dataset.is_none());
    assert_eq!(manager.refresh().await, Err(ClientError::NotConnected));
}

/// Test the auto-refresh task picks up new server data
#[tokio::test]
async fn test_auto_refresh_picks_up_changes() {
    let server = MockServer::start().await;
    mount_dataset(&server, &sample_records("a", 2)).await;

    let manager = Arc::new(manager());
    manager.connect(&address_of(&server)).await.unwrap();

    server.reset().await;
    mount_dataset(&server, &sample_records("b", 6)).await;

    let mut view = manager.subscribe();
    let task = manager.clone().start_auto_refresh(Duration::from_millis(50));

    let refreshed = tokio::time::timeout(
        Duration::from_secs(5),
        view.wait_for(|v| v.dataset.as_ref().is_some_and(|d| d.items.len() == 6)),
    )
    .await
    .is_ok_and(|changed| changed.is_ok());
    task.abort();

    assert!(refreshed, "auto refresh never delivered the new dataset");
    assert!(manager.is_connected());
    assert!(manager.snapshot().last_error.is_none());
}
