//! Common test utilities

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use expense_sync::endpoint::{ServerConfig, ServerError, SyncServer};
use expense_sync::models::{EstablishmentSummary, ProductSummary, PurchaseRecord};
use expense_sync::provider::{aggregate_by, compute_stats, AggregateKey, DataProvider};

const PRODUCTS: &[&str] = &["Milk", "Bread", "Coffee", "Apples"];
const ESTABLISHMENTS: &[&str] = &["Corner Shop", "Bakery", "Farmers Market"];

/// Create `count` records with ids `{prefix}-1..`
pub fn sample_records(prefix: &str, count: usize) -> Vec<PurchaseRecord> {
    (0..count)
        .map(|i| {
            let mut record = PurchaseRecord::new(
                format!("{prefix}-{}", i + 1),
                PRODUCTS[i % PRODUCTS.len()],
                ESTABLISHMENTS[i % ESTABLISHMENTS.len()],
                1.5 + i as f64,
            );
            record.quantity = (i % 3 + 1) as f64;
            record.purchased_at = Utc.with_ymd_and_hms(2024, 3, 1 + (i % 28) as u32, 12, 0, 0).unwrap();
            record
        })
        .collect()
}

/// `/api/status` body
pub fn status_body(app_name: &str) -> Value {
    json!({
        "status": "online",
        "appName": app_name,
        "version": "1.4.0",
        "timestamp": Utc::now().to_rfc3339(),
        "deviceName": "Test phone",
    })
}

/// Mount one resource
#[allow(dead_code)]
pub async fn mount_resource(server: &MockServer, resource: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(resource))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mount a compatible status response
#[allow(dead_code)]
pub async fn mount_status(server: &MockServer) {
    mount_resource(
        server,
        "/api/status",
        ResponseTemplate::new(200).set_body_json(status_body("expense-tracker")),
    )
    .await;
}

/// Mount all five resources serving `records`
#[allow(dead_code)]
pub async fn mount_dataset(server: &MockServer, records: &[PurchaseRecord]) {
    mount_status(server).await;
    mount_data_resources(server, records).await;
}

/// Mount the four data resources serving `records`
#[allow(dead_code)]
pub async fn mount_data_resources(server: &MockServer, records: &[PurchaseRecord]) {
    let stats = compute_stats(records).unwrap();
    let products: Vec<ProductSummary> = aggregate_by(records, AggregateKey::Product)
        .unwrap()
        .into_iter()
        .map(Into::into)
        .collect();
    let establishments: Vec<EstablishmentSummary> = aggregate_by(records, AggregateKey::Establishment)
        .unwrap()
        .into_iter()
        .map(Into::into)
        .collect();

    mount_resource(
        server,
        "/api/items",
        ResponseTemplate::new(200).set_body_json(json!({ "items": records })),
    )
    .await;
    mount_resource(server, "/api/stats", ResponseTemplate::new(200).set_body_json(&stats)).await;
    mount_resource(
        server,
        "/api/products",
        ResponseTemplate::new(200).set_body_json(json!({ "products": products })),
    )
    .await;
    mount_resource(
        server,
        "/api/establishments",
        ResponseTemplate::new(200).set_body_json(json!({ "establishments": establishments })),
    )
    .await;
}

/// `host:port` of a mock server
#[allow(dead_code)]
pub fn address_of(server: &MockServer) -> String {
    server.address().to_string()
}

/// A real data server running on an ephemeral loopback port
#[allow(dead_code)]
pub struct RunningServer {
    pub address: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

#[allow(dead_code)]
impl RunningServer {
    /// Base URL for plain HTTP requests
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    /// Stop serving and wait for the listener to close
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

/// Start a data server over `provider`
#[allow(dead_code)]
pub async fn spawn_server(provider: Arc<dyn DataProvider>, config: ServerConfig) -> RunningServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let server = SyncServer::new(config, provider).unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = rx.await;
            })
            .await
    });

    RunningServer {
        address,
        shutdown: Some(tx),
        handle,
    }
}
