//! REST API handlers for the data server
//!
//! Every handler reads the provider afresh; nothing is cached between
//! requests. A handler either serializes a complete body or answers with an
//! error status, never a partial list.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::time::Instant;

use crate::metrics;
use crate::models::{
    AggregateStats, EstablishmentsResponse, ItemsResponse, ProductsResponse, StatusResponse,
    STATUS_ONLINE,
};
use crate::provider::{compute_stats, validate_records, AggregateKey, ProviderError};

use super::server::AppState;

// ============================================================================
// Error Responses
// ============================================================================

/// Error body returned with 404 and 500 responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Failure of an API request
#[derive(Debug)]
pub enum ApiError {
    /// No such resource
    NotFound(String),

    /// The data provider could not produce a complete answer
    Provider(ProviderError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            Self::NotFound(path) => format!("Resource not found: {path}"),
            Self::Provider(e) => {
                tracing::error!(error = %e, "Data provider failure");
                "Failed to read data".to_string()
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/items", get(get_items))
        .route("/api/stats", get(get_stats))
        .route("/api/products", get(get_products))
        .route("/api/establishments", get(get_establishments));

    if state.config.enable_metrics {
        router = router.route("/metrics", get(get_metrics));
    }

    router.fallback(not_found).with_state(state)
}

fn observe<T>(endpoint: &str, started: Instant, result: Result<T, ApiError>) -> Result<Json<T>, ApiError> {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status_code(),
    };
    metrics::record_api_request(endpoint, status.as_u16(), started.elapsed().as_secs_f64());
    result.map(Json)
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness and identity, used by discovery probes
async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    metrics::record_api_request("status", 200, 0.0);

    Json(StatusResponse {
        status: STATUS_ONLINE.to_string(),
        app_name: state.config.app_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        device_name: state.config.device_name.clone(),
    })
}

/// Full raw record list
async fn get_items(State(state): State<AppState>) -> Result<Json<ItemsResponse>, ApiError> {
    let started = Instant::now();
    let result = match state.provider.list_records().await {
        Ok(items) => validate_records(&items)
            .map(|()| ItemsResponse { items })
            .map_err(ApiError::from),
        Err(e) => Err(e.into()),
    };

    observe("items", started, result)
}

/// Scalar aggregates
async fn get_stats(State(state): State<AppState>) -> Result<Json<AggregateStats>, ApiError> {
    let started = Instant::now();
    let result = match state.provider.list_records().await {
        Ok(records) => compute_stats(&records).map_err(ApiError::from),
        Err(e) => Err(e.into()),
    };

    observe("stats", started, result)
}

/// Per-product aggregates, highest total first
async fn get_products(State(state): State<AppState>) -> Result<Json<ProductsResponse>, ApiError> {
    let started = Instant::now();
    let result = state
        .provider
        .aggregate_by(AggregateKey::Product)
        .await
        .map(|aggregates| ProductsResponse {
            products: aggregates.into_iter().map(Into::into).collect(),
        })
        .map_err(ApiError::from);

    observe("products", started, result)
}

/// Per-establishment aggregates, highest total first
async fn get_establishments(
    State(state): State<AppState>,
) -> Result<Json<EstablishmentsResponse>, ApiError> {
    let started = Instant::now();
    let result = state
        .provider
        .aggregate_by(AggregateKey::Establishment)
        .await
        .map(|aggregates| EstablishmentsResponse {
            establishments: aggregates.into_iter().map(Into::into).collect(),
        })
        .map_err(ApiError::from);

    observe("establishments", started, result)
}

/// Prometheus text exposition
async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

async fn not_found(uri: Uri) -> ApiError {
    metrics::record_api_request("unknown", 404, 0.0);
    ApiError::NotFound(uri.path().to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let response = ErrorResponse::new("test error");
        assert!(!response.success);
        assert_eq!(response.error, "test error");
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("/x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Provider(ProviderError::Read("disk".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_response() {
        let response = ApiError::Provider(ProviderError::Read("disk".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    use crate::endpoint::ServerConfig;
    use crate::models::PurchaseRecord;
    use crate::provider::{DataProvider, MemoryProvider};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct BrokenProvider;

    #[async_trait]
    impl DataProvider for BrokenProvider {
        async fn list_records(&self) -> Result<Vec<PurchaseRecord>, ProviderError> {
            Err(ProviderError::Read("store locked".to_string()))
        }
    }

    fn router(provider: Arc<dyn DataProvider>, config: ServerConfig) -> Router {
        create_router(AppState { provider, config })
    }

    async fn get_json(router: Router, path: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_status_route() {
        let config = ServerConfig::builder().device_name("Hall tablet").build().unwrap();
        let (status, body) = get_json(router(Arc::new(MemoryProvider::new()), config), "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "online");
        assert_eq!(body["appName"], "expense-tracker");
        assert_eq!(body["deviceName"], "Hall tablet");
    }

    #[tokio::test]
    async fn test_items_route() {
        let provider = MemoryProvider::with_records(vec![
            PurchaseRecord::new("1", "Milk", "Corner Shop", 2.5),
            PurchaseRecord::new("2", "Bread", "Bakery", 3.0),
        ]);
        let (status, body) =
            get_json(router(Arc::new(provider), ServerConfig::default()), "/api/items").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_is_500() {
        let app = router(Arc::new(BrokenProvider), ServerConfig::default());
        for path in ["/api/items", "/api/stats", "/api/products", "/api/establishments"] {
            let (status, body) = get_json(app.clone(), path).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{path}");
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn test_malformed_record_is_500_everywhere() {
        let mut bad_quantity = PurchaseRecord::new("qty", "Eggs", "Farm", 4.0);
        bad_quantity.quantity = 0.0;
        let provider = MemoryProvider::with_records(vec![
            PurchaseRecord::new("ok", "Milk", "Corner Shop", 2.0),
            PurchaseRecord::new("nan", "Tea", "Corner Shop", f64::NAN),
            PurchaseRecord::new("blank", "  ", "Corner Shop", 1.0),
            bad_quantity,
        ]);
        let app = router(Arc::new(provider), ServerConfig::default());

        for path in ["/api/items", "/api/stats", "/api/products", "/api/establishments"] {
            let (status, body) = get_json(app.clone(), path).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{path}");
            assert_eq!(body["success"], false);
            assert!(body.get("items").is_none(), "{path} leaked partial data");
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, body) = get_json(
            router(Arc::new(MemoryProvider::new()), ServerConfig::default()),
            "/api/receipts",
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("/api/receipts"));
    }

    #[tokio::test]
    async fn test_metrics_route_only_when_enabled() {
        let app = router(Arc::new(MemoryProvider::new()), ServerConfig::default());
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let config = ServerConfig::builder().enable_metrics(true).build().unwrap();
        let app = router(Arc::new(MemoryProvider::new()), config);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
