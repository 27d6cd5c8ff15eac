//! Wire-level data structures shared by the server and the client
//!
//! Every type here is serialized with camelCase field names, which is the
//! contract the mobile app and desktop dashboards speak. Clients deserialize
//! tolerantly: unknown fields are ignored and optional ones default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity string every compatible server reports in `/api/status`
pub const APP_SIGNATURE: &str = "expense-tracker";

/// Value of the `status` field of a live server
pub const STATUS_ONLINE: &str = "online";

// ============================================================================
// Purchase Records
// ============================================================================

fn default_quantity() -> f64 {
    1.0
}

/// A single purchased item, as extracted from a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    /// Record identifier
    pub id: String,

    /// Product name as printed on the receipt
    pub product: String,

    /// Store or establishment name
    pub establishment: String,

    /// Unit price
    pub price: f64,

    /// Quantity purchased
    #[serde(default = "default_quantity")]
    pub quantity: f64,

    /// Free-form category assigned by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Receipt this item was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,

    /// When the purchase happened
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseRecord {
    /// Create a record with quantity 1 and no category
    pub fn new(
        id: impl Into<String>,
        product: impl Into<String>,
        establishment: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            product: product.into(),
            establishment: establishment.into(),
            price,
            quantity: 1.0,
            category: None,
            receipt_id: None,
            purchased_at: Utc::now(),
        }
    }

    /// Total value of this line (price x quantity)
    pub fn value(&self) -> f64 {
        self.price * self.quantity
    }

    /// Check the record is usable for aggregation
    ///
    /// Returns a human readable reason when it is not.
    pub fn validate(&self) -> Result<(), String> {
        if self.product.trim().is_empty() {
            return Err("empty product name".to_string());
        }
        if self.establishment.trim().is_empty() {
            return Err("empty establishment name".to_string());
        }
        if !self.price.is_finite() {
            return Err(format!("non-finite price {}", self.price));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(format!("invalid quantity {}", self.quantity));
        }
        Ok(())
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// Scalar aggregates over the whole record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_items: usize,
    pub total_value: f64,
    pub unique_products: usize,
    pub unique_establishments: usize,
    pub avg_item_value: f64,
    pub last_update: DateTime<Utc>,
}

/// Per-product aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub name: String,
    pub count: usize,
    pub total_value: f64,
    pub average_value: f64,
    /// Establishments where this product was bought
    #[serde(default)]
    pub establishments: Vec<String>,
}

/// Per-establishment aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstablishmentSummary {
    pub name: String,
    pub count: usize,
    pub total_value: f64,
    pub average_value: f64,
    /// Products bought at this establishment
    #[serde(default)]
    pub products: Vec<String>,
}

// ============================================================================
// Endpoint Bodies
// ============================================================================

/// Body of `GET /api/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub app_name: String,
    pub version: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl StatusResponse {
    /// Check the response identifies a compatible, live server
    pub fn matches_signature(&self, expected_app_name: &str) -> bool {
        self.status == STATUS_ONLINE && self.app_name == expected_app_name
    }
}

/// Body of `GET /api/items`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsResponse {
    pub items: Vec<PurchaseRecord>,
}

/// Body of `GET /api/products`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductSummary>,
}

/// Body of `GET /api/establishments`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstablishmentsResponse {
    pub establishments: Vec<EstablishmentSummary>,
}
