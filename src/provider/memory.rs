//! In-memory data provider

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::PurchaseRecord;

use super::{DataProvider, ProviderError};

/// Records held in memory behind a lock
#[derive(Debug, Default)]
pub struct MemoryProvider {
    records: RwLock<Vec<PurchaseRecord>>,
}

impl MemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding `records`
    pub fn with_records(records: Vec<PurchaseRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Replace the whole record set
    pub async fn replace(&self, records: Vec<PurchaseRecord>) {
        *self.records.write().await = records;
    }

    /// Append a record
    pub async fn push(&self, record: PurchaseRecord) {
        self.records.write().await.push(record);
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the provider holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DataProvider for MemoryProvider {
    async fn list_records(&self) -> Result<Vec<PurchaseRecord>, ProviderError> {
        Ok(self.records.read().await.clone())
    }
}
