//! Aggregation over purchase records
//!
//! Shared by every provider and by the server endpoint so that stats,
//! products and establishments are computed the same way everywhere.

use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{AggregateStats, EstablishmentSummary, ProductSummary, PurchaseRecord};

use super::ProviderError;

/// Grouping key for per-key aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKey {
    Product,
    Establishment,
}

impl AggregateKey {
    fn key_of<'a>(&self, record: &'a PurchaseRecord) -> &'a str {
        match self {
            Self::Product => record.product.trim(),
            Self::Establishment => record.establishment.trim(),
        }
    }

    fn associated_of<'a>(&self, record: &'a PurchaseRecord) -> &'a str {
        match self {
            Self::Product => record.establishment.trim(),
            Self::Establishment => record.product.trim(),
        }
    }
}

/// Aggregate of all records sharing one key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAggregate {
    pub key: String,
    pub count: usize,
    pub total_value: f64,
    pub average_value: f64,
    /// Values of the other key seen together with this one, sorted
    pub associated: Vec<String>,
}

impl From<KeyAggregate> for ProductSummary {
    fn from(agg: KeyAggregate) -> Self {
        Self {
            name: agg.key,
            count: agg.count,
            total_value: agg.total_value,
            average_value: agg.average_value,
            establishments: agg.associated,
        }
    }
}

impl From<KeyAggregate> for EstablishmentSummary {
    fn from(agg: KeyAggregate) -> Self {
        Self {
            name: agg.key,
            count: agg.count,
            total_value: agg.total_value,
            average_value: agg.average_value,
            products: agg.associated,
        }
    }
}

/// Reject the whole set if any record is malformed
pub fn validate_records(records: &[PurchaseRecord]) -> Result<(), ProviderError> {
    for record in records {
        record.validate().map_err(|reason| ProviderError::Malformed {
            id: record.id.clone(),
            reason,
        })?;
    }
    Ok(())
}

/// Group records by `key`, sorted descending by total value then by name
pub fn aggregate_by(
    records: &[PurchaseRecord],
    key: AggregateKey,
) -> Result<Vec<KeyAggregate>, ProviderError> {
    validate_records(records)?;

    let mut groups: HashMap<&str, (usize, f64, BTreeSet<&str>)> = HashMap::new();
    for record in records {
        let entry = groups
            .entry(key.key_of(record))
            .or_insert_with(|| (0, 0.0, BTreeSet::new()));
        entry.0 += 1;
        entry.1 += record.value();
        entry.2.insert(key.associated_of(record));
    }

    let mut aggregates: Vec<KeyAggregate> = groups
        .into_iter()
        .map(|(name, (count, total, associated))| KeyAggregate {
            key: name.to_string(),
            count,
            total_value: total,
            average_value: total / count as f64,
            associated: associated.into_iter().map(str::to_string).collect(),
        })
        .collect();

    aggregates.sort_by(|a, b| {
        b.total_value
            .total_cmp(&a.total_value)
            .then_with(|| a.key.cmp(&b.key))
    });

    Ok(aggregates)
}

/// Compute scalar stats over the whole record set
pub fn compute_stats(records: &[PurchaseRecord]) -> Result<AggregateStats, ProviderError> {
    validate_records(records)?;

    let total_value: f64 = records.iter().map(PurchaseRecord::value).sum();
    let products: HashSet<&str> = records.iter().map(|r| r.product.trim()).collect();
    let establishments: HashSet<&str> = records.iter().map(|r| r.establishment.trim()).collect();

    let avg_item_value = if records.is_empty() {
        0.0
    } else {
        total_value / records.len() as f64
    };

    Ok(AggregateStats {
        total_items: records.len(),
        total_value,
        unique_products: products.len(),
        unique_establishments: establishments.len(),
        avg_item_value,
        last_update: Utc::now(),
    })
}
