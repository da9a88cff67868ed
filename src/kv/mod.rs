//! Key-value store abstraction the card store runs against
//!
//! The store contract:
//! - single-item get/put/update/delete keyed by partition (+ optional sort) key
//! - conditional writes that fail without side effects when the condition is unmet
//! - multi-item transactions with per-item cancellation reasons
//! - ascending/descending range queries, optionally on a secondary index
//!
//! Two backends ship with the crate: [`MemoryStore`] (in-process, snapshot to JSON)
//! and [`HttpStore`] (remote gateway over HTTP).

pub mod http;
pub mod memory;
#[cfg(test)]
pub mod testing;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpStore;
pub use memory::MemoryStore;

/// A single attribute value.
///
/// Numbers are carried as decimal strings, mirroring stores whose native numeric
/// type is arbitrary precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttrValue {
    S(String),
    N(String),
    L(Vec<AttrValue>),
    M(BTreeMap<String, AttrValue>),
    Null,
}

impl AttrValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self::S(s.into())
    }

    pub fn number(n: i64) -> Self {
        Self::N(n.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::N(n) => n.parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            Self::L(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// Ordering used for sort keys and index keys. Only like-typed values compare.
    fn sort_cmp(&self, other: &AttrValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::S(a), Self::S(b)) => Some(a.cmp(b)),
            (Self::N(a), Self::N(b)) => {
                let a: f64 = a.parse().ok()?;
                let b: f64 = b.parse().ok()?;
                a.partial_cmp(&b)
            }
            _ => None,
        }
    }
}

/// A stored record: attribute name to value
pub type Item = BTreeMap<String, AttrValue>;

/// Primary key of an item. Tables without a sort key leave `sort` empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub partition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl Key {
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }
}

/// Precondition attached to a write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
    /// The item exists and carries `attr`
    AttributeExists { attr: String },
    /// The item is absent or lacks `attr`
    AttributeNotExists { attr: String },
    /// Numeric `attr < value`; a missing attribute reads as `default` when given,
    /// otherwise the check fails
    NumberLessThan {
        attr: String,
        value: i64,
        default: Option<i64>,
    },
    /// Numeric `attr > value`, same missing-attribute rule as `NumberLessThan`
    NumberGreaterThan {
        attr: String,
        value: i64,
        default: Option<i64>,
    },
    /// The item exists and `attr` holds exactly `value`
    AttributeEquals { attr: String, value: AttrValue },
    /// Every condition holds
    All { conditions: Vec<Condition> },
}

impl Condition {
    /// Evaluate against the current item (None when absent)
    pub fn evaluate(&self, item: Option<&Item>) -> Result<bool, KvError> {
        let lookup = |attr: &str| item.and_then(|i| i.get(attr));
        match self {
            Condition::AttributeExists { attr } => Ok(lookup(attr).is_some()),
            Condition::AttributeNotExists { attr } => Ok(lookup(attr).is_none()),
            Condition::NumberLessThan { attr, value, default } => {
                Ok(numeric_attr(lookup(attr), *default, attr)?.map_or(false, |n| n < *value))
            }
            Condition::NumberGreaterThan { attr, value, default } => {
                Ok(numeric_attr(lookup(attr), *default, attr)?.map_or(false, |n| n > *value))
            }
            Condition::AttributeEquals { attr, value } => Ok(lookup(attr) == Some(value)),
            Condition::All { conditions } => {
                for condition in conditions {
                    if !condition.evaluate(item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn numeric_attr(value: Option<&AttrValue>, default: Option<i64>, attr: &str) -> Result<Option<i64>, KvError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| KvError::InvalidRequest(format!("attribute '{}' is not an integer", attr))),
    }
}

/// One mutation inside an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UpdateAction {
    Set { attr: String, value: AttrValue },
    Remove { attr: String },
    /// `attr = (attr if present else default) + delta`
    Add { attr: String, delta: i64, default: i64 },
}

/// Single-item conditional update; creates the item when absent (upsert)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub table: String,
    pub key: Key,
    pub actions: Vec<UpdateAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// One member of an atomic multi-item write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransactItem {
    Put {
        table: String,
        key: Key,
        item: Item,
        condition: Option<Condition>,
    },
    Update(UpdateRequest),
    Delete {
        table: String,
        key: Key,
        condition: Option<Condition>,
    },
}

impl TransactItem {
    pub fn table(&self) -> &str {
        match self {
            TransactItem::Put { table, .. } | TransactItem::Delete { table, .. } => table,
            TransactItem::Update(req) => &req.table,
        }
    }

    pub fn key(&self) -> &Key {
        match self {
            TransactItem::Put { key, .. } | TransactItem::Delete { key, .. } => key,
            TransactItem::Update(req) => &req.key,
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            TransactItem::Put { condition, .. } | TransactItem::Delete { condition, .. } => {
                condition.as_ref()
            }
            TransactItem::Update(req) => req.condition.as_ref(),
        }
    }
}

/// Per-item failure code attached to a cancelled transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancellationCode {
    /// This item did not cause the cancellation
    None,
    ConditionalCheckFailed,
    ValidationError,
    TransactionConflict,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationReason {
    pub code: CancellationCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CancellationReason {
    pub fn none() -> Self {
        Self {
            code: CancellationCode::None,
            message: None,
        }
    }

    pub fn new(code: CancellationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn is_conditional_check_failed(&self) -> bool {
        self.code == CancellationCode::ConditionalCheckFailed
    }
}

/// Sort-key range for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SortRange {
    Any,
    LessOrEqual { value: AttrValue },
    /// String sort values starting with `prefix`
    BeginsWith { prefix: String },
}

/// Range query over one partition, optionally through a secondary index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub table: String,
    /// Secondary index name and the attribute it sorts on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexSpec>,
    pub partition: String,
    pub range: SortRange,
    pub ascending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<PageKey>,
    /// Post-range equality filter on a plain attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<(String, AttrValue)>,
    #[serde(default)]
    pub count_only: bool,
}

impl QueryRequest {
    pub fn new(table: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            index: None,
            partition: partition.into(),
            range: SortRange::Any,
            ascending: true,
            limit: None,
            exclusive_start_key: None,
            filter: None,
            count_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    pub name: String,
    pub sort_attr: String,
}

/// Position of the last item a query page evaluated.
///
/// Index queries carry the index value too, so a page can resume even after the
/// item it stopped on was deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageKey {
    pub key: Key,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_value: Option<AttrValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    #[serde(default)]
    pub items: Vec<Item>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<PageKey>,
}

#[derive(Error, Debug)]
pub enum KvError {
    #[error("Conditional check failed")]
    ConditionalCheckFailed,

    /// `reasons` is None when the store gave no per-item attribution
    #[error("Transaction cancelled: {reasons:?}")]
    TransactionCanceled {
        reasons: Option<Vec<CancellationReason>>,
    },

    #[error("Store request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Capability contract of the backing store
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_item(&self, table: &str, key: &Key) -> Result<Option<Item>, KvError>;

    async fn put_item(
        &self,
        table: &str,
        key: &Key,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<(), KvError>;

    /// Apply `actions` and return the item as it reads after the update
    async fn update_item(&self, request: UpdateRequest) -> Result<Item, KvError>;

    async fn delete_item(
        &self,
        table: &str,
        key: &Key,
        condition: Option<Condition>,
    ) -> Result<(), KvError>;

    /// All items commit or none do; on cancellation the reasons list is
    /// positionally aligned with `items`
    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<(), KvError>;

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, KvError>;
}
