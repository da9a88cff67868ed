//! In-process store backend
//!
//! Every operation runs under one lock, so single-item conditional writes and
//! transactions are linearizable. The whole store can be snapshotted to a JSON
//! file, which is what the CLI's local backend uses between invocations.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::*;

type Table = BTreeMap<Key, Item>;

/// Store kept entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Table>>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    tables: BTreeMap<String, Vec<StoredItem>>,
}

#[derive(Serialize, Deserialize)]
struct StoredItem {
    key: Key,
    item: Item,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`MemoryStore::save`]; a missing file yields an empty store
    pub fn load(path: &Path) -> Result<Self, KvError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        let tables = snapshot
            .tables
            .into_iter()
            .map(|(name, items)| {
                let table = items.into_iter().map(|s| (s.key, s.item)).collect();
                (name, table)
            })
            .collect();

        Ok(Self {
            tables: Mutex::new(tables),
        })
    }

    /// Write the whole store to `path` as JSON
    pub fn save(&self, path: &Path) -> Result<(), KvError> {
        let snapshot = {
            let tables = self.lock();
            Snapshot {
                tables: tables
                    .iter()
                    .map(|(name, table)| {
                        let items = table
                            .iter()
                            .map(|(key, item)| StoredItem {
                                key: key.clone(),
                                item: item.clone(),
                            })
                            .collect();
                        (name.clone(), items)
                    })
                    .collect(),
            }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }

    /// Number of items currently held in `table`
    pub fn len(&self, table: &str) -> usize {
        self.lock().get(table).map_or(0, |t| t.len())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Table>> {
        // A panic mid-operation never leaves a half-applied write behind: writes
        // are computed first and inserted last.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn check(condition: Option<&Condition>, current: Option<&Item>) -> Result<(), KvError> {
    match condition {
        Some(cond) if !cond.evaluate(current)? => Err(KvError::ConditionalCheckFailed),
        _ => Ok(()),
    }
}

fn apply_update(current: Option<&Item>, actions: &[UpdateAction]) -> Result<Item, KvError> {
    let mut item = current.cloned().unwrap_or_default();
    for action in actions {
        match action {
            UpdateAction::Set { attr, value } => {
                item.insert(attr.clone(), value.clone());
            }
            UpdateAction::Remove { attr } => {
                item.remove(attr);
            }
            UpdateAction::Add { attr, delta, default } => {
                let base = match item.get(attr) {
                    None => *default,
                    Some(v) => v.as_i64().ok_or_else(|| {
                        KvError::InvalidRequest(format!("attribute '{}' is not an integer", attr))
                    })?,
                };
                item.insert(attr.clone(), AttrValue::number(base + delta));
            }
        }
    }
    Ok(item)
}

/// Value the query orders on: the index attribute, or the sort key of the base table
fn order_value(index: Option<&IndexSpec>, key: &Key, item: &Item) -> Option<AttrValue> {
    match index {
        Some(spec) => item.get(&spec.sort_attr).cloned(),
        None => Some(AttrValue::S(key.sort.clone().unwrap_or_default())),
    }
}

fn position_cmp(a: (&AttrValue, &Key), b: (&AttrValue, &Key)) -> Ordering {
    a.0.sort_cmp(b.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.cmp(b.1))
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_item(&self, table: &str, key: &Key) -> Result<Option<Item>, KvError> {
        Ok(self.lock().get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn put_item(
        &self,
        table: &str,
        key: &Key,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<(), KvError> {
        let mut tables = self.lock();
        let t = tables.entry(table.to_string()).or_default();
        check(condition.as_ref(), t.get(key))?;
        t.insert(key.clone(), item);
        Ok(())
    }

    async fn update_item(&self, request: UpdateRequest) -> Result<Item, KvError> {
        let mut tables = self.lock();
        let t = tables.entry(request.table.clone()).or_default();
        let current = t.get(&request.key);
        check(request.condition.as_ref(), current)?;
        let updated = apply_update(current, &request.actions)?;
        t.insert(request.key, updated.clone());
        Ok(updated)
    }

    async fn delete_item(
        &self,
        table: &str,
        key: &Key,
        condition: Option<Condition>,
    ) -> Result<(), KvError> {
        let mut tables = self.lock();
        let t = tables.entry(table.to_string()).or_default();
        check(condition.as_ref(), t.get(key))?;
        t.remove(key);
        Ok(())
    }

    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<(), KvError> {
        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert((item.table().to_string(), item.key().clone())) {
                return Err(KvError::InvalidRequest(
                    "transaction touches the same item more than once".to_string(),
                ));
            }
        }

        let mut tables = self.lock();

        // Evaluate every precondition and stage every write before touching anything
        let mut reasons = Vec::with_capacity(items.len());
        let mut staged: Vec<(String, Key, Option<Item>)> = Vec::with_capacity(items.len());
        let mut cancelled = false;

        for item in &items {
            let current = tables.get(item.table()).and_then(|t| t.get(item.key()));
            let outcome = match item.condition().map(|c| c.evaluate(current)) {
                Some(Ok(false)) => Err(CancellationReason::new(
                    CancellationCode::ConditionalCheckFailed,
                    "The conditional request failed",
                )),
                Some(Err(e)) => Err(CancellationReason::new(CancellationCode::ValidationError, e.to_string())),
                _ => match item {
                    TransactItem::Put { item: new, .. } => Ok(Some(new.clone())),
                    TransactItem::Delete { .. } => Ok(None),
                    TransactItem::Update(req) => apply_update(current, &req.actions)
                        .map(Some)
                        .map_err(|e| CancellationReason::new(CancellationCode::ValidationError, e.to_string())),
                },
            };

            match outcome {
                Ok(write) => {
                    reasons.push(CancellationReason::none());
                    staged.push((item.table().to_string(), item.key().clone(), write));
                }
                Err(reason) => {
                    cancelled = true;
                    reasons.push(reason);
                }
            }
        }

        if cancelled {
            return Err(KvError::TransactionCanceled {
                reasons: Some(reasons),
            });
        }

        for (table, key, write) in staged {
            let t = tables.entry(table).or_default();
            match write {
                Some(item) => {
                    t.insert(key, item);
                }
                None => {
                    t.remove(&key);
                }
            }
        }

        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, KvError> {
        let tables = self.lock();
        let Some(table) = tables.get(&request.table) else {
            return Ok(QueryOutput::default());
        };

        let index = request.index.as_ref();
        let mut rows: Vec<(AttrValue, &Key, &Item)> = table
            .iter()
            .filter(|(key, _)| key.partition == request.partition)
            .filter_map(|(key, item)| order_value(index, key, item).map(|v| (v, key, item)))
            .collect();

        rows.sort_by(|a, b| position_cmp((&a.0, a.1), (&b.0, b.1)));
        if !request.ascending {
            rows.reverse();
        }

        let in_range = |value: &AttrValue| match &request.range {
            SortRange::Any => true,
            SortRange::LessOrEqual { value: bound } => {
                matches!(value.sort_cmp(bound), Some(Ordering::Less | Ordering::Equal))
            }
            SortRange::BeginsWith { prefix } => value.as_str().map_or(false, |s| s.starts_with(prefix.as_str())),
        };

        let after_start = |value: &AttrValue, key: &Key| match &request.exclusive_start_key {
            None => true,
            Some(start) => {
                let start_value = match (&start.index_value, index) {
                    (Some(v), _) => v.clone(),
                    (None, None) => AttrValue::S(start.key.sort.clone().unwrap_or_default()),
                    // Without the index value only the primary key can place the cursor
                    (None, Some(_)) => value.clone(),
                };
                let ord = position_cmp((value, key), (&start_value, &start.key));
                if request.ascending {
                    ord == Ordering::Greater
                } else {
                    ord == Ordering::Less
                }
            }
        };

        let matching: Vec<(AttrValue, &Key, &Item)> = rows
            .into_iter()
            .filter(|(value, _, _)| in_range(value))
            .filter(|(value, key, _)| after_start(value, key))
            .filter(|(_, _, item)| match &request.filter {
                None => true,
                Some((attr, expected)) => item.get(attr) == Some(expected),
            })
            .collect();

        let limit = request.limit.unwrap_or(usize::MAX);
        let more = matching.len() > limit;
        let page: Vec<_> = matching.into_iter().take(limit).collect();

        let last_evaluated_key = if more {
            page.last().map(|(value, key, _)| PageKey {
                key: (*key).clone(),
                index_value: index.map(|_| value.clone()),
            })
        } else {
            None
        };

        let count = page.len();
        let items = if request.count_only {
            Vec::new()
        } else {
            page.into_iter().map(|(_, _, item)| item.clone()).collect()
        };

        Ok(QueryOutput {
            items,
            count,
            last_evaluated_key,
        })
    }
}
