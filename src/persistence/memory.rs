//! In-process table backend
//!
//! Behaves like the hosted tables for the operations the gateway uses: `id` is a
//! unique key, rows inserted without an `id` get a sequential one, and every call
//! is counted.

use super::query::{compare, Filter, Query};
use super::{PersistenceError, PersistenceResult, TableBackend};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Value>,
    next_id: i64,
}

impl Table {
    fn position_of(&self, id: &Value) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.get("id")
                .map_or(false, |v| compare(v, id) == Some(Ordering::Equal))
        })
    }

    fn assign_id(&mut self, row: &mut Map<String, Value>) {
        if !row.contains_key("id") {
            self.next_id += 1;
            row.insert("id".to_string(), Value::from(self.next_id));
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Table>>,
    calls: AtomicUsize,
}

fn as_object(row: Value) -> PersistenceResult<Map<String, Value>> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(PersistenceError::Remote {
            status: 400,
            code: Some("PGRST102".to_string()),
            message: format!("Row is not a JSON object: {}", other),
        }),
    }
}

fn merge(target: &mut Value, patch: &Map<String, Value>) {
    if let Value::Object(map) = target {
        for (key, value) in patch {
            map.insert(key.clone(), value.clone());
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backend calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Copy of every row currently stored in `table`
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Table>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> PersistenceResult<Vec<Value>> {
        self.record_call();
        let mut tables = self.lock();
        let table = tables.entry(table.to_string()).or_default();

        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = as_object(row)?;
            if let Some(id) = row.get("id") {
                if table.position_of(id).is_some() {
                    return Err(PersistenceError::Remote {
                        status: 409,
                        code: Some("23505".to_string()),
                        message: format!(
                            "duplicate key value violates unique constraint (id={})",
                            id
                        ),
                    });
                }
            }
            table.assign_id(&mut row);
            inserted.push(Value::Object(row));
        }

        table.rows.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>) -> PersistenceResult<Vec<Value>> {
        self.record_call();
        let mut tables = self.lock();
        let table = tables.entry(table.to_string()).or_default();

        let mut written = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = as_object(row)?;
            let existing = row.get("id").and_then(|id| table.position_of(id));

            match existing {
                Some(index) => {
                    merge(&mut table.rows[index], &row);
                    written.push(table.rows[index].clone());
                }
                None => {
                    table.assign_id(&mut row);
                    let row = Value::Object(row);
                    table.rows.push(row.clone());
                    written.push(row);
                }
            }
        }

        Ok(written)
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> PersistenceResult<Vec<Value>> {
        self.record_call();
        let patch = as_object(patch)?;
        let mut tables = self.lock();
        let Some(table) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in table.rows.iter_mut() {
            if filters.iter().all(|f| f.matches(row)) {
                merge(row, &patch);
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    async fn select(&self, table: &str, query: &Query) -> PersistenceResult<Vec<Value>> {
        self.record_call();
        let tables = self.lock();
        let Some(table) = tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<Value> = table
            .rows
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = match (a.get(&order.column), b.get(&order.column)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> PersistenceResult<usize> {
        self.record_call();
        let mut tables = self.lock();
        let Some(table) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = table.rows.len();
        table.rows.retain(|row| !filters.iter().all(|f| f.matches(row)));

        Ok(before - table.rows.len())
    }
}
