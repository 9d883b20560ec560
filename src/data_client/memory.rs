//! In-process data client.
//!
//! Enforces the same rules as the MySQL schema: unique column sets per
//! table, the attendance -> employees reference, and the cascade on delete.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DataClient, DataClientError, DataClientErrorKind, Filter, Row, Select, Table};

#[derive(Debug, Clone, Default)]
pub struct MemoryDataClient {
    tables: Arc<RwLock<HashMap<Table, Vec<Row>>>>,
    calls: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl MemoryDataClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of select/insert/delete calls received so far.
    #[cfg(test)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// While offline every call fails with a generic error.
    #[cfg(test)]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn begin_call(&self) -> Result<(), DataClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(DataClientError::other("data store unreachable"));
        }
        Ok(())
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(_), None) => CmpOrdering::Greater,
        (None, Some(_)) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}

fn check_columns(table: Table, row: &Row) -> Result<(), DataClientError> {
    match row.keys().find(|column| !table.has_column(column)) {
        Some(column) => Err(DataClientError::other(format!(
            "unknown column {column} on {table}"
        ))),
        None => Ok(()),
    }
}

fn check_unique(table: Table, existing: &[Row], row: &Row) -> Result<(), DataClientError> {
    for constraint in table.unique_constraints() {
        let clash = existing.iter().any(|other| {
            constraint
                .iter()
                .all(|column| row.get(*column).is_some() && other.get(*column) == row.get(*column))
        });
        if clash {
            return Err(DataClientError::new(
                DataClientErrorKind::UniqueViolation,
                format!(
                    "duplicate key value violates unique constraint {}_{}_key",
                    table,
                    constraint.join("_")
                ),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl DataClient for MemoryDataClient {
    async fn select(&self, query: Select) -> Result<Vec<Row>, DataClientError> {
        self.begin_call()?;
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        let mut selected: Vec<Row> = match query.order {
            // Newest insert first so ties keep the latest row on top.
            Some(order) if !order.ascending => rows
                .iter()
                .rev()
                .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                .cloned()
                .collect(),
            _ => rows
                .iter()
                .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                .cloned()
                .collect(),
        };

        if let Some(order) = query.order {
            selected.sort_by(|a, b| {
                let ord = compare(a.get(order.column), b.get(order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }

        Ok(selected)
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row, DataClientError> {
        self.begin_call()?;
        check_columns(table, &row)?;

        let now = json!(Utc::now());
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        row.insert("created_at".into(), now.clone());
        if table == Table::Employees {
            row.insert("updated_at".into(), now);
        }

        let mut tables = self.tables.write().await;

        if table == Table::Attendance {
            let employee_id = row.get("employee_id").cloned().unwrap_or(Value::Null);
            let parent = Filter::eq("employee_id", employee_id.clone());
            let known = tables
                .get(&Table::Employees)
                .is_some_and(|employees| employees.iter().any(|e| parent.matches(e)));
            if !known {
                return Err(DataClientError::new(
                    DataClientErrorKind::ForeignKeyViolation,
                    format!("attendance references unknown employee {employee_id}"),
                ));
            }
        }

        let rows = tables.entry(table).or_default();
        check_unique(table, rows, &row)?;
        rows.push(row.clone());
        Ok(row)
    }

    async fn delete(&self, table: Table, filters: Vec<Filter>) -> Result<u64, DataClientError> {
        self.begin_call()?;
        if filters.is_empty() {
            return Err(DataClientError::other("Refusing to delete without filters"));
        }

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(0);
        };

        let (removed, kept): (Vec<Row>, Vec<Row>) = rows
            .drain(..)
            .partition(|row| filters.iter().all(|f| f.matches(row)));
        *rows = kept;

        if table == Table::Employees && !removed.is_empty() {
            let gone: Vec<&Value> = removed.iter().filter_map(|e| e.get("employee_id")).collect();
            if let Some(attendance) = tables.get_mut(&Table::Attendance) {
                attendance.retain(|record| {
                    record
                        .get("employee_id")
                        .is_none_or(|employee_id| !gone.contains(&employee_id))
                });
            }
        }

        Ok(removed.len() as u64)
    }
}
