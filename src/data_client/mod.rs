//! Generic query/mutation client over the two roster tables.
//!
//! Rows travel as JSON objects so that one client can serve every table;
//! repositories decode them into typed models with [`decode_rows`].

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use derive_more::Display;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

pub use memory::MemoryDataClient;
pub use mysql::MySqlDataClient;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Table {
    #[display(fmt = "employees")]
    Employees,
    #[display(fmt = "attendance")]
    Attendance,
}

impl Table {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Employees => &[
                "id",
                "employee_id",
                "full_name",
                "email",
                "department",
                "created_at",
                "updated_at",
            ],
            Table::Attendance => &["id", "employee_id", "date", "status", "created_at"],
        }
    }

    /// Column sets that must be unique across the table.
    pub fn unique_constraints(&self) -> &'static [&'static [&'static str]] {
        match self {
            Table::Employees => &[&["employee_id"], &["email"]],
            Table::Attendance => &[&["employee_id", "date"]],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Store type of `column`; anything not listed is text.
    pub fn column_kind(&self, column: &str) -> ColumnKind {
        match (self, column) {
            (Table::Attendance, "date") => ColumnKind::Date,
            (_, "created_at") | (Table::Employees, "updated_at") => ColumnKind::Timestamp,
            _ => ColumnKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Date,
    Timestamp,
}

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(self.column) == Some(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub ascending: bool,
}

/// Filtered, ordered select against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
}

impl Select {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order = Some(OrderBy {
            column,
            ascending: true,
        });
        self
    }

    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order = Some(OrderBy {
            column,
            ascending: false,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DataClientErrorKind {
    #[display(fmt = "uniqueness violation")]
    UniqueViolation,
    #[display(fmt = "foreign key violation")]
    ForeignKeyViolation,
    #[display(fmt = "failure")]
    Other,
}

#[derive(Debug, Clone, PartialEq, Display)]
#[display(fmt = "{}: {}", kind, message)]
pub struct DataClientError {
    pub kind: DataClientErrorKind,
    pub message: String,
}

impl std::error::Error for DataClientError {}

impl DataClientError {
    pub fn new(kind: DataClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DataClientErrorKind::Other, message)
    }
}

#[async_trait]
pub trait DataClient: Send + Sync {
    async fn select(&self, query: Select) -> Result<Vec<Row>, DataClientError>;

    /// Inserts one row and returns it as stored, including generated columns.
    async fn insert(&self, table: Table, row: Row) -> Result<Row, DataClientError>;

    /// Deletes every row matching all filters, returning how many went.
    async fn delete(&self, table: Table, filters: Vec<Filter>) -> Result<u64, DataClientError>;
}

pub fn encode_row<T: Serialize>(value: &T) -> Result<Row, DataClientError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(_) => Err(DataClientError::other("row must serialize to a JSON object")),
        Err(e) => Err(DataClientError::other(format!("failed to encode row: {e}"))),
    }
}

pub fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T, DataClientError> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| DataClientError::other(format!("failed to decode row: {e}")))
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, DataClientError> {
    rows.into_iter().map(decode_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_builder_collects_filters_and_order() {
        let query = Select::from(Table::Attendance)
            .eq("employee_id", "E1")
            .order_desc("date");

        assert_eq!(query.filters, vec![Filter::eq("employee_id", "E1")]);
        assert_eq!(
            query.order,
            Some(OrderBy {
                column: "date",
                ascending: false
            })
        );
    }

    #[test]
    fn table_names_match_store() {
        assert_eq!(Table::Employees.to_string(), "employees");
        assert_eq!(Table::Attendance.to_string(), "attendance");
        assert!(Table::Attendance.has_column("date"));
        assert!(!Table::Employees.has_column("date"));
    }

    #[test]
    fn only_schema_columns_are_temporal() {
        assert_eq!(Table::Attendance.column_kind("date"), ColumnKind::Date);
        assert_eq!(Table::Attendance.column_kind("created_at"), ColumnKind::Timestamp);
        assert_eq!(Table::Employees.column_kind("updated_at"), ColumnKind::Timestamp);
        assert_eq!(Table::Employees.column_kind("employee_id"), ColumnKind::Text);
        assert_eq!(Table::Attendance.column_kind("employee_id"), ColumnKind::Text);
    }

    #[test]
    fn encode_rejects_non_objects() {
        assert!(encode_row(&"just a string").is_err());
        let row = encode_row(&json!({"employee_id": "E1"})).unwrap();
        assert_eq!(row.get("employee_id"), Some(&json!("E1")));
    }
}
