use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Value, json};
use sqlx::error::ErrorKind;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool, Row as _};
use tracing::{debug, error};
use uuid::Uuid;

use super::{
    ColumnKind, DataClient, DataClientError, DataClientErrorKind, Filter, Row, Select, Table,
};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl SqlValue {
    /// Converts a JSON value into something sqlx can bind. Strings are only
    /// parsed as dates or timestamps when the target column holds one.
    pub fn from_json(value: &Value, kind: ColumnKind) -> Result<Self, DataClientError> {
        match value {
            Value::String(s) => Ok(match kind {
                ColumnKind::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(SqlValue::Date)
                    .unwrap_or_else(|_| SqlValue::String(s.clone())),
                ColumnKind::Timestamp => DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.naive_utc())
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                    .map(SqlValue::DateTime)
                    .unwrap_or_else(|_| SqlValue::String(s.clone())),
                ColumnKind::Text => SqlValue::String(s.clone()),
            }),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::I64(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlValue::F64(f))
                } else {
                    Err(DataClientError::other("Unsupported JSON number"))
                }
            }
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::Null => Ok(SqlValue::Null),
            _ => Err(DataClientError::other("Unsupported JSON value type")),
        }
    }
}

/// ===============================
/// SQL statement container
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn checked_column(table: Table, column: &str) -> Result<String, DataClientError> {
    if table.has_column(column) {
        Ok(format!("`{column}`"))
    } else {
        Err(DataClientError::other(format!(
            "unknown column {column} on {table}"
        )))
    }
}

fn where_clause(
    table: Table,
    filters: &[Filter],
    values: &mut Vec<SqlValue>,
) -> Result<String, DataClientError> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut conditions = Vec::with_capacity(filters.len());
    for filter in filters {
        conditions.push(format!("{} = ?", checked_column(table, filter.column)?));
        values.push(SqlValue::from_json(
            &filter.value,
            table.column_kind(filter.column),
        )?);
    }

    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}

/// ===============================
/// Build dynamic SELECT SQL
/// ===============================
pub fn build_select(query: &Select) -> Result<SqlStatement, DataClientError> {
    let mut values = Vec::new();
    let where_sql = where_clause(query.table, &query.filters, &mut values)?;

    let order_sql = match query.order {
        Some(order) => format!(
            " ORDER BY {} {}",
            checked_column(query.table, order.column)?,
            if order.ascending { "ASC" } else { "DESC" }
        ),
        None => String::new(),
    };

    let sql = format!("SELECT * FROM {}{}{}", query.table, where_sql, order_sql);
    Ok(SqlStatement { sql, values })
}

/// ===============================
/// Build dynamic INSERT SQL
/// ===============================
pub fn build_insert(table: Table, row: &Row) -> Result<SqlStatement, DataClientError> {
    if row.is_empty() {
        return Err(DataClientError::other("No fields provided for insert"));
    }

    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (column, value) in row {
        columns.push(checked_column(table, column)?);
        values.push(SqlValue::from_json(value, table.column_kind(column))?);
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    );
    Ok(SqlStatement { sql, values })
}

/// ===============================
/// Build dynamic DELETE SQL
/// ===============================
pub fn build_delete(table: Table, filters: &[Filter]) -> Result<SqlStatement, DataClientError> {
    // An unfiltered delete would wipe the table.
    if filters.is_empty() {
        return Err(DataClientError::other("Refusing to delete without filters"));
    }

    let mut values = Vec::with_capacity(filters.len());
    let where_sql = where_clause(table, filters, &mut values)?;
    Ok(SqlStatement {
        sql: format!("DELETE FROM {}{}", table, where_sql),
        values,
    })
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: Vec<SqlValue>,
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

fn classify(err: sqlx::Error) -> DataClientError {
    if let sqlx::Error::Database(db_err) = &err {
        let kind = match db_err.kind() {
            ErrorKind::UniqueViolation => DataClientErrorKind::UniqueViolation,
            ErrorKind::ForeignKeyViolation => DataClientErrorKind::ForeignKeyViolation,
            _ => DataClientErrorKind::Other,
        };
        return DataClientError::new(kind, db_err.message());
    }
    DataClientError::other(err.to_string())
}

fn row_to_json(table: Table, row: &MySqlRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();
    match table {
        Table::Employees => {
            for column in ["id", "employee_id", "full_name", "email", "department"] {
                out.insert(column.into(), Value::String(row.try_get(column)?));
            }
            for column in ["created_at", "updated_at"] {
                let ts: DateTime<Utc> = row.try_get(column)?;
                out.insert(column.into(), json!(ts));
            }
        }
        Table::Attendance => {
            for column in ["id", "employee_id", "status"] {
                out.insert(column.into(), Value::String(row.try_get(column)?));
            }
            let date: NaiveDate = row.try_get("date")?;
            out.insert("date".into(), json!(date));
            let created_at: DateTime<Utc> = row.try_get("created_at")?;
            out.insert("created_at".into(), json!(created_at));
        }
    }
    Ok(out)
}

/// MySQL-backed data client. Constraint enforcement (uniqueness, the
/// attendance foreign key and its cascade) lives in the schema.
#[derive(Clone)]
pub struct MySqlDataClient {
    pool: MySqlPool,
}

impl MySqlDataClient {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, table: Table, stmt: SqlStatement) -> Result<Vec<Row>, DataClientError> {
        debug!(sql = %stmt.sql, bindings = ?stmt.values, "Selecting rows");
        let rows = bind_all(sqlx::query(&stmt.sql), stmt.values)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, sql = %stmt.sql, "Select failed");
                classify(e)
            })?;

        rows.iter()
            .map(|row| row_to_json(table, row).map_err(classify))
            .collect()
    }
}

#[async_trait]
impl DataClient for MySqlDataClient {
    async fn select(&self, query: Select) -> Result<Vec<Row>, DataClientError> {
        let stmt = build_select(&query)?;
        self.fetch(query.table, stmt).await
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row, DataClientError> {
        let id = Uuid::new_v4().to_string();
        row.insert("id".into(), Value::String(id.clone()));

        let stmt = build_insert(table, &row)?;
        debug!(sql = %stmt.sql, bindings = ?stmt.values, "Inserting row");
        bind_all(sqlx::query(&stmt.sql), stmt.values)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        let stored = self
            .fetch(table, build_select(&Select::from(table).eq("id", id))?)
            .await?;
        stored
            .into_iter()
            .next()
            .ok_or_else(|| DataClientError::other(format!("inserted row vanished from {table}")))
    }

    async fn delete(&self, table: Table, filters: Vec<Filter>) -> Result<u64, DataClientError> {
        let stmt = build_delete(table, &filters)?;
        debug!(sql = %stmt.sql, bindings = ?stmt.values, "Deleting rows");
        let result = bind_all(sqlx::query(&stmt.sql), stmt.values)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, sql = %stmt.sql, "Delete failed");
                classify(e)
            })?;
        Ok(result.rows_affected())
    }
}
