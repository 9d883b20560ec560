use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use crate::cache::{QueryCache, QueryData, QueryKey};
use crate::clock::Clock;
use crate::data_client::{
    DataClient, DataClientErrorKind, Select, Table, decode_row, decode_rows, encode_row,
};
use crate::error::{AppError, DuplicateKind};
use crate::model::attendance::{Attendance, MarkAttendance};

#[derive(Clone)]
pub struct AttendanceRepository {
    client: Arc<dyn DataClient>,
    cache: QueryCache,
    clock: Arc<dyn Clock>,
}

async fn fetch_attendance(client: Arc<dyn DataClient>, query: Select) -> Result<QueryData, AppError> {
    let rows = client.select(query).await.map_err(|e| {
        error!(error = %e, "Failed to fetch attendance");
        AppError::from(e)
    })?;
    Ok(QueryData::Attendance(Arc::new(decode_rows(rows)?)))
}

impl AttendanceRepository {
    pub fn new(client: Arc<dyn DataClient>, cache: QueryCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            cache,
            clock,
        }
    }

    /// Local calendar date according to the injected clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    async fn cached(&self, key: QueryKey, query: Select) -> Result<Arc<Vec<Attendance>>, AppError> {
        let client = self.client.clone();
        self.cache
            .fetch(key, move || fetch_attendance(client.clone(), query.clone()))
            .await?
            .attendance()
            .ok_or_else(|| AppError::DataAccess("attendance query held employee rows".into()))
    }

    /// Attendance newest date first, optionally for one employee only.
    #[instrument(skip(self))]
    pub async fn list_attendance(
        &self,
        employee_id: Option<&str>,
    ) -> Result<Arc<Vec<Attendance>>, AppError> {
        let employee_id = employee_id.map(str::trim).filter(|id| !id.is_empty());

        let mut query = Select::from(Table::Attendance).order_desc("date");
        if let Some(id) = employee_id {
            query = query.eq("employee_id", id);
        }

        let key = QueryKey::Attendance {
            employee_id: employee_id.map(str::to_owned),
        };
        self.cached(key, query).await
    }

    /// Rows dated on the current local date.
    #[instrument(skip(self))]
    pub async fn list_today_attendance(&self) -> Result<Arc<Vec<Attendance>>, AppError> {
        let today = self.today();
        let query = Select::from(Table::Attendance)
            .eq("date", today.to_string())
            .order_asc("created_at");
        self.cached(QueryKey::AttendanceOn(today), query).await
    }

    #[instrument(skip(self, input), fields(employee_id = %input.employee_id, date = %input.date))]
    pub async fn mark_attendance(&self, input: &MarkAttendance) -> Result<Attendance, AppError> {
        let new = input.validate()?;

        let row = self
            .client
            .insert(Table::Attendance, encode_row(&new)?)
            .await
            .map_err(|e| {
                if e.kind == DataClientErrorKind::ForeignKeyViolation {
                    error!(error = %e, "Attendance for unknown employee");
                    return AppError::DataAccess(format!(
                        "employee {} does not exist",
                        new.employee_id
                    ));
                }
                let err = AppError::from_store(e, DuplicateKind::Attendance);
                match &err {
                    AppError::Duplicate(_) => warn!("Attendance already marked for this date"),
                    _ => error!(error = %err, "Failed to mark attendance"),
                }
                err
            })?;
        let record: Attendance = decode_row(row)?;

        self.cache.invalidate(Table::Attendance).await;
        info!(id = %record.id, status = %record.status, "Attendance marked");
        Ok(record)
    }
}
