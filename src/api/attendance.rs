use crate::{
    error::AppError,
    model::attendance::{Attendance, MarkAttendance, matches_search},
    repository::AttendanceRepository,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Only this employee's records (exact match)
    pub employee_id: Option<String>,
    /// Case-insensitive substring of the employee ID
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<Attendance>,
    #[schema(example = 3)]
    pub total: usize,
}

impl AttendanceListResponse {
    fn from_records(records: &[Attendance], search: Option<&str>) -> Self {
        let search = search.map(str::trim).unwrap_or_default();
        let data: Vec<Attendance> = records
            .iter()
            .filter(|r| search.is_empty() || matches_search(r, search))
            .cloned()
            .collect();
        Self {
            total: data.len(),
            data,
        }
    }
}

/// List Attendance
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance, newest date first", body = AttendanceListResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    repo: web::Data<AttendanceRepository>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let records = repo.list_attendance(query.employee_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(AttendanceListResponse::from_records(
        &records,
        query.search.as_deref(),
    )))
}

/// Today's Attendance
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Records dated on the server's local date", body = AttendanceListResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn today_attendance(
    repo: web::Data<AttendanceRepository>,
) -> Result<HttpResponse, AppError> {
    let records = repo.list_today_attendance().await?;
    Ok(HttpResponse::Ok().json(AttendanceListResponse::from_records(&records, None)))
}

/// Mark Attendance
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 201, description = "Attendance marked", body = Attendance),
        (status = 409, description = "Already marked for this date", body = Object, example = json!({
            "message": "Attendance already marked for this date"
        })),
        (status = 422, description = "Invalid input", body = Object, example = json!({
            "message": "Validation failed",
            "errors": { "status": "Status must be Present or Absent" }
        })),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    repo: web::Data<AttendanceRepository>,
    payload: web::Json<MarkAttendance>,
) -> Result<HttpResponse, AppError> {
    let record = repo.mark_attendance(&payload).await?;
    Ok(HttpResponse::Created().json(record))
}
