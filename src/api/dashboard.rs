use crate::{
    aggregation::{
        DailyCount, DailyRate, DashboardStats, DepartmentCount, Gauge, attendance_trend,
        dashboard_stats, department_distribution, today_gauge, weekly_attendance,
    },
    error::AppError,
    model::{attendance::Attendance, employee::Employee},
    repository::{AttendanceRepository, EmployeeRepository},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

/// How many rows the "recent" panels show.
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub weekly: Vec<DailyCount>,
    pub trend: Vec<DailyRate>,
    pub departments: Vec<DepartmentCount>,
    pub today: Gauge,
    pub recent_employees: Vec<Employee>,
    pub today_attendance: Vec<Attendance>,
}

/// Dashboard
///
/// Stat cards and chart series computed from the cached employee and
/// attendance queries.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard data", body = DashboardResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Dashboard"
)]
pub async fn dashboard(
    employees: web::Data<EmployeeRepository>,
    attendance: web::Data<AttendanceRepository>,
) -> Result<HttpResponse, AppError> {
    let (staff, records, todays) = futures::try_join!(
        employees.list_employees(),
        attendance.list_attendance(None),
        attendance.list_today_attendance(),
    )?;
    let today = attendance.today();
    debug!(
        %today,
        employees = staff.len(),
        records = records.len(),
        "Building dashboard"
    );

    Ok(HttpResponse::Ok().json(DashboardResponse {
        stats: dashboard_stats(&staff, &todays, &records, today),
        weekly: weekly_attendance(&records, today),
        trend: attendance_trend(&records, today),
        departments: department_distribution(&staff),
        today: today_gauge(&todays, today),
        recent_employees: staff.iter().take(PREVIEW_ROWS).cloned().collect(),
        today_attendance: todays.iter().take(PREVIEW_ROWS).cloned().collect(),
    }))
}
