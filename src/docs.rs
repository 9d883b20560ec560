use crate::aggregation::{DailyCount, DailyRate, DashboardStats, DepartmentCount, Gauge};
use crate::api::attendance::AttendanceListResponse;
use crate::api::dashboard::DashboardResponse;
use crate::api::employee::EmployeeListResponse;
use crate::model::attendance::{Attendance, AttendanceStatus, MarkAttendance};
use crate::model::employee::{CreateEmployee, Employee};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Roster API",
        version = "0.1.0",
        description = r#"
## Employee roster and daily attendance

### Key Features
- **Employees**
  - Add, list, search and delete employees
  - Deleting an employee removes their attendance history
- **Attendance**
  - Mark one Present/Absent record per employee per day
  - List all records, one employee's records, or today's records
- **Dashboard**
  - Headline counts, a 7-day and a 30-day series, department split and today's rate

### Errors
- `422` with per-field messages when input is invalid
- `409` when an employee or a day's attendance already exists
- `500` with a generic message when the data store fails

Reads are served from an in-process query cache that is refreshed whenever a write touches the same table.
"#,
    ),
    paths(
        crate::api::employee::list_employees,
        crate::api::employee::create_employee,
        crate::api::employee::delete_employee,

        crate::api::attendance::list_attendance,
        crate::api::attendance::today_attendance,
        crate::api::attendance::mark_attendance,

        crate::api::dashboard::dashboard
    ),
    components(
        schemas(
            Employee,
            CreateEmployee,
            EmployeeListResponse,
            Attendance,
            AttendanceStatus,
            MarkAttendance,
            AttendanceListResponse,
            DashboardResponse,
            DashboardStats,
            DailyCount,
            DailyRate,
            DepartmentCount,
            Gauge
        )
    ),
    tags(
        (name = "Employee", description = "Employee roster APIs"),
        (name = "Attendance", description = "Attendance tracking APIs"),
        (name = "Dashboard", description = "Aggregated attendance figures"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/employees",
            "/api/employees/{employee_id}",
            "/api/attendance",
            "/api/attendance/today",
            "/api/dashboard",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
