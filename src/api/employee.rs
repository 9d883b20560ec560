use crate::{
    error::AppError,
    model::employee::{CreateEmployee, Employee, matches_search},
    repository::EmployeeRepository,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    /// Case-insensitive match on name, employee ID, email or department
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 10)]
    pub total: usize,
}

// -------------------- Handlers --------------------

/// List Employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Employees, newest first", body = EmployeeListResponse),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Employee"
)]
pub async fn list_employees(
    repo: web::Data<EmployeeRepository>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    let employees = repo.list_employees().await?;

    let search = query.search.as_deref().map(str::trim).unwrap_or_default();
    let data: Vec<Employee> = if search.is_empty() {
        employees.as_ref().clone()
    } else {
        employees
            .iter()
            .filter(|e| matches_search(e, search))
            .cloned()
            .collect()
    };
    debug!(search, total = data.len(), "Listing employees");

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        total: data.len(),
        data,
    }))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Employee),
        (status = 409, description = "Duplicate employee", body = Object, example = json!({
            "message": "Employee ID or email already exists"
        })),
        (status = 422, description = "Invalid input", body = Object, example = json!({
            "message": "Validation failed",
            "errors": { "email": "Invalid email address" }
        })),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Employee"
)]
pub async fn create_employee(
    repo: web::Data<EmployeeRepository>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, AppError> {
    let employee = repo.create_employee(&payload).await?;
    Ok(HttpResponse::Created().json(employee))
}

/// Delete Employee
///
/// Removes the employee and every attendance record that references it.
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID (the user-facing code)")
    ),
    responses(
        (status = 200, description = "Employee deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee"
)]
pub async fn delete_employee(
    repo: web::Data<EmployeeRepository>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();

    if repo.delete_employee(&employee_id).await? == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing;
    use crate::routes::api_routes;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    fn body(employee_id: &str, email: &str, department: &str) -> Value {
        json!({
            "employee_id": employee_id,
            "full_name": format!("Employee {employee_id}"),
            "email": email,
            "department": department,
        })
    }

    #[actix_web::test]
    async fn create_then_list() {
        let fixture = testing::fixture();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fixture.employees))
                .app_data(web::Data::new(fixture.attendance))
                .configure(api_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/employees")
            .set_json(body("E1", "ada@example.com", "Engineering"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Employee = test::read_body_json(resp).await;
        assert_eq!(created.employee_id, "E1");

        let req = test::TestRequest::get().uri("/employees").to_request();
        let list: EmployeeListResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list.total, 1);
        assert_eq!(list.data, vec![created]);
    }

    #[actix_web::test]
    async fn search_filters_listed_employees() {
        let fixture = testing::fixture();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fixture.employees))
                .configure(api_routes),
        )
        .await;

        for (id, email, department) in [
            ("E1", "ada@example.com", "Engineering"),
            ("E2", "bob@example.com", "Sales"),
        ] {
            let req = test::TestRequest::post()
                .uri("/employees")
                .set_json(body(id, email, department))
                .to_request();
            assert!(test::call_service(&app, req).await.status().is_success());
        }

        let req = test::TestRequest::get()
            .uri("/employees?search=SALES")
            .to_request();
        let list: EmployeeListResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list.total, 1);
        assert_eq!(list.data[0].employee_id, "E2");
    }

    #[actix_web::test]
    async fn validation_and_duplicate_statuses() {
        let fixture = testing::fixture();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fixture.employees))
                .configure(api_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/employees")
            .set_json(body("E1", "not-an-email", "Engineering"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let err: Value = test::read_body_json(resp).await;
        assert!(err["errors"]["email"].is_string());

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let req = test::TestRequest::post()
                .uri("/employees")
                .set_json(body("E1", "ada@example.com", "Engineering"))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected);
        }
    }

    #[actix_web::test]
    async fn delete_unknown_is_not_found() {
        let fixture = testing::fixture();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fixture.employees))
                .configure(api_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/employees")
            .set_json(body("E1", "ada@example.com", "Engineering"))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::delete().uri("/employees/E1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::delete().uri("/employees/E1").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }
}
