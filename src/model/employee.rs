use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": "8f1c5a9e-3b0d-4e0a-9d55-0c6f4f6e2d11",
        "employee_id": "EMP-001",
        "full_name": "John Doe",
        "email": "john.doe@company.com",
        "department": "Engineering",
        "created_at": "2026-01-01T09:00:00Z",
        "updated_at": "2026-01-01T09:00:00Z"
    })
)]
pub struct Employee {
    /// Store-generated identifier.
    pub id: String,

    #[schema(example = "EMP-001")]
    pub employee_id: String,

    #[schema(example = "John Doe")]
    pub full_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "Engineering")]
    pub department: String,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,

    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001", value_type = String)]
    pub employee_id: String,
    #[schema(example = "John Doe", value_type = String)]
    pub full_name: String,
    #[schema(example = "john@email.com", format = "email", value_type = String)]
    pub email: String,
    #[schema(example = "Engineering", value_type = String)]
    pub department: String,
}

/// A create request that passed validation; field values are trimmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEmployee {
    pub employee_id: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
}

/// Trimmed request fields; blanks count as missing.
#[derive(Debug, Validate)]
struct EmployeeFields {
    #[validate(
        required(message = "Employee ID is required"),
        length(max = 50, message = "Employee ID must be at most 50 characters")
    )]
    employee_id: Option<String>,

    #[validate(
        required(message = "Full name is required"),
        length(max = 100, message = "Full name must be at most 100 characters")
    )]
    full_name: Option<String>,

    #[validate(
        required(message = "Email is required"),
        email(message = "Invalid email address"),
        length(max = 100, message = "Email must be at most 100 characters")
    )]
    email: Option<String>,

    #[validate(
        required(message = "Department is required"),
        length(max = 100, message = "Department must be at most 100 characters")
    )]
    department: Option<String>,
}

const FIELDS: [&str; 4] = ["employee_id", "full_name", "email", "department"];

fn present(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl CreateEmployee {
    pub fn validate(&self) -> Result<NewEmployee, AppError> {
        let fields = EmployeeFields {
            employee_id: present(&self.employee_id),
            full_name: present(&self.full_name),
            email: present(&self.email),
            department: present(&self.department),
        };
        if let Err(errors) = fields.validate() {
            return Err(AppError::Validation(FieldErrors::from_validator(
                &errors, &FIELDS,
            )));
        }

        Ok(NewEmployee {
            employee_id: fields.employee_id.unwrap_or_default(),
            full_name: fields.full_name.unwrap_or_default(),
            email: fields.email.unwrap_or_default(),
            department: fields.department.unwrap_or_default(),
        })
    }
}

/// Case-insensitive substring match over name, code, email and department.
pub fn matches_search(employee: &Employee, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [
        &employee.full_name,
        &employee.employee_id,
        &employee.email,
        &employee.department,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}
