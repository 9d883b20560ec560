use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::cache::{QueryCache, QueryData, QueryKey};
use crate::data_client::{DataClient, Filter, Select, Table, decode_row, decode_rows, encode_row};
use crate::error::{AppError, DuplicateKind};
use crate::model::employee::{CreateEmployee, Employee};

#[derive(Clone)]
pub struct EmployeeRepository {
    client: Arc<dyn DataClient>,
    cache: QueryCache,
}

async fn fetch_employees(client: Arc<dyn DataClient>) -> Result<QueryData, AppError> {
    let rows = client
        .select(Select::from(Table::Employees).order_desc("created_at"))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch employees");
            AppError::from(e)
        })?;
    Ok(QueryData::Employees(Arc::new(decode_rows(rows)?)))
}

impl EmployeeRepository {
    pub fn new(client: Arc<dyn DataClient>, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    /// All employees, newest first.
    #[instrument(skip(self))]
    pub async fn list_employees(&self) -> Result<Arc<Vec<Employee>>, AppError> {
        let client = self.client.clone();
        self.cache
            .fetch(QueryKey::Employees, move || fetch_employees(client.clone()))
            .await?
            .employees()
            .ok_or_else(|| AppError::DataAccess("employees query held attendance rows".into()))
    }

    #[instrument(skip(self, input), fields(employee_id = %input.employee_id))]
    pub async fn create_employee(&self, input: &CreateEmployee) -> Result<Employee, AppError> {
        let new = input.validate()?;

        let row = self
            .client
            .insert(Table::Employees, encode_row(&new)?)
            .await
            .map_err(|e| {
                let err = AppError::from_store(e, DuplicateKind::Employee);
                match &err {
                    AppError::Duplicate(_) => warn!("Employee ID or email already exists"),
                    _ => error!(error = %err, "Failed to Create Employee"),
                }
                err
            })?;
        let employee: Employee = decode_row(row)?;

        self.cache.invalidate(Table::Employees).await;
        info!(id = %employee.id, "Employee created");
        Ok(employee)
    }

    /// Deletes by the user-facing code. The store cascades the employee's
    /// attendance, so both tables are invalidated. Returns rows removed.
    #[instrument(skip(self))]
    pub async fn delete_employee(&self, employee_id: &str) -> Result<u64, AppError> {
        let employee_id = employee_id.trim();
        if employee_id.is_empty() {
            return Err(AppError::validation("employee_id", "Employee ID is required"));
        }

        let removed = self
            .client
            .delete(Table::Employees, vec![Filter::eq("employee_id", employee_id)])
            .await
            .map_err(|e| {
                error!(error = %e, employee_id, "Failed to delete employee");
                AppError::from(e)
            })?;

        self.cache.invalidate(Table::Employees).await;
        self.cache.invalidate(Table::Attendance).await;
        info!(removed, "Employee deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing;

    fn setup() -> (EmployeeRepository, crate::data_client::MemoryDataClient) {
        let fixture = testing::fixture();
        (fixture.employees, fixture.client)
    }

    fn input(employee_id: &str, email: &str) -> CreateEmployee {
        CreateEmployee {
            employee_id: employee_id.into(),
            full_name: "Grace Hopper".into(),
            email: email.into(),
            department: "Engineering".into(),
        }
    }

    #[tokio::test]
    async fn created_employee_is_listed_once() {
        let (repo, _) = setup();
        assert!(repo.list_employees().await.unwrap().is_empty());

        let created = repo.create_employee(&input("E1", "grace@example.com")).await.unwrap();
        let listed = repo.list_employees().await.unwrap();

        assert_eq!(listed.iter().filter(|e| e.employee_id == "E1").count(), 1);
        assert_eq!(listed[0], created);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (repo, _) = setup();
        repo.create_employee(&input("E1", "a@example.com")).await.unwrap();
        repo.create_employee(&input("E2", "b@example.com")).await.unwrap();

        let ids: Vec<String> = repo
            .list_employees()
            .await
            .unwrap()
            .iter()
            .map(|e| e.employee_id.clone())
            .collect();
        assert_eq!(ids, vec!["E2", "E1"]);
    }

    #[tokio::test]
    async fn duplicate_employee_id_is_reported() {
        let (repo, _) = setup();
        repo.create_employee(&input("E1", "a@example.com")).await.unwrap();

        let err = repo
            .create_employee(&input("E1", "b@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Duplicate(DuplicateKind::Employee));
        assert_eq!(repo.list_employees().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let (repo, _) = setup();
        repo.create_employee(&input("E1", "a@example.com")).await.unwrap();

        let err = repo
            .create_employee(&input("E2", "a@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Duplicate(DuplicateKind::Employee));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_store() {
        let (repo, client) = setup();
        let err = repo
            .create_employee(&input("E1", "not-an-email"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn store_outage_is_data_access_error() {
        let (repo, client) = setup();
        client.set_offline(true);

        assert!(matches!(
            repo.list_employees().await.unwrap_err(),
            AppError::DataAccess(_)
        ));
        assert!(matches!(
            repo.create_employee(&input("E1", "a@example.com"))
                .await
                .unwrap_err(),
            AppError::DataAccess(_)
        ));
    }

    #[tokio::test]
    async fn list_is_served_from_cache_until_a_mutation() {
        let (repo, client) = setup();
        repo.list_employees().await.unwrap();
        repo.list_employees().await.unwrap();
        assert_eq!(client.calls(), 1);

        repo.create_employee(&input("E1", "a@example.com")).await.unwrap();
        assert_eq!(repo.list_employees().await.unwrap().len(), 1);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn delete_removes_employee() {
        let (repo, _) = setup();
        repo.create_employee(&input("E1", "a@example.com")).await.unwrap();
        repo.list_employees().await.unwrap();

        assert_eq!(repo.delete_employee("E1").await.unwrap(), 1);
        assert!(repo.list_employees().await.unwrap().is_empty());
        assert_eq!(repo.delete_employee("E1").await.unwrap(), 0);
    }
}
