use std::time::Instant;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::cache::{QueryCache, QueryData, QueryKey};
use crate::repository::{AttendanceRepository, EmployeeRepository};

/// Keys every dashboard request reads. Today's key changes at midnight, so
/// it is prefetched but not followed.
fn followed_keys() -> [QueryKey; 2] {
    [
        QueryKey::Employees,
        QueryKey::Attendance { employee_id: None },
    ]
}

/// Load the dashboard queries into the cache and keep them subscribed, so a
/// write refreshes them in the background instead of on the next request.
pub async fn warmup_dashboard_queries(
    cache: &QueryCache,
    employees: &EmployeeRepository,
    attendance: &AttendanceRepository,
) -> Result<()> {
    let started = Instant::now();

    let (staff, records, todays) = futures::try_join!(
        employees.list_employees(),
        attendance.list_attendance(None),
        attendance.list_today_attendance(),
    )?;

    for key in followed_keys() {
        let receiver = cache.subscribe(key.clone()).await;
        tokio::spawn(follow(key, receiver));
    }

    info!(
        employees = staff.len(),
        attendance = records.len(),
        today = todays.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Query cache warmup complete"
    );

    Ok(())
}

async fn follow(key: QueryKey, mut receiver: watch::Receiver<Option<QueryData>>) {
    while receiver.changed().await.is_ok() {
        let rows = receiver.borrow_and_update().as_ref().map(QueryData::row_count);
        debug!(%key, ?rows, "Warm query refreshed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::CreateEmployee;
    use crate::repository::testing;
    use std::time::Duration;

    #[tokio::test]
    async fn warmup_prefetches_dashboard_queries() {
        let fixture = testing::fixture();
        warmup_dashboard_queries(&fixture.cache, &fixture.employees, &fixture.attendance)
            .await
            .unwrap();

        let calls = fixture.client.calls();
        assert_eq!(calls, 3);
        fixture.employees.list_employees().await.unwrap();
        fixture.attendance.list_attendance(None).await.unwrap();
        fixture.attendance.list_today_attendance().await.unwrap();
        assert_eq!(fixture.client.calls(), calls);
    }

    #[tokio::test]
    async fn followed_keys_refresh_after_a_write() {
        let fixture = testing::fixture();
        warmup_dashboard_queries(&fixture.cache, &fixture.employees, &fixture.attendance)
            .await
            .unwrap();
        let mut watcher = fixture.cache.subscribe(QueryKey::Employees).await;

        fixture
            .employees
            .create_employee(&CreateEmployee {
                employee_id: "E1".into(),
                full_name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                department: "Engineering".into(),
            })
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), watcher.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            watcher.borrow().as_ref().map(QueryData::row_count),
            Some(1)
        );

        // Served from the refreshed entry.
        let calls = fixture.client.calls();
        assert_eq!(fixture.employees.list_employees().await.unwrap().len(), 1);
        assert_eq!(fixture.client.calls(), calls);
    }
}
