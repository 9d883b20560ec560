//! Chart series derived from already-fetched records.
//!
//! Everything here is a pure function of its inputs; "today" is always
//! passed in so the same inputs on the same day give the same series.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::employee::Employee;

pub const WEEK_DAYS: i64 = 7;
pub const TREND_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyCount {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// Short weekday name, e.g. `Mon`.
    #[schema(example = "Mon")]
    pub day: String,
    pub present: usize,
    pub absent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyRate {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// Month and day, e.g. `Oct 16`.
    #[schema(example = "Oct 16")]
    pub label: String,
    pub rate: u8,
    pub present: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DepartmentCount {
    #[schema(example = "Engineering")]
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Gauge {
    pub rate: u8,
    pub present: usize,
    pub total: usize,
}

/// Headline numbers shown above the charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_employees: usize,
    pub present_today: usize,
    pub absent_today: usize,
    pub total_records: usize,
    /// Present today as a share of the whole workforce.
    pub headcount_rate: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    present: usize,
    absent: usize,
}

impl Tally {
    fn total(&self) -> usize {
        self.present + self.absent
    }
}

/// `round(present / total * 100)`, or 0 when nothing was recorded.
pub fn attendance_rate(present: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rate = (present as f64 / total as f64 * 100.0).round();
    rate.clamp(0.0, 100.0) as u8
}

fn tally_by_date(records: &[Attendance]) -> HashMap<NaiveDate, Tally> {
    let mut tallies: HashMap<NaiveDate, Tally> = HashMap::new();
    for record in records {
        let tally = tallies.entry(record.date).or_default();
        match record.status {
            AttendanceStatus::Present => tally.present += 1,
            AttendanceStatus::Absent => tally.absent += 1,
        }
    }
    tallies
}

/// The `days` calendar days ending on `today`, oldest first.
fn window(today: NaiveDate, days: i64) -> impl Iterator<Item = NaiveDate> {
    (0..days).rev().map(move |offset| today - Duration::days(offset))
}

pub fn weekly_attendance(records: &[Attendance], today: NaiveDate) -> Vec<DailyCount> {
    let tallies = tally_by_date(records);
    window(today, WEEK_DAYS)
        .map(|date| {
            let tally = tallies.get(&date).copied().unwrap_or_default();
            DailyCount {
                date,
                day: date.format("%a").to_string(),
                present: tally.present,
                absent: tally.absent,
            }
        })
        .collect()
}

pub fn attendance_trend(records: &[Attendance], today: NaiveDate) -> Vec<DailyRate> {
    let tallies = tally_by_date(records);
    window(today, TREND_DAYS)
        .map(|date| {
            let tally = tallies.get(&date).copied().unwrap_or_default();
            DailyRate {
                date,
                label: date.format("%b %-d").to_string(),
                rate: attendance_rate(tally.present, tally.total()),
                present: tally.present,
                total: tally.total(),
            }
        })
        .collect()
}

/// Employees per department in order of first appearance.
pub fn department_distribution(employees: &[Employee]) -> Vec<DepartmentCount> {
    let mut counts: Vec<DepartmentCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for employee in employees {
        match index.get(employee.department.as_str()) {
            Some(&slot) => counts[slot].value += 1,
            None => {
                index.insert(&employee.department, counts.len());
                counts.push(DepartmentCount {
                    name: employee.department.clone(),
                    value: 1,
                });
            }
        }
    }
    counts
}

pub fn today_gauge(records: &[Attendance], today: NaiveDate) -> Gauge {
    let tally = records
        .iter()
        .filter(|record| record.date == today)
        .fold(Tally::default(), |mut tally, record| {
            match record.status {
                AttendanceStatus::Present => tally.present += 1,
                AttendanceStatus::Absent => tally.absent += 1,
            }
            tally
        });
    Gauge {
        rate: attendance_rate(tally.present, tally.total()),
        present: tally.present,
        total: tally.total(),
    }
}

pub fn dashboard_stats(
    employees: &[Employee],
    today_records: &[Attendance],
    all_records: &[Attendance],
    today: NaiveDate,
) -> DashboardStats {
    let gauge = today_gauge(today_records, today);
    DashboardStats {
        total_employees: employees.len(),
        present_today: gauge.present,
        absent_today: gauge.total - gauge.present,
        total_records: all_records.len(),
        headcount_rate: attendance_rate(gauge.present, employees.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn record(employee_id: &str, date: NaiveDate, status: AttendanceStatus) -> Attendance {
        Attendance {
            id: format!("{employee_id}-{date}"),
            employee_id: employee_id.into(),
            date,
            status,
            created_at: Utc::now(),
        }
    }

    fn employee(employee_id: &str, department: &str) -> Employee {
        Employee {
            id: employee_id.into(),
            employee_id: employee_id.into(),
            full_name: format!("Employee {employee_id}"),
            email: format!("{employee_id}@example.com"),
            department: department.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn days_ago(n: i64) -> NaiveDate {
        today() - Duration::days(n)
    }

    fn sample() -> Vec<Attendance> {
        use AttendanceStatus::*;
        vec![
            record("E1", today(), Present),
            record("E2", today(), Absent),
            record("E3", today(), Present),
            record("E1", days_ago(1), Absent),
            record("E1", days_ago(6), Present),
            // Outside the weekly window, inside the trend.
            record("E1", days_ago(7), Present),
            record("E2", days_ago(29), Absent),
            // Outside both windows.
            record("E1", days_ago(30), Present),
            // Future-dated rows never land in a window.
            record("E1", today() + Duration::days(1), Present),
        ]
    }

    #[test]
    fn weekly_series_is_seven_days_ending_today() {
        let series = weekly_attendance(&sample(), today());

        assert_eq!(series.len(), 7);
        assert_eq!(series.first().unwrap().date, days_ago(6));
        assert_eq!(series.last().unwrap().date, today());
        assert!(series.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(series.last().unwrap().day, "Fri");
    }

    #[test]
    fn weekly_counts_match_records_per_day() {
        let records = sample();
        for point in weekly_attendance(&records, today()) {
            let on_day = records.iter().filter(|r| r.date == point.date).count();
            assert_eq!(point.present + point.absent, on_day, "{}", point.date);
        }

        let series = weekly_attendance(&records, today());
        assert_eq!((series[6].present, series[6].absent), (2, 1));
        assert_eq!((series[5].present, series[5].absent), (0, 1));
        assert_eq!((series[2].present, series[2].absent), (0, 0));
    }

    #[test]
    fn weekly_series_without_records_is_all_zero() {
        let series = weekly_attendance(&[], today());
        assert_eq!(series.len(), 7);
        assert!(series.iter().all(|d| d.present == 0 && d.absent == 0));
    }

    #[test]
    fn trend_covers_thirty_days_with_bounded_rates() {
        let trend = attendance_trend(&sample(), today());

        assert_eq!(trend.len(), 30);
        assert_eq!(trend[0].date, days_ago(29));
        assert_eq!(trend[29].date, today());
        assert!(trend.iter().all(|d| d.rate <= 100));
        assert!(trend.iter().filter(|d| d.total == 0).all(|d| d.rate == 0));

        // 2 of 3 present today.
        assert_eq!(trend[29].rate, 67);
        assert_eq!(trend[29].label, "Oct 16");
        assert_eq!(trend[0].rate, 0);
        assert_eq!(trend[0].total, 1);
        assert_eq!(trend[22].rate, 100);
    }

    #[test]
    fn rate_rounds_half_up() {
        assert_eq!(attendance_rate(0, 0), 0);
        assert_eq!(attendance_rate(1, 2), 50);
        assert_eq!(attendance_rate(1, 8), 13);
        assert_eq!(attendance_rate(1, 3), 33);
        assert_eq!(attendance_rate(3, 3), 100);
    }

    #[test]
    fn departments_keep_first_seen_order() {
        let employees = vec![
            employee("E1", "Sales"),
            employee("E2", "Engineering"),
            employee("E3", "Sales"),
            employee("E4", "Design"),
            employee("E5", "Engineering"),
        ];
        let distribution = department_distribution(&employees);

        let names: Vec<&str> = distribution.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Sales", "Engineering", "Design"]);
        assert_eq!(
            distribution.iter().map(|d| d.value).sum::<usize>(),
            employees.len()
        );
        assert_eq!(distribution[0].value, 2);
    }

    #[test]
    fn single_present_record_fills_the_gauge() {
        let records = vec![record("E1", today(), AttendanceStatus::Present)];
        assert_eq!(
            today_gauge(&records, today()),
            Gauge {
                rate: 100,
                present: 1,
                total: 1
            }
        );
    }

    #[test]
    fn empty_day_gauge_is_zero() {
        let records = vec![record("E1", days_ago(1), AttendanceStatus::Present)];
        assert_eq!(
            today_gauge(&records, today()),
            Gauge {
                rate: 0,
                present: 0,
                total: 0
            }
        );
    }

    #[test]
    fn stats_compare_presence_with_headcount() {
        let employees = vec![
            employee("E1", "Sales"),
            employee("E2", "Sales"),
            employee("E3", "Sales"),
            employee("E4", "Sales"),
        ];
        let all = sample();
        let todays: Vec<Attendance> = all.iter().filter(|r| r.date == today()).cloned().collect();

        let stats = dashboard_stats(&employees, &todays, &all, today());
        assert_eq!(stats.total_employees, 4);
        assert_eq!(stats.present_today, 2);
        assert_eq!(stats.absent_today, 1);
        assert_eq!(stats.total_records, all.len());
        assert_eq!(stats.headcount_rate, 50);
    }

    #[test]
    fn series_are_repeatable() {
        let records = sample();
        assert_eq!(
            weekly_attendance(&records, today()),
            weekly_attendance(&records, today())
        );
        assert_eq!(
            attendance_trend(&records, today()),
            attendance_trend(&records, today())
        );
    }
}
