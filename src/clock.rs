use chrono::{DateTime, Local, NaiveDate};

/// Source of "now" for cache freshness and the local calendar date.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Local wall-clock date. No timezone normalization is applied.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
