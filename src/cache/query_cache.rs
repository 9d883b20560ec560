//! Client-side query cache.
//!
//! Every query result is stored under a [`QueryKey`] together with the time
//! it was fetched. A key has at most one fetch in flight; concurrent callers
//! attach to the shared future instead of issuing their own call. Mutations
//! call [`QueryCache::invalidate`] with the table they touched, which marks
//! the table's entries stale and refetches the keys somebody subscribed to.
//!
//! Entries are bounded by the cache capacity. A subscription is dropped once
//! its last receiver is gone, and an in-flight slot once its fetch settles,
//! so keys that are read once (per employee, per day) leave nothing behind.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use moka::future::Cache;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::data_client::Table;
use crate::error::AppError;
use crate::model::attendance::Attendance;
use crate::model::employee::Employee;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Employees,
    /// All attendance, or one employee's when `employee_id` is set.
    Attendance { employee_id: Option<String> },
    /// Attendance rows dated on one calendar day.
    AttendanceOn(NaiveDate),
}

impl QueryKey {
    pub fn table(&self) -> Table {
        match self {
            QueryKey::Employees => Table::Employees,
            QueryKey::Attendance { .. } | QueryKey::AttendanceOn(_) => Table::Attendance,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Employees => write!(f, "employees"),
            QueryKey::Attendance { employee_id: None } => write!(f, "attendance"),
            QueryKey::Attendance {
                employee_id: Some(id),
            } => write!(f, "attendance[employee_id={id}]"),
            QueryKey::AttendanceOn(date) => write!(f, "attendance[date={date}]"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueryData {
    Employees(Arc<Vec<Employee>>),
    Attendance(Arc<Vec<Attendance>>),
}

impl QueryData {
    pub fn employees(self) -> Option<Arc<Vec<Employee>>> {
        match self {
            QueryData::Employees(rows) => Some(rows),
            QueryData::Attendance(_) => None,
        }
    }

    pub fn attendance(self) -> Option<Arc<Vec<Attendance>>> {
        match self {
            QueryData::Attendance(rows) => Some(rows),
            QueryData::Employees(_) => None,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            QueryData::Employees(rows) => rows.len(),
            QueryData::Attendance(rows) => rows.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Fetching,
}

pub type FetchResult = Result<QueryData, AppError>;

type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Clone)]
struct CacheEntry {
    data: QueryData,
    fetched_at: DateTime<Local>,
    stale: bool,
    /// How this entry was loaded, for refetching it once subscribed.
    fetcher: Fetcher,
}

struct Subscription {
    sender: watch::Sender<Option<QueryData>>,
    fetcher: Option<Fetcher>,
}

impl Subscription {
    fn is_live(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

struct InFlight {
    ticket: u64,
    future: SharedFetch,
}

struct Inner {
    entries: Cache<QueryKey, CacheEntry>,
    in_flight: Mutex<HashMap<QueryKey, InFlight>>,
    subscribers: Mutex<HashMap<QueryKey, Subscription>>,
    clock: Arc<dyn Clock>,
    stale_after: chrono::Duration,
    next_ticket: AtomicU64,
}

#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    /// `stale_after` bounds how long an entry counts as fresh without an
    /// invalidation; `capacity` only guards memory, the key set is small.
    pub fn new(clock: Arc<dyn Clock>, stale_after: Duration, capacity: u64) -> Self {
        let stale_after =
            chrono::Duration::from_std(stale_after).unwrap_or_else(|_| chrono::Duration::MAX);
        Self {
            inner: Arc::new(Inner {
                entries: Cache::builder().max_capacity(capacity).build(),
                in_flight: Mutex::new(HashMap::new()),
                subscribers: Mutex::new(HashMap::new()),
                clock,
                stale_after,
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<QueryKey, InFlight>> {
        self.inner
            .in_flight
            .lock()
            .expect("query cache in-flight registry poisoned")
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, HashMap<QueryKey, Subscription>> {
        self.inner
            .subscribers
            .lock()
            .expect("query cache subscriber registry poisoned")
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.stale || self.inner.clock.now() - entry.fetched_at >= self.inner.stale_after
    }

    /// Returns the cached value for `key` while it is fresh, otherwise runs
    /// (or joins) a fetch. The fetcher is kept with the entry, and with the
    /// subscription if the key has one, for background refetches.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> FetchResult
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || fetcher().boxed());
        if let Some(subscription) = self.lock_subscribers().get_mut(&key) {
            subscription.fetcher = Some(fetcher.clone());
        }

        if let Some(entry) = self.inner.entries.get(&key).await {
            if !self.is_expired(&entry) {
                trace!(%key, "query cache hit");
                return Ok(entry.data);
            }
        }

        self.load(key, fetcher).await
    }

    async fn load(&self, key: QueryKey, fetcher: Fetcher) -> FetchResult {
        let future = {
            let mut in_flight = self.lock_in_flight();
            match in_flight.get(&key) {
                Some(running) => {
                    debug!(%key, "joining in-flight fetch");
                    running.future.clone()
                }
                None => {
                    let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
                    let cache = self.clone();
                    let settle_key = key.clone();
                    let future = async move {
                        let result = fetcher().await;
                        cache.settle(&settle_key, ticket, fetcher, &result).await;
                        result
                    }
                    .boxed()
                    .shared();
                    // Driven to completion even if every caller goes away, so
                    // the in-flight slot is always released.
                    tokio::spawn(future.clone());
                    in_flight.insert(
                        key.clone(),
                        InFlight {
                            ticket,
                            future: future.clone(),
                        },
                    );
                    debug!(%key, ticket, "starting fetch");
                    future
                }
            }
        };

        future.await
    }

    async fn settle(&self, key: &QueryKey, ticket: u64, fetcher: Fetcher, result: &FetchResult) {
        let current = {
            let mut in_flight = self.lock_in_flight();
            let current = in_flight
                .get(key)
                .is_some_and(|running| running.ticket == ticket);
            if current {
                in_flight.remove(key);
            }
            current
        };

        // The key was invalidated while this fetch ran.
        if !current {
            debug!(%key, ticket, "discarding superseded fetch result");
            return;
        }

        match result {
            Ok(data) => {
                let entry = CacheEntry {
                    data: data.clone(),
                    fetched_at: self.inner.clock.now(),
                    stale: false,
                    fetcher,
                };
                self.inner.entries.insert(key.clone(), entry).await;
                debug!(%key, rows = data.row_count(), "query cached");
                if let Some(subscription) = self.lock_subscribers().get(key) {
                    subscription.sender.send_replace(Some(data.clone()));
                }
            }
            Err(e) => warn!(%key, error = %e, "query fetch failed"),
        }
    }

    /// Marks every entry of `table` stale, forgets in-flight fetches for it,
    /// and refetches the keys that still have live subscribers.
    pub async fn invalidate(&self, table: Table) {
        let keys: Vec<QueryKey> = self
            .inner
            .entries
            .iter()
            .filter(|(key, _)| key.table() == table)
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in &keys {
            if let Some(mut entry) = self.inner.entries.get(key).await {
                entry.stale = true;
                self.inner.entries.insert(key.clone(), entry).await;
            }
        }

        let superseded = {
            let mut in_flight = self.lock_in_flight();
            let before = in_flight.len();
            in_flight.retain(|key, _| key.table() != table);
            before - in_flight.len()
        };

        info!(%table, stale = keys.len(), superseded, "invalidated cached queries");
        self.refetch_subscribed(table);
    }

    fn refetch_subscribed(&self, table: Table) {
        let targets: Vec<(QueryKey, Fetcher)> = {
            let mut subscribers = self.lock_subscribers();
            subscribers.retain(|_, subscription| subscription.is_live());
            subscribers
                .iter()
                .filter(|(key, _)| key.table() == table)
                .filter_map(|(key, subscription)| {
                    subscription.fetcher.clone().map(|f| (key.clone(), f))
                })
                .collect()
        };

        for (key, fetcher) in targets {
            let cache = self.clone();
            tokio::spawn(async move {
                debug!(%key, "background refetch");
                if let Err(e) = cache.load(key.clone(), fetcher).await {
                    warn!(%key, error = %e, "background refetch failed");
                }
            });
        }
    }

    /// Watches `key`. The receiver sees every value stored for the key, and
    /// the key is refetched on invalidation for as long as a receiver lives.
    pub async fn subscribe(&self, key: QueryKey) -> watch::Receiver<Option<QueryData>> {
        let current = self.inner.entries.get(&key).await;
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|_, subscription| subscription.is_live());
        let subscription = subscribers.entry(key).or_insert_with(|| Subscription {
            sender: watch::channel(current.as_ref().map(|entry| entry.data.clone())).0,
            fetcher: None,
        });
        if subscription.fetcher.is_none() {
            subscription.fetcher = current.map(|entry| entry.fetcher);
        }
        subscription.sender.subscribe()
    }

    pub async fn state(&self, key: &QueryKey) -> Option<Freshness> {
        let fetching = self.lock_in_flight().contains_key(key);
        if fetching {
            return Some(Freshness::Fetching);
        }
        self.inner.entries.get(key).await.map(|entry| {
            if self.is_expired(&entry) {
                Freshness::Stale
            } else {
                Freshness::Fresh
            }
        })
    }

    /// Last stored value regardless of freshness.
    pub async fn peek(&self, key: &QueryKey) -> Option<QueryData> {
        self.inner.entries.get(key).await.map(|entry| entry.data)
    }

    /// Subscriptions and in-flight fetches currently tracked.
    #[cfg(test)]
    fn registry_sizes(&self) -> (usize, usize) {
        (self.lock_subscribers().len(), self.lock_in_flight().len())
    }
}
