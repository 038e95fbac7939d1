//! Live collection store: four in-memory mirrors kept in sync with the backend.
//!
//! ## Lifecycle
//!
//! 1. **Load:** one read per table, issued concurrently and joined. Any
//!    failure yields a single [`QueryError`] and nothing is written; on success
//!    all four collections are replaced under one write lock.
//! 2. **Subscribe:** one change subscription per table, starting from the
//!    rows already mirrored so nothing written after the load is missed. Each
//!    handler decodes
//!    the row and reconciles exactly one collection while holding the write
//!    lock, so concurrent feeds are serialized through a single writer.
//! 3. **Teardown:** cancels the store under the write lock, then closes every
//!    subscription. Close failures are logged and dropped. Changes or fetch
//!    results that arrive afterwards are discarded.
//!
//! Every applied change or load bumps a revision on a `watch` channel so views
//! know when to re-render.

use crate::{
    backend::{
        changes::{ChangeEvent, ChangeFeed, ChangeHandler, ChangeKind, RawChange, Subscription},
        query::{Order, QueryService},
    },
    collection::{Applied, Collection},
    error::{Error, QueryError, Result},
    model::{ActivityEntry, App, Employee, Mirrored, OnboardingRecord, Table},
};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Point-in-time copy of the four collections.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub employees: Collection<Employee>,
    pub apps: Collection<App>,
    pub onboarding: Collection<OnboardingRecord>,
    pub activity: Collection<ActivityEntry>,
}

impl Snapshot {
    #[must_use]
    pub fn new(activity_limit: usize) -> Self {
        Self {
            employees: Collection::new(),
            apps: Collection::new(),
            onboarding: Collection::new(),
            activity: Collection::bounded(activity_limit),
        }
    }

    /// Backend rows currently mirrored for `table`, newest first. Client-side
    /// records are left out.
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Value> {
        match table {
            Table::Employees => backend_rows(&self.employees),
            Table::Apps => backend_rows(&self.apps),
            Table::Onboarding => backend_rows(&self.onboarding),
            Table::Activity => backend_rows(&self.activity),
        }
    }
}

fn backend_rows<T: Mirrored + Clone>(collection: &Collection<T>) -> Vec<Value> {
    collection
        .iter()
        .filter_map(|record| record.row().cloned().map(Value::Object))
        .collect()
}

pub struct LiveStore {
    query: Arc<dyn QueryService>,
    feed: Arc<dyn ChangeFeed>,
    state: Arc<RwLock<Snapshot>>,
    activity_limit: usize,
    cancel: CancellationToken,
    subscriptions: Mutex<Vec<Subscription>>,
    revision: Arc<watch::Sender<u64>>,
}

impl LiveStore {
    #[must_use]
    pub fn new(
        query: Arc<dyn QueryService>,
        feed: Arc<dyn ChangeFeed>,
        activity_limit: usize,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            query,
            feed,
            state: Arc::new(RwLock::new(Snapshot::new(activity_limit))),
            activity_limit,
            cancel: CancellationToken::new(),
            subscriptions: Mutex::new(Vec::new()),
            revision: Arc::new(revision),
        }
    }

    /// Fetches all four tables concurrently and replaces the collections only
    /// if every fetch succeeded. Results that arrive after teardown are
    /// dropped.
    ///
    /// # Errors
    /// Returns a [`QueryError`] naming every table whose fetch failed.
    pub async fn load(&self) -> std::result::Result<(), QueryError> {
        let (employees, apps, onboarding, activity) = tokio::join!(
            self.fetch(Table::Employees),
            self.fetch(Table::Apps),
            self.fetch(Table::Onboarding),
            self.fetch(Table::Activity),
        );

        let mut failures = Vec::new();
        let employees = collect_rows(Table::Employees, employees, &mut failures);
        let apps = collect_rows(Table::Apps, apps, &mut failures);
        let onboarding = collect_rows(Table::Onboarding, onboarding, &mut failures);
        let activity = collect_rows(Table::Activity, activity, &mut failures);
        if !failures.is_empty() {
            return Err(QueryError { failures });
        }

        let employees = decode_rows::<Employee>(Table::Employees, employees);
        let apps = decode_rows::<App>(Table::Apps, apps);
        let onboarding = decode_rows::<OnboardingRecord>(Table::Onboarding, onboarding);
        let activity = decode_rows::<ActivityEntry>(Table::Activity, activity);

        {
            let mut snapshot = write_state(&self.state);
            if self.cancel.is_cancelled() {
                debug!("Discarding load results that arrived after teardown");
                return Ok(());
            }
            snapshot.employees.reset(employees);
            snapshot.apps.reset(apps);
            snapshot.onboarding.reset(onboarding);
            snapshot.activity.reset(activity);
            info!(
                "Loaded {} employees, {} apps, {} onboarding records, {} activity entries",
                snapshot.employees.len(),
                snapshot.apps.len(),
                snapshot.onboarding.len(),
                snapshot.activity.len()
            );
        }
        self.revision.send_modify(|revision| *revision += 1);
        Ok(())
    }

    /// Opens one subscription per table. Tables whose subscription fails stay
    /// static; the others are live. Calling this again while subscribed is a
    /// no-op.
    ///
    /// # Errors
    /// Returns [`Error::Subscription`] if the store was torn down or any
    /// table could not be subscribed.
    pub async fn subscribe(&self) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock().await;
        if self.cancel.is_cancelled() {
            return Err(Error::Subscription("store is torn down".to_string()));
        }
        if !subscriptions.is_empty() {
            return Ok(());
        }

        let mut failed = Vec::new();
        for table in Table::ALL {
            let baseline = self.read(|snapshot| snapshot.rows(table));
            match self.feed.subscribe(table, baseline, self.handler(table)).await {
                Ok(subscription) => subscriptions.push(subscription),
                Err(err) => {
                    warn!("Failed to subscribe to {}: {}", table, err);
                    failed.push(table.name());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Subscription(format!(
                "no live updates for {}",
                failed.join(", ")
            )))
        }
    }

    /// Stops the store. Idempotent.
    pub async fn teardown(&self) {
        {
            let _snapshot = write_state(&self.state);
            self.cancel.cancel();
        }

        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().await);
        for subscription in subscriptions {
            if let Err(err) = self.feed.unsubscribe(&subscription).await {
                debug!(
                    "Ignoring close failure for {} subscription: {}",
                    subscription.table(),
                    err
                );
            }
        }
        debug!("Live store torn down");
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `view` against the current collections.
    pub fn read<R>(&self, view: impl FnOnce(&Snapshot) -> R) -> R {
        view(&read_state(&self.state))
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        read_state(&self.state).clone()
    }

    /// Receiver that changes whenever a load or change event lands.
    #[must_use]
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    #[must_use]
    pub fn activity_limit(&self) -> usize {
        self.activity_limit
    }

    async fn fetch(&self, table: Table) -> Result<Vec<Value>> {
        self.query
            .select_all(table, Some(Order::for_table(table, self.activity_limit)))
            .await
    }

    fn handler(&self, table: Table) -> ChangeHandler {
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        let revision = Arc::clone(&self.revision);

        Arc::new(move |change: RawChange| {
            if change.table != table {
                warn!("Ignoring {} change delivered to {} handler", change.table, table);
                return;
            }
            let changed = {
                let mut snapshot = write_state(&state);
                if cancel.is_cancelled() {
                    debug!("Dropping {} change after teardown", table);
                    return;
                }
                apply_change(&mut snapshot, change)
            };
            if changed {
                revision.send_modify(|revision| *revision += 1);
            }
        })
    }
}

/// Reconciles one change into the matching collection. Returns whether any
/// collection changed.
pub(crate) fn apply_change(snapshot: &mut Snapshot, change: RawChange) -> bool {
    match change.table {
        Table::Employees => reconcile(&mut snapshot.employees, change),
        Table::Apps => reconcile(&mut snapshot.apps, change),
        Table::Activity => reconcile(&mut snapshot.activity, change),
        Table::Onboarding => reconcile_onboarding(snapshot, change),
    }
}

fn reconcile<T: Mirrored + Clone>(
    collection: &mut Collection<T>,
    change: RawChange,
) -> bool {
    let table = change.table;
    match change.decode::<T>() {
        Ok(event) => collection.apply(event) != Applied::Unchanged,
        Err(err) => {
            warn!("Skipping undecodable {} change: {}", table, err);
            false
        }
    }
}

/// Onboarding updates that reach 100% also prepend a client-side completion
/// entry to the activity feed, once per transition.
fn reconcile_onboarding(snapshot: &mut Snapshot, change: RawChange) -> bool {
    let event: ChangeEvent<OnboardingRecord> = match change.decode() {
        Ok(event) => event,
        Err(err) => {
            warn!("Skipping undecodable {} change: {}", Table::Onboarding, err);
            return false;
        }
    };

    let completion = match (&event.kind, &event.record) {
        (ChangeKind::Update, Some(record)) if record.is_finished() => {
            let was_finished = snapshot
                .onboarding
                .get(&event.key)
                .is_some_and(OnboardingRecord::is_finished);
            (!was_finished).then(|| completion_entry(snapshot, record))
        }
        _ => None,
    };

    let changed = snapshot.onboarding.apply(event) != Applied::Unchanged;
    if let Some(entry) = completion {
        snapshot.activity.upsert(entry);
        return true;
    }
    changed
}

fn completion_entry(snapshot: &Snapshot, record: &OnboardingRecord) -> ActivityEntry {
    let who = record.employee_id.as_ref().map_or_else(
        || "An employee".to_string(),
        |employee_id| {
            snapshot.employees.get(employee_id).map_or_else(
                || format!("Employee {employee_id}"),
                |employee| employee.display_name().to_string(),
            )
        },
    );
    ActivityEntry::local(format!("{who} completed onboarding"))
}

fn collect_rows(
    table: Table,
    result: Result<Vec<Value>>,
    failures: &mut Vec<(Table, Error)>,
) -> Vec<Value> {
    match result {
        Ok(rows) => rows,
        Err(err) => {
            warn!("Failed to load {}: {}", table, err);
            failures.push((table, err));
            Vec::new()
        }
    }
}

fn decode_rows<T: Mirrored>(table: Table, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match T::from_row(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("Skipping undecodable {} row: {}", table, err);
                None
            }
        })
        .collect()
}

fn write_state(state: &RwLock<Snapshot>) -> RwLockWriteGuard<'_, Snapshot> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

fn read_state(state: &RwLock<Snapshot>) -> RwLockReadGuard<'_, Snapshot> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}
