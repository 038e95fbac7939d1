//! Change feed derived from periodic table snapshots.
//!
//! Each subscription starts from the rows the subscriber already holds, then
//! re-reads the table on a fixed interval and diffs by key: new keys become
//! Inserts, changed rows Updates, vanished keys Deletes. Every subscription
//! runs in its own task and stops when its token is cancelled.

use crate::{
    backend::{
        changes::{ChangeFeed, ChangeHandler, ChangeKind, RawChange, Subscription},
        query::{Order, QueryService},
    },
    error::{Error, Result},
    model::{RecordId, Table},
};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct PollingFeed {
    query: Arc<dyn QueryService>,
    interval: Duration,
    activity_limit: usize,
    tasks: Mutex<HashMap<Subscription, CancellationToken>>,
    cancel: CancellationToken,
}

impl PollingFeed {
    #[must_use]
    pub fn new(query: Arc<dyn QueryService>, interval: Duration, activity_limit: usize) -> Self {
        Self {
            query,
            interval,
            activity_limit,
            tasks: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, HashMap<Subscription, CancellationToken>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollingFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl ChangeFeed for PollingFeed {
    async fn subscribe(
        &self,
        table: Table,
        baseline: Vec<Value>,
        handler: ChangeHandler,
    ) -> Result<Subscription> {
        let order = Order::for_table(table, self.activity_limit);
        let subscription = Subscription::new(table);
        let token = self.cancel.child_token();
        self.tasks().insert(subscription.clone(), token.clone());

        tokio::spawn(poll_loop(
            Arc::clone(&self.query),
            table,
            order,
            baseline,
            handler,
            self.interval,
            token,
        ));

        debug!("Polling {} every {:?}", table, self.interval);
        Ok(subscription)
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        match self.tasks().remove(subscription) {
            Some(token) => {
                token.cancel();
                debug!("Stopped polling {}", subscription.table());
                Ok(())
            }
            None => Err(Error::Subscription(format!(
                "unknown subscription on {}",
                subscription.table()
            ))),
        }
    }
}

async fn poll_loop(
    query: Arc<dyn QueryService>,
    table: Table,
    order: Order,
    mut previous: Vec<Value>,
    handler: ChangeHandler,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = cancel.cancelled() => {
                debug!("Polling loop for '{}' cancelled", table);
                break;
            }
        }

        let current = match query.select_all(table, Some(order.clone())).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!("Polling {} failed: {}", table, err);
                continue;
            }
        };

        for change in diff(table, &previous, &current) {
            // Unsubscribe may land while a diff is being delivered.
            if cancel.is_cancelled() {
                return;
            }
            handler(change);
        }
        previous = current;
    }
}

/// Changes that turn `previous` into `current`. Deletes come first; Inserts
/// and Updates follow oldest-first so that prepending leaves the newest row
/// in front. Rows without an id are ignored.
pub(crate) fn diff(table: Table, previous: &[Value], current: &[Value]) -> Vec<RawChange> {
    let before: HashMap<RecordId, &Value> = previous
        .iter()
        .filter_map(|row| row.get("id").and_then(RecordId::from_value).map(|key| (key, row)))
        .collect();
    let after: HashSet<RecordId> = current
        .iter()
        .filter_map(|row| row.get("id").and_then(RecordId::from_value))
        .collect();

    let mut changes: Vec<RawChange> = previous
        .iter()
        .filter_map(|row| row.get("id").and_then(RecordId::from_value))
        .filter(|key| !after.contains(key))
        .map(|key| RawChange::delete(table, key))
        .collect();

    for row in current.iter().rev() {
        let Some(key) = row.get("id").and_then(RecordId::from_value) else {
            continue;
        };
        let kind = match before.get(&key) {
            None => ChangeKind::Insert,
            Some(old) if *old != row => ChangeKind::Update,
            Some(_) => continue,
        };
        changes.push(RawChange {
            table,
            kind,
            key,
            record: Some(row.clone()),
        });
    }

    changes
}
