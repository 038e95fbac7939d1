//! Row-level change notification.
//!
//! A feed delivers [`RawChange`] values for one table to a single registered
//! handler and hands back an opaque [`Subscription`] used to cancel it. The
//! live store decodes each raw change into a typed [`ChangeEvent`] before
//! reconciling it into a collection.

use crate::{
    error::{Error, Result},
    model::{Keyed, Mirrored, RecordId, Table},
};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::debug;
use ulid::Ulid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change as delivered by a feed: the row is still untyped JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct RawChange {
    pub table: Table,
    pub kind: ChangeKind,
    pub key: RecordId,
    pub record: Option<Value>,
}

impl RawChange {
    /// Builds an Insert/Update from a full row, keyed by its `id` column.
    /// Returns `None` if the row has no usable id.
    #[must_use]
    pub fn from_row(table: Table, kind: ChangeKind, row: Value) -> Option<Self> {
        let key = row.get("id").and_then(RecordId::from_value)?;
        Some(Self {
            table,
            kind,
            key,
            record: Some(row),
        })
    }

    #[must_use]
    pub fn delete(table: Table, key: RecordId) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            key,
            record: None,
        }
    }

    /// Decodes the row into `T`. Delete events carry no row and always decode.
    ///
    /// # Errors
    /// Returns the serde error if the row does not match `T`.
    pub fn decode<T: Mirrored>(self) -> std::result::Result<ChangeEvent<T>, serde_json::Error> {
        let record = match self.record {
            Some(row) if self.kind != ChangeKind::Delete => Some(T::from_row(row)?),
            _ => None,
        };
        Ok(ChangeEvent {
            kind: self.kind,
            key: self.key,
            record,
        })
    }
}

/// A typed change ready to apply to a collection.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent<T> {
    pub kind: ChangeKind,
    pub key: RecordId,
    pub record: Option<T>,
}

impl<T: Keyed> ChangeEvent<T> {
    pub fn insert(record: T) -> Self {
        Self {
            kind: ChangeKind::Insert,
            key: record.key().clone(),
            record: Some(record),
        }
    }

    pub fn update(record: T) -> Self {
        Self {
            kind: ChangeKind::Update,
            key: record.key().clone(),
            record: Some(record),
        }
    }

    #[must_use]
    pub fn delete(key: RecordId) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key,
            record: None,
        }
    }
}

/// Callback invoked once per delivered change.
pub type ChangeHandler = Arc<dyn Fn(RawChange) + Send + Sync>;

/// Opaque handle returned by [`ChangeFeed::subscribe`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: Ulid,
    table: Table,
}

impl Subscription {
    #[must_use]
    pub fn new(table: Table) -> Self {
        Self {
            id: Ulid::new(),
            table,
        }
    }

    #[must_use]
    pub fn table(&self) -> Table {
        self.table
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Registers `handler` for changes on `table`. `baseline` holds the rows
    /// the caller already mirrors; feeds that derive changes from snapshots
    /// report everything that differs from it.
    async fn subscribe(
        &self,
        table: Table,
        baseline: Vec<Value>,
        handler: ChangeHandler,
    ) -> Result<Subscription>;

    /// Stops delivery for `subscription`. Callers treat failures as best-effort.
    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()>;
}

/// In-process feed: whatever transport the host has calls [`publish`] and
/// every handler registered for that table runs synchronously.
///
/// [`publish`]: BroadcastFeed::publish
#[derive(Default)]
pub struct BroadcastFeed {
    handlers: Mutex<HashMap<Subscription, ChangeHandler>>,
}

impl BroadcastFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `change` to every handler of its table and returns how many
    /// ran. Handlers run outside the registry lock so they may subscribe or
    /// unsubscribe themselves.
    pub fn publish(&self, change: RawChange) -> usize {
        let targets: Vec<ChangeHandler> = self
            .registry()
            .iter()
            .filter(|(subscription, _)| subscription.table == change.table)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in &targets {
            handler(change.clone());
        }
        targets.len()
    }

    #[must_use]
    pub fn subscriber_count(&self, table: Table) -> usize {
        self.registry()
            .keys()
            .filter(|subscription| subscription.table == table)
            .count()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<Subscription, ChangeHandler>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChangeFeed for BroadcastFeed {
    async fn subscribe(
        &self,
        table: Table,
        _baseline: Vec<Value>,
        handler: ChangeHandler,
    ) -> Result<Subscription> {
        let subscription = Subscription::new(table);
        self.registry().insert(subscription.clone(), handler);
        debug!("Subscribed to {}", table);
        Ok(subscription)
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        match self.registry().remove(subscription) {
            Some(_) => {
                debug!("Unsubscribed from {}", subscription.table);
                Ok(())
            }
            None => Err(Error::Subscription(format!(
                "unknown subscription on {}",
                subscription.table
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Employee;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, ChangeHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handler: ChangeHandler = Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn from_row_requires_an_id() {
        let change =
            RawChange::from_row(Table::Apps, ChangeKind::Insert, json!({"id": 3, "name": "CRM"}))
                .unwrap();
        assert_eq!(change.key, RecordId::from("3"));
        assert!(RawChange::from_row(Table::Apps, ChangeKind::Insert, json!({"name": "x"})).is_none());
    }

    #[test]
    fn decode_types_the_row() {
        let change = RawChange::from_row(
            Table::Employees,
            ChangeKind::Update,
            json!({"id": "e1", "email": "ada@example.com"}),
        )
        .unwrap();
        let event: ChangeEvent<Employee> = change.decode().unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(
            event.record.and_then(|employee| employee.email),
            Some("ada@example.com".to_string())
        );
    }

    #[test]
    fn decode_delete_ignores_row() {
        let change = RawChange {
            table: Table::Employees,
            kind: ChangeKind::Delete,
            key: RecordId::from("e1"),
            record: Some(json!({"id": "e1"})),
        };
        let event: ChangeEvent<Employee> = change.decode().unwrap();
        assert_eq!(event.record, None);
        assert_eq!(event.key, RecordId::from("e1"));
    }

    #[tokio::test]
    async fn publish_reaches_only_the_matching_table() {
        let feed = BroadcastFeed::new();
        let (apps, apps_handler) = counter();
        let (employees, employees_handler) = counter();
        feed.subscribe(Table::Apps, Vec::new(), apps_handler).await.unwrap();
        feed.subscribe(Table::Employees, Vec::new(), employees_handler).await.unwrap();

        let delivered = feed.publish(RawChange::delete(Table::Apps, RecordId::from("a1")));

        assert_eq!(delivered, 1);
        assert_eq!(apps.load(Ordering::SeqCst), 1);
        assert_eq!(employees.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery_and_rejects_unknown_handles() {
        let feed = BroadcastFeed::new();
        let (count, handler) = counter();
        let subscription = feed.subscribe(Table::Activity, Vec::new(), handler).await.unwrap();
        assert_eq!(feed.subscriber_count(Table::Activity), 1);

        feed.unsubscribe(&subscription).await.unwrap();
        feed.publish(RawChange::delete(Table::Activity, RecordId::from("x")));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(feed.subscriber_count(Table::Activity), 0);
        assert!(matches!(
            feed.unsubscribe(&subscription).await,
            Err(Error::Subscription(_))
        ));
    }
}
