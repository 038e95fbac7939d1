//! Dashboard view model: the session gate, the live store and the aggregate
//! panels composed into one mount / refresh / unmount lifecycle.

use crate::{
    aggregates::Summary,
    backend::identity::Identity,
    model::Table,
    session::{Route, SessionGate},
    store::{LiveStore, Snapshot},
};
use chrono::NaiveDate;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock,
};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Ready,
    /// Error panel with a manual retry; holds the message to show.
    Failed(String),
}

/// Result of mounting the dashboard.
pub enum Mount {
    Redirect(Route),
    Ready(Dashboard),
}

/// What a renderer needs for one frame.
#[derive(Clone, Debug)]
pub struct DashboardView {
    pub status: LoadStatus,
    pub identity: Option<Identity>,
    /// Whether change subscriptions are open.
    pub live: bool,
    /// Present only when the data loaded.
    pub summary: Option<Summary>,
}

pub struct Dashboard {
    gate: Arc<SessionGate>,
    store: LiveStore,
    status: RwLock<LoadStatus>,
    follow: bool,
    live: AtomicBool,
}

impl Dashboard {
    /// Runs the gate, then the initial load, then the subscriptions. No data
    /// is fetched without a session. A failed load leaves the dashboard in
    /// [`LoadStatus::Failed`] without subscriptions until [`Self::refresh`].
    pub async fn mount(gate: Arc<SessionGate>, store: LiveStore) -> Mount {
        Self::mount_with(gate, store, true).await
    }

    /// Like [`Self::mount`] but never subscribes: the data is read once and
    /// stays as loaded.
    pub async fn mount_once(gate: Arc<SessionGate>, store: LiveStore) -> Mount {
        Self::mount_with(gate, store, false).await
    }

    async fn mount_with(gate: Arc<SessionGate>, store: LiveStore, follow: bool) -> Mount {
        match gate.check().await {
            Route::Dashboard => {}
            route => {
                info!("No session, redirecting to {}", route);
                return Mount::Redirect(route);
            }
        }

        let dashboard = Self {
            gate,
            store,
            status: RwLock::new(LoadStatus::Loading),
            follow,
            live: AtomicBool::new(false),
        };
        dashboard.refresh().await;
        Mount::Ready(dashboard)
    }

    /// Re-issues all four fetches. A live dashboard opens its subscriptions
    /// once the data is loaded.
    pub async fn refresh(&self) -> LoadStatus {
        self.set_status(LoadStatus::Loading);
        let status = match self.store.load().await {
            Ok(()) => LoadStatus::Ready,
            Err(err) => {
                warn!("{}", err);
                LoadStatus::Failed(err.to_string())
            }
        };
        self.set_status(status.clone());

        if self.follow && status == LoadStatus::Ready && !self.is_live() {
            match self.store.subscribe().await {
                Ok(()) => {
                    self.live.store(true, Ordering::SeqCst);
                    info!("Dashboard is live");
                }
                Err(err) => warn!("Dashboard is not live: {}", err),
            }
        }
        status
    }

    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Recomputes every panel from the current collections.
    #[must_use]
    pub fn view(&self, today: NaiveDate) -> DashboardView {
        let status = self.status();
        let summary = (status == LoadStatus::Ready)
            .then(|| self.store.read(|snapshot| Summary::compute(snapshot, today)));
        DashboardView {
            status,
            identity: self.gate.current(),
            live: self.is_live(),
            summary,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// CSV of one collection.
    ///
    /// # Errors
    /// Propagates serialization failures.
    pub fn export(&self, table: Table) -> crate::error::Result<String> {
        self.store
            .read(|snapshot| crate::export::export_table(snapshot, table))
    }

    #[must_use]
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.store.revisions()
    }

    /// Closes every subscription. Late fetch results and events are dropped.
    pub async fn unmount(&self) {
        self.store.teardown().await;
        self.live.store(false, Ordering::SeqCst);
        info!("Dashboard unmounted");
    }

    /// Unmounts and ends the session.
    pub async fn sign_out(&self) -> Route {
        self.unmount().await;
        self.gate.sign_out().await
    }

    fn set_status(&self, status: LoadStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{
            changes::{BroadcastFeed, ChangeKind, RawChange},
            identity::MockIdentityService,
            query::MockQueryService,
        },
        error::Error,
        model::RecordId,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    fn day(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
    }

    fn signed_in() -> Arc<SessionGate> {
        let mut identity = MockIdentityService::new();
        identity.expect_current_user().returning(|| {
            Box::pin(async {
                Ok(Some(Identity {
                    id: RecordId::from("u1"),
                    email: Some("ada@example.com".to_string()),
                }))
            })
        });
        identity
            .expect_sign_out()
            .returning(|| Box::pin(async { Ok(()) }));
        Arc::new(SessionGate::new(Arc::new(identity)))
    }

    fn rows_for(table: Table) -> Vec<Value> {
        match table {
            Table::Employees => vec![json!({"id": "e1", "created_at": "2024-03-09T10:00:00Z"})],
            Table::Apps => vec![json!({"id": "a1", "name": "CRM"})],
            Table::Onboarding => vec![
                json!({"id": "o1", "employee_id": "e1", "app_id": "a1", "progress": 20}),
                json!({"id": "o2", "progress": 80, "completed": true}),
            ],
            Table::Activity => vec![json!({"id": 1, "message": "hello"})],
        }
    }

    #[tokio::test]
    async fn without_session_nothing_is_fetched() {
        let mut identity = MockIdentityService::new();
        identity
            .expect_current_user()
            .returning(|| Box::pin(async { Ok(None) }));
        let mut query = MockQueryService::new();
        query.expect_select_all().never();
        let feed = Arc::new(BroadcastFeed::new());

        let store = LiveStore::new(Arc::new(query), feed.clone(), 100);
        let mounted =
            Dashboard::mount(Arc::new(SessionGate::new(Arc::new(identity))), store).await;

        assert!(matches!(mounted, Mount::Redirect(Route::Login)));
        assert_eq!(feed.subscriber_count(Table::Employees), 0);
    }

    #[tokio::test]
    async fn mount_loads_subscribes_and_renders() {
        let mut query = MockQueryService::new();
        query
            .expect_select_all()
            .returning(|table, _| Box::pin(async move { Ok(rows_for(table)) }));
        let feed = Arc::new(BroadcastFeed::new());
        let store = LiveStore::new(Arc::new(query), feed.clone(), 100);

        let Mount::Ready(dashboard) = Dashboard::mount(signed_in(), store).await else {
            panic!("expected dashboard");
        };

        let view = dashboard.view(day("2024-03-10"));
        assert_eq!(view.status, LoadStatus::Ready);
        assert!(view.live);
        let summary = view.summary.unwrap();
        assert_eq!(summary.counts.employees, 1);
        assert_eq!(summary.counts.active_onboardings, 1);
        assert_eq!(summary.average_adoption, 50);
        assert_eq!(summary.app_usage[0].onboardings, 1);
        assert_eq!(summary.daily[5].employees, 1);

        feed.publish(
            RawChange::from_row(Table::Apps, ChangeKind::Insert, json!({"id": "a2", "name": "Wiki"}))
                .unwrap(),
        );
        let summary = dashboard.view(day("2024-03-10")).summary.unwrap();
        assert_eq!(summary.counts.apps, 2);

        dashboard.unmount().await;
        assert_eq!(feed.subscriber_count(Table::Apps), 0);
        assert!(!dashboard.is_live());
    }

    #[tokio::test]
    async fn failed_load_shows_error_until_refresh() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut query = MockQueryService::new();
        let counter = Arc::clone(&attempts);
        query.expect_select_all().returning(move |table, _| {
            let failing = table == Table::Apps && counter.fetch_add(1, Ordering::SeqCst) == 0;
            Box::pin(async move {
                if failing {
                    Err(Error::Network("connection refused".to_string()))
                } else {
                    Ok(rows_for(table))
                }
            })
        });
        let feed = Arc::new(BroadcastFeed::new());
        let store = LiveStore::new(Arc::new(query), feed.clone(), 100);

        let Mount::Ready(dashboard) = Dashboard::mount(signed_in(), store).await else {
            panic!("expected dashboard");
        };

        let view = dashboard.view(day("2024-03-10"));
        assert!(matches!(view.status, LoadStatus::Failed(ref msg) if msg.contains("apps")));
        assert!(view.summary.is_none());
        assert!(!view.live);
        assert_eq!(feed.subscriber_count(Table::Apps), 0);

        assert_eq!(dashboard.refresh().await, LoadStatus::Ready);
        assert!(dashboard.is_live());
        assert_eq!(feed.subscriber_count(Table::Apps), 1);
    }

    #[tokio::test]
    async fn mount_once_reads_each_table_once_and_stays_static() {
        let mut query = MockQueryService::new();
        query
            .expect_select_all()
            .times(4)
            .returning(|table, _| Box::pin(async move { Ok(rows_for(table)) }));
        let feed = Arc::new(BroadcastFeed::new());
        let store = LiveStore::new(Arc::new(query), feed.clone(), 100);

        let Mount::Ready(dashboard) = Dashboard::mount_once(signed_in(), store).await else {
            panic!("expected dashboard");
        };

        let view = dashboard.view(day("2024-03-10"));
        assert_eq!(view.status, LoadStatus::Ready);
        assert!(!view.live);
        assert!(view.summary.is_some());
        for table in Table::ALL {
            assert_eq!(feed.subscriber_count(table), 0);
        }
    }

    #[tokio::test]
    async fn export_uses_current_rows() {
        let mut query = MockQueryService::new();
        query
            .expect_select_all()
            .returning(|table, _| Box::pin(async move { Ok(rows_for(table)) }));
        let store = LiveStore::new(Arc::new(query), Arc::new(BroadcastFeed::new()), 100);

        let Mount::Ready(dashboard) = Dashboard::mount(signed_in(), store).await else {
            panic!("expected dashboard");
        };

        let csv = dashboard.export(Table::Apps).unwrap();
        assert_eq!(csv, "id,name\n\"a1\",\"CRM\"");

        assert_eq!(dashboard.sign_out().await, Route::Login);
    }
}
