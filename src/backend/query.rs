//! Table reads against the backend's REST query endpoint.

use crate::{backend::http::BackendClient, error::Result, model::Table};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// Newest-first ordering on one column, with an optional row cap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
    pub limit: Option<usize>,
}

impl Order {
    pub fn newest_first(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
            limit: None,
        }
    }

    /// Default dashboard ordering for `table`; the activity log is capped at
    /// `activity_limit` rows.
    #[must_use]
    pub fn for_table(table: Table, activity_limit: usize) -> Self {
        let order = Self::newest_first(table.order_column());
        match table {
            Table::Activity => order.limit(activity_limit),
            Table::Employees | Table::Apps | Table::Onboarding => order,
        }
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in the backend's `order=col.desc&limit=n` form.
    fn params(&self) -> Vec<(&'static str, String)> {
        let direction = if self.descending { "desc" } else { "asc" };
        let mut params = vec![("order", format!("{}.{direction}", self.column))];
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait QueryService: Send + Sync {
    /// Reads every row of `table` as raw JSON objects.
    async fn select_all(&self, table: Table, order: Option<Order>) -> Result<Vec<Value>>;
}

pub struct HttpQuery {
    client: Arc<BackendClient>,
}

impl HttpQuery {
    #[must_use]
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryService for HttpQuery {
    async fn select_all(&self, table: Table, order: Option<Order>) -> Result<Vec<Value>> {
        let mut params = vec![("select", "*".to_string())];
        if let Some(order) = &order {
            params.extend(order.params());
        }

        let span = info_span!("backend.select", http.method = "GET", table = %table);
        self.client
            .get_json(&format!("/rest/v1/{}", table.name()), &params)
            .instrument(span)
            .await
    }
}
