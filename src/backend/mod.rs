//! Adapters for the hosted backend: identity, table queries and change
//! notification.
//!
//! ## Flow Overview
//!
//! 1. **Identity:** `HttpIdentity` signs in with email and password and keeps
//!    the returned access token in memory on the shared [`BackendClient`].
//! 2. **Query:** `HttpQuery` reads whole tables newest-first using the same
//!    client, so reads carry the signed-in user's bearer token.
//! 3. **Changes:** a [`ChangeFeed`] delivers row-level Insert/Update/Delete
//!    events per table. `PollingFeed` derives them from periodic snapshots;
//!    `BroadcastFeed` lets a host push them from its own transport.
//!
//! The traits are the seams; the live store and the session gate only see
//! `dyn IdentityService`, `dyn QueryService` and `dyn ChangeFeed`. Tokens and
//! passwords pass through here and must never be logged.

pub mod changes;
pub mod http;
pub mod identity;
pub mod poll;
pub mod query;

pub use changes::{
    BroadcastFeed, ChangeEvent, ChangeFeed, ChangeHandler, ChangeKind, RawChange, Subscription,
};
pub use http::BackendClient;
pub use identity::{HttpIdentity, Identity, IdentityService};
pub use poll::PollingFeed;
pub use query::{HttpQuery, Order, QueryService};
