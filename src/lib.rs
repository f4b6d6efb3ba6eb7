// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Metric Exchange
//!
//! Authorized remote access to recorded time-series metrics, and
//! peer-to-peer synchronization of those metrics between instances.
//!
//! # Layers
//!
//! - [`metric`]: in-memory metrics with ordered histories and change subscriptions
//! - [`auth`]: credentials, scopes and the authorization decision
//! - [`route`]: the six remote operations and their paths
//! - [`api`]: authorization-first operation façade over hosted metrics
//! - [`server`] / [`http_server`]: HTTP transport for the API
//! - [`sync`] / [`client`]: pull catch-up and push notification between peers
//! - [`config`]: TOML configuration and assembly
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use metricx::api::{MetricsApi, RequestContext};
//! use metricx::auth::{Scope, ScopedToken};
//! use metricx::metric::{Metric, MetricCollection, MetricId};
//! use metricx::sync::{QueueScheduler, SyncRegistry};
//!
//! let metrics = Arc::new(MetricCollection::new());
//! metrics.register(Metric::new("log")).record("started");
//!
//! let token = ScopedToken::new("sk-reader", [Scope::Last]).with_accessible(["log"]);
//! let api = MetricsApi::new(
//!     metrics,
//!     Arc::new(token),
//!     Arc::new(SyncRegistry::new()),
//!     Arc::new(QueueScheduler::new()),
//! );
//!
//! let last = api.last(&RequestContext::new("sk-reader"), &MetricId::of("log")).unwrap();
//! assert_eq!(last.value, "started");
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http_server;
pub mod metric;
pub mod route;
pub mod server;
pub mod sync;

pub use api::{MetricsApi, RequestContext};
pub use auth::{Credential, CredentialSet, Scope, ScopedToken, SharedSecret};
pub use config::{Exchange, ExchangeConfig};
pub use error::{ExchangeError, Result};
pub use metric::{Metric, MetricCollection, MetricId, Timestamped};
pub use route::{Operation, Routes};
