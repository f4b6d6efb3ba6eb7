// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Peer Synchronization - Pull Catch-up and Push Notification
//!
//! Keeps a local metric in step with a metric hosted by a peer.
//!
//! # Pull
//!
//! A pull binding maps a local fingerprint to a remote history. Triggering it
//! runs the catch-up loop as a detached job: fetch `[cursor, now)`, append,
//! advance the cursor to the newest value received, repeat until nothing new
//! arrives. The local metric must accept remote updates.
//!
//! # Push
//!
//! A push notifier subscribes to a local metric and, on every accepted value,
//! sends the peer an empty-body push. The peer answers by triggering its own
//! pull binding, so a push is only a hint to come and fetch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use metricx::client::HttpPeerClient;
//! use metricx::metric::Metric;
//! use metricx::sync::{PeerAuth, RemoteLink, SyncRegistry, Synchronizer, TokioScheduler};
//!
//! # async fn example() -> metricx::Result<()> {
//! let registry = Arc::new(SyncRegistry::new());
//! let sync = Synchronizer::new(
//!     Arc::clone(&registry),
//!     Arc::new(HttpPeerClient::new()?),
//!     Arc::new(TokioScheduler::current()?),
//! );
//! let cpu = Arc::new(Metric::new("cpu_usage_percent").remotely_updatable(true));
//! let peer = RemoteLink::new("http://10.0.0.2:8080").with_auth(PeerAuth::token("sk-sync"));
//!
//! sync.pull_from(&cpu, peer, "cpu_usage_percent");
//! sync.trigger(Arc::clone(&cpu))?;
//! # Ok(())
//! # }
//! ```

mod link;
mod peer;
mod pull;
mod push;
mod registry;
mod scheduler;

pub use link::{PeerAuth, RemoteLink, DEFAULT_PEER_TIMEOUT};
pub use peer::PeerClient;
pub use pull::{catch_up, PullSource, RemoteHistory};
pub use push::PushNotifier;
pub use registry::SyncRegistry;
pub use scheduler::{Job, JobScheduler, QueueScheduler, TokioScheduler};

use std::sync::Arc;

use crate::error::Result;
use crate::metric::{Metric, MetricId, SubscriptionId};

/// Wires metrics to peers in either direction
#[derive(Clone)]
pub struct Synchronizer {
    registry: Arc<SyncRegistry>,
    client: Arc<dyn PeerClient>,
    scheduler: Arc<dyn JobScheduler>,
}

impl Synchronizer {
    pub fn new(
        registry: Arc<SyncRegistry>,
        client: Arc<dyn PeerClient>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        Self {
            registry,
            client,
            scheduler,
        }
    }

    pub fn registry(&self) -> &Arc<SyncRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<dyn JobScheduler> {
        &self.scheduler
    }

    /// Bind `metric` to pull from the peer's metric named `remote_name`.
    ///
    /// Returns false if the metric was already bound; the earlier binding stays.
    pub fn pull_from(&self, metric: &Metric, link: RemoteLink, remote_name: &str) -> bool {
        let source = RemoteHistory::new(link, MetricId::of(remote_name), Arc::clone(&self.client));
        self.registry.register(metric.id(), Arc::new(source))
    }

    /// Notify the peer's metric named `remote_name` whenever `metric` changes
    pub fn push_to(&self, metric: &Metric, link: RemoteLink, remote_name: &str) -> SubscriptionId {
        PushNotifier::new(
            link,
            MetricId::of(remote_name),
            Arc::clone(&self.client),
            Arc::clone(&self.scheduler),
        )
        .attach(metric)
    }

    /// Pull and push against the same remote metric
    pub fn mirror(&self, metric: &Metric, link: RemoteLink, remote_name: &str) -> SubscriptionId {
        self.pull_from(metric, link.clone(), remote_name);
        self.push_to(metric, link, remote_name)
    }

    /// Schedule a catch-up of `metric` from its pull binding
    pub fn trigger(&self, metric: Arc<Metric>) -> Result<()> {
        self.registry.trigger(metric, self.scheduler.as_ref())
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::HistoryRequest;
    use crate::error::ExchangeError;
    use crate::metric::Timestamped;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Serves a fixed remote history and records every call it receives
    #[derive(Default)]
    struct FakePeer {
        history: Vec<Timestamped>,
        fail: bool,
        pushes: Mutex<Vec<(String, MetricId)>>,
        fetches: Mutex<Vec<(String, MetricId)>>,
    }

    impl FakePeer {
        fn with_history(n: i64) -> Self {
            Self {
                history: (1..=n)
                    .map(|i| Timestamped::new(Utc.timestamp_millis_opt(i * 1000).unwrap(), i))
                    .collect(),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PeerClient for FakePeer {
        async fn history(
            &self,
            link: &RemoteLink,
            remote: &MetricId,
            request: &HistoryRequest,
        ) -> Result<Vec<Timestamped>> {
            self.fetches
                .lock()
                .unwrap()
                .push((link.base_url().to_string(), remote.clone()));
            if self.fail {
                return Err(ExchangeError::Network("unreachable".into()));
            }
            Ok(self
                .history
                .iter()
                .filter(|v| request.contains(v.timestamp))
                .cloned()
                .collect())
        }

        async fn notify_push(&self, link: &RemoteLink, remote: &MetricId) -> Result<()> {
            self.pushes
                .lock()
                .unwrap()
                .push((link.base_url().to_string(), remote.clone()));
            if self.fail {
                return Err(ExchangeError::Network("unreachable".into()));
            }
            Ok(())
        }
    }

    fn setup(peer: FakePeer) -> (Synchronizer, Arc<FakePeer>, Arc<QueueScheduler>) {
        let peer = Arc::new(peer);
        let scheduler = Arc::new(QueueScheduler::new());
        let sync = Synchronizer::new(
            Arc::new(SyncRegistry::new()),
            Arc::clone(&peer) as Arc<dyn PeerClient>,
            Arc::clone(&scheduler) as Arc<dyn JobScheduler>,
        );
        (sync, peer, scheduler)
    }

    fn link() -> RemoteLink {
        RemoteLink::new("http://peer:8080")
    }

    #[tokio::test]
    async fn test_trigger_runs_catch_up_detached() {
        let (sync, peer, scheduler) = setup(FakePeer::with_history(4));
        let metric = Arc::new(Metric::new("local").remotely_updatable(true));
        assert!(sync.pull_from(&metric, link(), "remote"));

        sync.trigger(Arc::clone(&metric)).unwrap();
        assert!(metric.is_empty(), "catch-up must not run on the caller's path");

        scheduler.run_pending().await;
        assert_eq!(metric.len(), 4);
        assert_eq!(
            peer.fetches.lock().unwrap()[0],
            ("http://peer:8080".to_string(), MetricId::of("remote"))
        );
    }

    #[tokio::test]
    async fn test_trigger_preconditions() {
        let (sync, _peer, scheduler) = setup(FakePeer::with_history(1));

        let unbound = Arc::new(Metric::new("unbound").remotely_updatable(true));
        assert!(matches!(
            sync.trigger(unbound),
            Err(ExchangeError::PreconditionFailed(_))
        ));

        let local_only = Arc::new(Metric::new("local_only"));
        sync.pull_from(&local_only, link(), "remote");
        assert!(matches!(
            sync.trigger(local_only),
            Err(ExchangeError::PreconditionFailed(_))
        ));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_first_binding_wins() {
        let (sync, peer, scheduler) = setup(FakePeer::with_history(1));
        let metric = Arc::new(Metric::new("local").remotely_updatable(true));

        assert!(sync.pull_from(&metric, link(), "first"));
        assert!(!sync.pull_from(&metric, RemoteLink::new("http://elsewhere"), "second"));
        assert_eq!(sync.registry().len(), 1);

        sync.trigger(Arc::clone(&metric)).unwrap();
        scheduler.run_pending().await;
        let fetches = peer.fetches.lock().unwrap();
        assert!(fetches.iter().all(|(_, id)| *id == MetricId::of("first")));
    }

    #[tokio::test]
    async fn test_failed_catch_up_is_contained() {
        let (sync, _peer, scheduler) = setup(FakePeer::failing());
        let metric = Arc::new(Metric::new("local").remotely_updatable(true));
        sync.pull_from(&metric, link(), "remote");

        sync.trigger(Arc::clone(&metric)).unwrap();
        assert_eq!(scheduler.run_pending().await, 1);
        assert!(metric.is_empty());

        // A later trigger is accepted as usual.
        assert!(sync.trigger(metric).is_ok());
    }

    #[tokio::test]
    async fn test_push_notifies_per_value_off_path() {
        let (sync, peer, scheduler) = setup(FakePeer::default());
        let metric = Metric::new("local");
        let sub = sync.push_to(&metric, link(), "remote");

        metric.record(1);
        metric.record(2);
        assert!(peer.pushes.lock().unwrap().is_empty());
        assert_eq!(scheduler.run_pending().await, 2);
        assert_eq!(peer.pushes.lock().unwrap().len(), 2);

        assert!(metric.unsubscribe(sub));
        metric.record(3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_push_failure_does_not_affect_recording() {
        let (sync, peer, scheduler) = setup(FakePeer::failing());
        let metric = Metric::new("local");
        sync.push_to(&metric, link(), "remote");

        metric.record("a");
        scheduler.run_pending().await;
        metric.record("b");
        scheduler.run_pending().await;

        assert_eq!(metric.len(), 2);
        assert_eq!(peer.pushes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mirror_binds_both_directions() {
        let (sync, peer, scheduler) = setup(FakePeer::with_history(2));
        let metric = Arc::new(Metric::new("local").remotely_updatable(true));
        sync.mirror(&metric, link(), "shared");

        assert!(sync.registry().is_bound(metric.id()));
        sync.trigger(Arc::clone(&metric)).unwrap();
        scheduler.run_pending().await;

        // Pulled values are accepted values, so each one is announced back.
        assert_eq!(metric.len(), 2);
        assert_eq!(peer.pushes.lock().unwrap().len(), 2);
    }
}
