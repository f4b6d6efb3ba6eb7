// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

use std::sync::Arc;

use super::{JobScheduler, PeerClient, RemoteLink};
use crate::metric::{Metric, MetricId, SubscriptionId, Timestamped};

/// Tells a peer about new local values.
///
/// Each notification is an empty-body push sent as a detached job. A
/// failed send is logged and dropped; the peer's next catch-up fetches
/// whatever was missed.
#[derive(Clone)]
pub struct PushNotifier {
    link: RemoteLink,
    remote: MetricId,
    client: Arc<dyn PeerClient>,
    scheduler: Arc<dyn JobScheduler>,
}

impl PushNotifier {
    pub fn new(
        link: RemoteLink,
        remote: MetricId,
        client: Arc<dyn PeerClient>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        Self {
            link,
            remote,
            client,
            scheduler,
        }
    }

    /// Schedule one notification
    pub fn notify(&self) {
        let link = self.link.clone();
        let remote = self.remote.clone();
        let client = Arc::clone(&self.client);
        self.scheduler.schedule(Box::pin(async move {
            client.notify_push(&link, &remote).await.map_err(|e| {
                log::warn!("Push notification to {} for {} failed: {}", link, remote, e);
                e
            })
        }));
    }

    /// Notify on every value `metric` accepts from now on
    pub fn attach(self, metric: &Metric) -> SubscriptionId {
        log::info!(
            "Pushing updates of {} to {} as {}",
            metric.name(),
            self.link,
            self.remote
        );
        metric.subscribe(Box::new(move |_value: &Timestamped| self.notify()))
    }
}

impl std::fmt::Debug for PushNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushNotifier")
            .field("link", &self.link)
            .field("remote", &self.remote)
            .finish()
    }
}
