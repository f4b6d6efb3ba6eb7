// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Pull catch-up
//!
//! Brings a local metric up to date with a remote history. The loop stops
//! when the remote returns nothing, or when the newest value it returns does
//! not move the cursor forward. The second condition is what keeps an
//! overlapping or stale remote from spinning the loop forever.

use std::sync::Arc;

use async_trait::async_trait;

use super::{PeerClient, RemoteLink};
use crate::codec::HistoryRequest;
use crate::error::Result;
use crate::metric::{earliest, now_millis, Metric, MetricId, Timestamped};

/// Where a binding pulls remote values from
#[async_trait]
pub trait PullSource: Send + Sync {
    /// Values inside the requested window
    async fn fetch(&self, request: &HistoryRequest) -> Result<Vec<Timestamped>>;

    /// Short label for log lines
    fn describe(&self) -> String;
}

/// History of a metric hosted by a peer
pub struct RemoteHistory {
    link: RemoteLink,
    remote: MetricId,
    client: Arc<dyn PeerClient>,
}

impl RemoteHistory {
    pub fn new(link: RemoteLink, remote: MetricId, client: Arc<dyn PeerClient>) -> Self {
        Self {
            link,
            remote,
            client,
        }
    }

    pub fn link(&self) -> &RemoteLink {
        &self.link
    }

    pub fn remote(&self) -> &MetricId {
        &self.remote
    }
}

#[async_trait]
impl PullSource for RemoteHistory {
    async fn fetch(&self, request: &HistoryRequest) -> Result<Vec<Timestamped>> {
        self.client.history(&self.link, &self.remote, request).await
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.link, self.remote)
    }
}

/// Run the catch-up loop once. Returns how many values were applied.
///
/// Any failure aborts this invocation only. Nothing is retried here; the next
/// trigger is the retry.
pub async fn catch_up(metric: &Metric, source: &dyn PullSource) -> Result<usize> {
    let mut cursor = metric.last_timestamp().unwrap_or_else(earliest);
    let mut applied = 0;

    loop {
        let request = HistoryRequest::between(cursor, now_millis());
        let batch = source.fetch(&request).await?;
        let Some(newest) = batch.iter().map(|v| v.timestamp).max() else {
            break;
        };
        applied += metric.append(batch);
        if newest <= cursor {
            break;
        }
        cursor = newest;
    }

    log::debug!(
        "Caught up {} from {}: {} new values",
        metric.name(),
        source.describe(),
        applied
    );
    Ok(applied)
}
