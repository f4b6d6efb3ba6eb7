// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

use async_trait::async_trait;

use super::RemoteLink;
use crate::codec::HistoryRequest;
use crate::error::Result;
use crate::metric::{MetricId, Timestamped};

/// The two peer calls synchronization depends on.
///
/// [`HttpPeerClient`](crate::client::HttpPeerClient) is the production
/// implementation.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetch the peer's history of `remote` within the requested window
    async fn history(
        &self,
        link: &RemoteLink,
        remote: &MetricId,
        request: &HistoryRequest,
    ) -> Result<Vec<Timestamped>>;

    /// Tell the peer that `remote` has new values, with an empty body
    async fn notify_push(&self, link: &RemoteLink, remote: &MetricId) -> Result<()>;
}
