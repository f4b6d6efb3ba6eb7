// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Metrics API
//!
//! Transport-independent entry points for the six remote operations. Every
//! call authorizes first and only then reads metric data, so an unauthorized
//! caller learns nothing about which fingerprints exist.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{self, Credential};
use crate::codec::{ExtendedMetricInfo, HistoryRequest, MetricInfo};
use crate::error::{ExchangeError, Result};
use crate::metric::{Metric, MetricCollection, MetricId, Timestamped};
use crate::route::Operation;
use crate::sync::{JobScheduler, SyncRegistry};

/// Request context for API calls
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Secret presented by the caller
    pub token: String,
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// Client address
    pub client_ip: Option<String>,
    /// When the request arrived
    pub timestamp: Instant,
}

impl RequestContext {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            request_id: None,
            client_ip: None,
            timestamp: Instant::now(),
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }
}

/// The metrics API hosted by this process
pub struct MetricsApi {
    metrics: Arc<MetricCollection>,
    credential: Arc<dyn Credential>,
    sync: Arc<SyncRegistry>,
    scheduler: Arc<dyn JobScheduler>,
}

impl MetricsApi {
    pub fn new(
        metrics: Arc<MetricCollection>,
        credential: Arc<dyn Credential>,
        sync: Arc<SyncRegistry>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        Self {
            metrics,
            credential,
            sync,
            scheduler,
        }
    }

    /// Hosted metrics, for recording local values
    pub fn metrics(&self) -> &Arc<MetricCollection> {
        &self.metrics
    }

    pub fn sync_registry(&self) -> &Arc<SyncRegistry> {
        &self.sync
    }

    /// Descriptors of every metric the caller may see
    pub fn list(&self, ctx: &RequestContext) -> Result<Vec<MetricInfo>> {
        let granted = self.granted(ctx, Operation::ListMetrics)?;
        Ok(granted.iter().map(|m| m.info()).collect())
    }

    /// Latest value of every accessible metric. Metrics with no value are left out.
    pub fn last_all(&self, ctx: &RequestContext) -> Result<BTreeMap<MetricId, Timestamped>> {
        let granted = self.granted(ctx, Operation::LastValuesOfAll)?;
        Ok(granted
            .iter()
            .filter_map(|m| m.last().map(|value| (m.id().clone(), value)))
            .collect())
    }

    /// Descriptor plus latest value of every accessible metric
    pub fn extended_list(
        &self,
        ctx: &RequestContext,
    ) -> Result<BTreeMap<MetricId, ExtendedMetricInfo>> {
        let granted = self.granted(ctx, Operation::ExtendedList)?;
        Ok(granted
            .iter()
            .map(|m| {
                let entry = ExtendedMetricInfo {
                    info: m.info(),
                    last: m.last(),
                };
                (m.id().clone(), entry)
            })
            .collect())
    }

    /// Latest value of one metric
    pub fn last(&self, ctx: &RequestContext, id: &MetricId) -> Result<Timestamped> {
        let metric = self.target(ctx, Operation::LastValueOfOne, id)?;
        metric
            .last()
            .ok_or_else(|| ExchangeError::NoValueAvailable(id.clone()))
    }

    /// Values of one metric inside the requested window
    pub fn history(
        &self,
        ctx: &RequestContext,
        id: &MetricId,
        request: &HistoryRequest,
    ) -> Result<Vec<Timestamped>> {
        let metric = self.target(ctx, Operation::History, id)?;
        let values = metric.history(request);
        log::debug!(
            "History of {}: {} values in {:?}",
            id,
            values.len(),
            ctx.timestamp.elapsed()
        );
        Ok(values)
    }

    /// Inbound push.
    ///
    /// With values, they are appended directly. Without, the metric's pull
    /// binding is triggered and the call returns before the catch-up runs.
    pub fn push(
        &self,
        ctx: &RequestContext,
        id: &MetricId,
        values: Option<Vec<Timestamped>>,
    ) -> Result<()> {
        let metric = self.target(ctx, Operation::Push, id)?;
        if !metric.is_remotely_updatable() {
            return Err(ExchangeError::PreconditionFailed(format!(
                "{} does not accept remote updates",
                id
            )));
        }

        match values {
            Some(values) if !values.is_empty() => {
                let offered = values.len();
                let applied = metric.append(values);
                log::debug!("Push into {}: {} of {} values applied", id, applied, offered);
                Ok(())
            }
            _ => self.sync.trigger(metric, self.scheduler.as_ref()),
        }
    }

    /// Check the caller may run `operation` on `id` without touching metric
    /// data. Transports call this before decoding a request body.
    pub fn authorize(&self, ctx: &RequestContext, operation: Operation, id: &MetricId) -> Result<()> {
        auth::authorize_one(self.credential.as_ref(), &ctx.token, operation, id)
    }

    /// Trigger a catch-up locally, without a credential
    pub fn trigger_sync(&self, id: &MetricId) -> Result<()> {
        let metric = self
            .metrics
            .get(id)
            .ok_or_else(|| ExchangeError::UnknownMetric(id.clone()))?;
        self.sync.trigger(metric, self.scheduler.as_ref())
    }

    fn target(&self, ctx: &RequestContext, operation: Operation, id: &MetricId) -> Result<Arc<Metric>> {
        auth::authorize_one(self.credential.as_ref(), &ctx.token, operation, id)?;
        self.metrics
            .get(id)
            .ok_or_else(|| ExchangeError::UnknownMetric(id.clone()))
    }

    fn granted(&self, ctx: &RequestContext, operation: Operation) -> Result<Vec<Arc<Metric>>> {
        let all = self.metrics.all();
        let candidates: Vec<MetricId> = all.iter().map(|m| m.id().clone()).collect();
        let granted: HashSet<MetricId> =
            auth::authorize(self.credential.as_ref(), &ctx.token, operation, &candidates)?
                .into_iter()
                .collect();
        Ok(all
            .into_iter()
            .filter(|m| granted.contains(m.id()))
            .collect())
    }
}

impl std::fmt::Debug for MetricsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsApi")
            .field("metrics", &self.metrics.len())
            .field("sync", &self.sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialSet, Scope, ScopedToken, SharedSecret};
    use crate::metric::{earliest, latest};
    use crate::sync::{PullSource, QueueScheduler};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        api: MetricsApi,
        scheduler: Arc<QueueScheduler>,
    }

    fn fixture() -> Fixture {
        let metrics = Arc::new(MetricCollection::new());
        let log = metrics.register(Metric::new("log").with_description("application log"));
        log.record("test");
        metrics.register(Metric::new("other"));
        metrics.register(Metric::new("inbox").remotely_updatable(true));

        let credential = CredentialSet::new()
            .with(SharedSecret::new("root"))
            .with(ScopedToken::new("last-log", [Scope::Last]).with_accessible(["log"]))
            .with(ScopedToken::new("lister", [Scope::List]).with_inaccessible(["other"]));

        let scheduler = Arc::new(QueueScheduler::new());
        let api = MetricsApi::new(
            metrics,
            Arc::new(credential),
            Arc::new(SyncRegistry::new()),
            Arc::clone(&scheduler) as Arc<dyn JobScheduler>,
        );
        Fixture { api, scheduler }
    }

    fn ctx(token: &str) -> RequestContext {
        RequestContext::new(token)
    }

    #[test]
    fn test_last_value() {
        let f = fixture();
        let value = f.api.last(&ctx("root"), &MetricId::of("log")).unwrap();
        assert_eq!(value.value, serde_json::json!("test"));

        assert!(matches!(
            f.api.last(&ctx("wrong"), &MetricId::of("log")),
            Err(ExchangeError::AccessDenied)
        ));
        assert!(matches!(
            f.api.last(&ctx("root"), &MetricId::of("other")),
            Err(ExchangeError::NoValueAvailable(_))
        ));
    }

    #[test]
    fn test_scoped_token_restricted_to_log() {
        let f = fixture();
        assert!(f.api.last(&ctx("last-log"), &MetricId::of("log")).is_ok());
        assert!(matches!(
            f.api.last(&ctx("last-log"), &MetricId::of("other")),
            Err(ExchangeError::AccessDenied)
        ));
        assert!(f.api.list(&ctx("last-log")).is_err());
    }

    #[test]
    fn test_authorization_precedes_existence() {
        let f = fixture();
        let ghost = MetricId::of("ghost");
        assert!(matches!(
            f.api.last(&ctx("wrong"), &ghost),
            Err(ExchangeError::AccessDenied)
        ));
        assert!(matches!(
            f.api.last(&ctx("last-log"), &ghost),
            Err(ExchangeError::AccessDenied)
        ));
        assert!(matches!(
            f.api.last(&ctx("root"), &ghost),
            Err(ExchangeError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_list_filters_and_hides_names() {
        let f = fixture();
        let listed = f.api.list(&ctx("lister")).unwrap();
        let ids: Vec<MetricId> = listed.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&MetricId::of("log")));
        assert!(!ids.contains(&MetricId::of("other")));

        let body = serde_json::to_string(&listed).unwrap();
        assert!(!body.contains("\"log\""));
    }

    #[test]
    fn test_last_all_skips_metrics_without_values() {
        let f = fixture();
        let all = f.api.last_all(&ctx("root")).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key(&MetricId::of("log")));
    }

    #[test]
    fn test_extended_list_includes_empty_metrics() {
        let f = fixture();
        let all = f.api.extended_list(&ctx("root")).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[&MetricId::of("other")].last.is_none());
        assert_eq!(all[&MetricId::of("log")].info.description, "application log");
    }

    #[test]
    fn test_history_full_range() {
        let f = fixture();
        let request = HistoryRequest::between(earliest(), latest());
        let values = f.api.history(&ctx("root"), &MetricId::of("log"), &request).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, serde_json::json!("test"));
    }

    #[test]
    fn test_push_requires_remote_updates() {
        let f = fixture();
        let values = vec![Timestamped::now(1)];
        assert!(matches!(
            f.api.push(&ctx("root"), &MetricId::of("log"), Some(values)),
            Err(ExchangeError::PreconditionFailed(_))
        ));
        assert!(matches!(
            f.api.push(&ctx("lister"), &MetricId::of("inbox"), None),
            Err(ExchangeError::AccessDenied)
        ));
    }

    #[test]
    fn test_direct_push_appends() {
        let f = fixture();
        let inbox = MetricId::of("inbox");
        let at = |ms| Utc.timestamp_millis_opt(ms).unwrap();
        let values = vec![Timestamped::new(at(2000), "b"), Timestamped::new(at(1000), "a")];
        f.api.push(&ctx("root"), &inbox, Some(values)).unwrap();

        let stored = f
            .api
            .history(&ctx("root"), &inbox, &HistoryRequest::everything())
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].value, serde_json::json!("a"));
        assert_eq!(f.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_notify_push_triggers_binding() {
        struct OneValue;

        #[async_trait]
        impl PullSource for OneValue {
            async fn fetch(&self, request: &HistoryRequest) -> Result<Vec<Timestamped>> {
                let value = Timestamped::new(Utc.timestamp_millis_opt(5000).unwrap(), "remote");
                Ok(if request.contains(value.timestamp) {
                    vec![value]
                } else {
                    Vec::new()
                })
            }

            fn describe(&self) -> String {
                "one".into()
            }
        }

        let f = fixture();
        let inbox = MetricId::of("inbox");
        assert!(matches!(
            f.api.push(&ctx("root"), &inbox, None),
            Err(ExchangeError::PreconditionFailed(_))
        ));

        f.api.sync_registry().register(&inbox, Arc::new(OneValue));
        f.api.push(&ctx("root"), &inbox, Some(Vec::new())).unwrap();
        assert_eq!(f.scheduler.pending(), 1);

        f.scheduler.run_pending().await;
        let last = f.api.last(&ctx("root"), &inbox).unwrap();
        assert_eq!(last.value, serde_json::json!("remote"));
    }

    #[test]
    fn test_trigger_sync_unknown_metric() {
        let f = fixture();
        assert!(matches!(
            f.api.trigger_sync(&MetricId::of("ghost")),
            Err(ExchangeError::UnknownMetric(_))
        ));
    }
}
