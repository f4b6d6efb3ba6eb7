// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{catch_up, JobScheduler, PullSource};
use crate::error::{ExchangeError, Result};
use crate::metric::{Metric, MetricId};

/// Pull bindings of this process, keyed by local fingerprint.
///
/// A metric has at most one binding. The first registration stays in effect
/// and later ones are ignored.
#[derive(Default)]
pub struct SyncRegistry {
    bindings: RwLock<HashMap<MetricId, Arc<dyn PullSource>>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `local` to a pull source. Returns false if a binding already existed.
    pub fn register(&self, local: &MetricId, source: Arc<dyn PullSource>) -> bool {
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        if bindings.contains_key(local) {
            log::warn!(
                "{} already has a pull binding; ignoring {}",
                local,
                source.describe()
            );
            return false;
        }
        log::info!("Pull binding for {} -> {}", local, source.describe());
        bindings.insert(local.clone(), source);
        true
    }

    /// Drop the binding of `local`. Returns false if there was none.
    pub fn remove(&self, local: &MetricId) -> bool {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(local)
            .is_some()
    }

    pub fn binding(&self, local: &MetricId) -> Option<Arc<dyn PullSource>> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(local)
            .cloned()
    }

    pub fn is_bound(&self, local: &MetricId) -> bool {
        self.binding(local).is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedule a catch-up of `metric` from its binding.
    ///
    /// Fails with [`ExchangeError::PreconditionFailed`] when the metric does
    /// not accept remote updates or has no binding. Otherwise returns as soon
    /// as the job is queued.
    pub fn trigger(&self, metric: Arc<Metric>, scheduler: &dyn JobScheduler) -> Result<()> {
        if !metric.is_remotely_updatable() {
            return Err(ExchangeError::PreconditionFailed(format!(
                "{} does not accept remote updates",
                metric.id()
            )));
        }
        let source = self.binding(metric.id()).ok_or_else(|| {
            ExchangeError::PreconditionFailed(format!("{} has no pull binding", metric.id()))
        })?;

        scheduler.schedule(Box::pin(async move {
            catch_up(&metric, source.as_ref()).await.map(|_| ()).map_err(|e| {
                log::warn!(
                    "Catch-up of {} from {} aborted: {}",
                    metric.name(),
                    source.describe(),
                    e
                );
                e
            })
        }));
        Ok(())
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("bindings", &self.len())
            .finish()
    }
}
