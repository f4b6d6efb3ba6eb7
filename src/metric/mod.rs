// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! In-memory metric storage
//!
//! This module provides:
//! - Metric fingerprints ([`MetricId`]) and timestamped values
//! - An ordered, append-only history per metric with last-value lookup
//! - Change subscriptions fired on every accepted update
//! - A thread-safe collection of hosted metrics keyed by fingerprint

mod id;

pub use id::{earliest, latest, now_millis, MetricId, Timestamped};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};

use crate::codec::{HistoryRequest, MetricInfo};

/// Callback fired after a value is accepted into a metric
pub type UpdateCallback = Box<dyn Fn(&Timestamped) + Send + Sync>;

/// Subscription handle returned by [`Metric::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A single named time series
pub struct Metric {
    name: String,
    id: MetricId,
    description: String,
    unit: Option<String>,
    remotely_updatable: bool,
    /// Strictly increasing by timestamp
    history: RwLock<Vec<Timestamped>>,
    subscribers: RwLock<HashMap<SubscriptionId, Arc<UpdateCallback>>>,
    next_sub_id: AtomicU64,
}

impl Metric {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: MetricId::of(&name),
            name,
            description: String::new(),
            unit: None,
            remotely_updatable: false,
            history: RwLock::new(Vec::new()),
            subscribers: RwLock::new(HashMap::new()),
            next_sub_id: AtomicU64::new(0),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Allow peers to push values into this metric
    pub fn remotely_updatable(mut self, updatable: bool) -> Self {
        self.remotely_updatable = updatable;
        self
    }

    /// Internal identifier. Never sent to callers.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &MetricId {
        &self.id
    }

    pub fn is_remotely_updatable(&self) -> bool {
        self.remotely_updatable
    }

    /// Caller-facing descriptor
    pub fn info(&self) -> MetricInfo {
        MetricInfo {
            id: self.id.clone(),
            description: self.description.clone(),
            unit: self.unit.clone(),
            remotely_updatable: self.remotely_updatable,
        }
    }

    /// Record a value stamped with the current time.
    ///
    /// If the clock has not moved past the newest entry the stamp is bumped one
    /// millisecond beyond it, keeping history strictly increasing. Returns
    /// `None` and drops the value when the newest entry already sits at
    /// [`latest`], since no later stamp exists.
    pub fn record(&self, value: impl Into<serde_json::Value>) -> Option<Timestamped> {
        let entry = {
            let mut history = self.write_history();
            let mut timestamp = now_millis();
            if let Some(newest) = history.last() {
                if timestamp <= newest.timestamp {
                    let Some(bumped) = newest.timestamp.checked_add_signed(Duration::milliseconds(1))
                    else {
                        log::warn!("{}: newest value is stamped at the end of time, dropping", self.name);
                        return None;
                    };
                    timestamp = bumped;
                }
            }
            let entry = Timestamped::new(timestamp, value);
            history.push(entry.clone());
            entry
        };
        self.notify(&entry);
        Some(entry)
    }

    /// Append externally produced values.
    ///
    /// The batch is sorted first; values not strictly newer than the current
    /// newest entry are dropped, so replaying an overlapping batch is a no-op.
    /// Returns how many values were applied.
    pub fn append(&self, mut batch: Vec<Timestamped>) -> usize {
        batch.sort_by_key(|v| v.timestamp);
        let applied: Vec<Timestamped> = {
            let mut history = self.write_history();
            let mut applied = Vec::new();
            for value in batch {
                let newer = history
                    .last()
                    .map(|newest| value.timestamp > newest.timestamp)
                    .unwrap_or(true);
                if newer {
                    history.push(value.clone());
                    applied.push(value);
                }
            }
            applied
        };
        for value in &applied {
            self.notify(value);
        }
        applied.len()
    }

    /// Most recent value
    pub fn last(&self) -> Option<Timestamped> {
        self.read_history().last().cloned()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.read_history().last().map(|v| v.timestamp)
    }

    /// Values inside the requested window, in the requested direction
    pub fn history(&self, request: &HistoryRequest) -> Vec<Timestamped> {
        let limit = request.max_count.unwrap_or(usize::MAX);
        let history = self.read_history();
        let matching = history.iter().filter(|v| request.contains(v.timestamp));
        if request.is_reversed() {
            matching.rev().take(limit).cloned().collect()
        } else {
            matching.take(limit).cloned().collect()
        }
    }

    pub fn len(&self) -> usize {
        self.read_history().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a callback fired after every accepted value
    pub fn subscribe(&self, callback: UpdateCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_sub_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(callback));
        id
    }

    /// Remove a callback. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    fn notify(&self, value: &Timestamped) {
        // Snapshot first so a callback may unsubscribe without deadlocking.
        let callbacks: Vec<Arc<UpdateCallback>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    // A panic while holding the lock leaves the vector intact, so poisoning
    // is recovered from on both sides.
    fn read_history(&self) -> RwLockReadGuard<'_, Vec<Timestamped>> {
        self.history.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_history(&self) -> RwLockWriteGuard<'_, Vec<Timestamped>> {
        self.history.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("remotely_updatable", &self.remotely_updatable)
            .field("len", &self.len())
            .finish()
    }
}

/// Metrics hosted by this process, keyed by fingerprint
#[derive(Debug, Default)]
pub struct MetricCollection {
    metrics: RwLock<HashMap<MetricId, Arc<Metric>>>,
}

impl MetricCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host a metric. If one with the same identifier already exists it is
    /// kept and returned instead.
    pub fn register(&self, metric: Metric) -> Arc<Metric> {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = metrics.get(metric.id()) {
            log::debug!("Metric {} already registered", metric.name());
            return Arc::clone(existing);
        }
        let metric = Arc::new(metric);
        metrics.insert(metric.id().clone(), Arc::clone(&metric));
        metric
    }

    pub fn get(&self, id: &MetricId) -> Option<Arc<Metric>> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Metric>> {
        self.get(&MetricId::of(name))
    }

    /// Every hosted metric, ordered by internal identifier
    pub fn all(&self) -> Vec<Arc<Metric>> {
        let mut all: Vec<Arc<Metric>> = self
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Fingerprints of every hosted metric, in [`all`](Self::all) order
    pub fn ids(&self) -> Vec<MetricId> {
        self.all().iter().map(|m| m.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_record_is_strictly_increasing() {
        let metric = Metric::new("counter");
        let a = metric.record(1).unwrap();
        let b = metric.record(2).unwrap();
        let c = metric.record(3).unwrap();
        assert!(a.timestamp < b.timestamp);
        assert!(b.timestamp < c.timestamp);
        assert_eq!(metric.last().unwrap().value, serde_json::json!(3));
    }

    #[test]
    fn test_append_is_idempotent() {
        let metric = Metric::new("remote");
        let batch = vec![
            Timestamped::new(at(30), "c"),
            Timestamped::new(at(10), "a"),
            Timestamped::new(at(20), "b"),
        ];
        assert_eq!(metric.append(batch.clone()), 3);
        assert_eq!(metric.append(batch), 0);
        assert_eq!(metric.len(), 3);
        assert_eq!(metric.last_timestamp(), Some(at(30)));

        let overlapping = vec![Timestamped::new(at(30), "c"), Timestamped::new(at(40), "d")];
        assert_eq!(metric.append(overlapping), 1);
        assert_eq!(metric.len(), 4);
    }

    #[test]
    fn test_history_directions_and_limit() {
        let metric = Metric::new("series");
        metric.append((1..=5).map(|i| Timestamped::new(at(i * 10), i)).collect());

        let forward = metric.history(&HistoryRequest::between(at(20), at(50)));
        let values: Vec<_> = forward.iter().map(|v| v.value.clone()).collect();
        assert_eq!(values, vec![serde_json::json!(2), serde_json::json!(3), serde_json::json!(4)]);

        let backward = metric.history(&HistoryRequest::between(at(50), at(20)).with_max_count(2));
        let values: Vec<_> = backward.iter().map(|v| v.value.clone()).collect();
        assert_eq!(values, vec![serde_json::json!(5), serde_json::json!(4)]);

        assert_eq!(metric.history(&HistoryRequest::everything()).len(), 5);
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let metric = Metric::new("watched");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = metric.subscribe(Box::new(move |_: &Timestamped| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        metric.record("x");
        metric.append(vec![Timestamped::new(latest() - Duration::days(1), "y")]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(metric.unsubscribe(sub));
        assert!(!metric.unsubscribe(sub));
        metric.record("z");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejected_append_does_not_notify() {
        let metric = Metric::new("quiet");
        metric.append(vec![Timestamped::new(at(100), 1)]);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        metric.subscribe(Box::new(move |_: &Timestamped| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        metric.append(vec![Timestamped::new(at(50), 0)]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_collection_first_registration_wins() {
        let collection = MetricCollection::new();
        let first = collection.register(Metric::new("log").with_description("first"));
        let second = collection.register(Metric::new("log").with_description("second"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get(&MetricId::of("log")).unwrap().info().description, "first");
    }

    #[test]
    fn test_collection_ordered_by_name() {
        let collection = MetricCollection::new();
        collection.register(Metric::new("zeta"));
        collection.register(Metric::new("alpha"));
        collection.register(Metric::new("mid"));
        let names: Vec<_> = collection.all().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(collection.ids()[0], MetricId::of("alpha"));
    }

    #[test]
    fn test_record_after_value_at_end_of_time() {
        let metric = Metric::new("inbox");
        let json = serde_json::to_string(&Timestamped::new(latest(), "far")).unwrap();
        let far: Timestamped = serde_json::from_str(&json).unwrap();
        assert_eq!(metric.append(vec![far.clone()]), 1);

        assert!(metric.record("local").is_none());
        assert_eq!(metric.len(), 1);
        assert_eq!(metric.last(), Some(far));
    }

    #[test]
    fn test_reads_survive_poisoned_lock() {
        let metric = Arc::new(Metric::new("poisoned"));
        metric.append(vec![Timestamped::new(at(10), 1), Timestamped::new(at(20), 2)]);

        let holder = Arc::clone(&metric);
        let outcome = std::thread::spawn(move || {
            let _guard = holder.history.write().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(outcome.is_err());
        assert!(metric.history.is_poisoned());

        assert_eq!(metric.len(), 2);
        assert_eq!(metric.last_timestamp(), Some(at(20)));
        assert_eq!(metric.history(&HistoryRequest::everything()).len(), 2);
        assert!(metric.record(3).is_some());

        let collection = Arc::new(MetricCollection::new());
        collection.register(Metric::new("kept"));
        let holder = Arc::clone(&collection);
        let _ = std::thread::spawn(move || {
            let _guard = holder.metrics.write().unwrap();
            panic!("registry writer died");
        })
        .join();
        assert_eq!(collection.len(), 1);
        assert!(collection.get_by_name("kept").is_some());
        assert_eq!(collection.all().len(), 1);
    }
}
