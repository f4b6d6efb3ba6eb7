// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Scoped tokens
//!
//! A token bundles a secret, a set of granted [`Scope`]s, and an allow/deny
//! filter over raw metric identifiers. The filter is kept in two forms: the
//! raw identifiers (what the token is persisted and exchanged as) and their
//! fingerprints (what requests are checked against).
//!
//! Persisted shape, shared with existing peers:
//!
//! ```json
//! {
//!   "token": "sk-reader",
//!   "permissions": ["last", "list"],
//!   "accessibleMetrics": ["cpu_usage_percent"],
//!   "inaccessibleMetrics": []
//! }
//! ```

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::{Credential, Scope};
use crate::error::{ExchangeError, Result};
use crate::metric::MetricId;
use crate::route::Operation;

/// Credential with named scopes and a metric allow/deny filter
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TokenRepr", into = "TokenRepr")]
pub struct ScopedToken {
    token: String,
    permissions: BTreeSet<Scope>,
    accessible: BTreeSet<String>,
    inaccessible: BTreeSet<String>,
    accessible_ids: HashSet<MetricId>,
    inaccessible_ids: HashSet<MetricId>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRepr {
    token: String,
    #[serde(default)]
    permissions: BTreeSet<Scope>,
    #[serde(default)]
    accessible_metrics: BTreeSet<String>,
    #[serde(default)]
    inaccessible_metrics: BTreeSet<String>,
}

impl From<TokenRepr> for ScopedToken {
    fn from(repr: TokenRepr) -> Self {
        ScopedToken::new(repr.token, repr.permissions)
            .with_accessible(repr.accessible_metrics)
            .with_inaccessible(repr.inaccessible_metrics)
    }
}

impl From<ScopedToken> for TokenRepr {
    fn from(token: ScopedToken) -> Self {
        TokenRepr {
            token: token.token,
            permissions: token.permissions,
            accessible_metrics: token.accessible,
            inaccessible_metrics: token.inaccessible,
        }
    }
}

impl ScopedToken {
    /// Token granting `permissions` over every metric
    pub fn new(token: impl Into<String>, permissions: impl IntoIterator<Item = Scope>) -> Self {
        Self {
            token: token.into(),
            permissions: permissions.into_iter().collect(),
            accessible: BTreeSet::new(),
            inaccessible: BTreeSet::new(),
            accessible_ids: HashSet::new(),
            inaccessible_ids: HashSet::new(),
        }
    }

    /// Token holding every scope over every metric
    pub fn full(token: impl Into<String>) -> Self {
        Self::new(token, Scope::all())
    }

    /// Restrict access to these metrics. Identifiers already denied are dropped.
    pub fn with_accessible<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accessible.extend(metrics.into_iter().map(Into::into));
        self.normalize();
        self
    }

    /// Deny these metrics. Denial overrides the accessible set.
    pub fn with_inaccessible<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inaccessible.extend(metrics.into_iter().map(Into::into));
        self.normalize();
        self
    }

    fn normalize(&mut self) {
        let denied = &self.inaccessible;
        self.accessible.retain(|name| !denied.contains(name));
        self.accessible_ids = self.accessible.iter().map(|n| MetricId::of(n)).collect();
        self.inaccessible_ids = self.inaccessible.iter().map(|n| MetricId::of(n)).collect();
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn permissions(&self) -> &BTreeSet<Scope> {
        &self.permissions
    }

    /// Effective accessible set, after denial has been applied
    pub fn accessible_metrics(&self) -> &BTreeSet<String> {
        &self.accessible
    }

    pub fn inaccessible_metrics(&self) -> &BTreeSet<String> {
        &self.inaccessible
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.permissions.contains(&scope)
    }

    /// Whether every scope `operation` requires is held
    pub fn permits(&self, operation: Operation) -> bool {
        operation
            .required_scopes()
            .iter()
            .all(|scope| self.permissions.contains(scope))
    }

    /// Allow/deny filter over a fingerprint.
    ///
    /// Granted iff the accessible set is empty or contains the metric, and the
    /// inaccessible set does not.
    pub fn allows(&self, id: &MetricId) -> bool {
        (self.accessible_ids.is_empty() || self.accessible_ids.contains(id))
            && !self.inaccessible_ids.contains(id)
    }

    /// Allow/deny filter over a raw identifier
    pub fn allows_name(&self, name: &str) -> bool {
        self.allows(&MetricId::of(name))
    }
}

impl Credential for ScopedToken {
    fn authorize(
        &self,
        presented: &str,
        operation: Operation,
        candidates: &[MetricId],
    ) -> Result<Vec<MetricId>> {
        if !super::secret_matches(&self.token, presented) {
            return Err(ExchangeError::AccessDenied);
        }
        if !self.permits(operation) {
            return Err(ExchangeError::AccessDenied);
        }
        let granted: Vec<MetricId> = candidates
            .iter()
            .filter(|id| self.allows(id))
            .cloned()
            .collect();
        if operation.targets_one() && granted.is_empty() {
            return Err(ExchangeError::AccessDenied);
        }
        Ok(granted)
    }
}

impl std::fmt::Debug for ScopedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedToken")
            .field("token", &"<redacted>")
            .field("permissions", &self.permissions)
            .field("accessible", &self.accessible)
            .field("inaccessible", &self.inaccessible)
            .finish()
    }
}
