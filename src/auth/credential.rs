// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

use std::sync::Arc;

use crate::error::{ExchangeError, Result};
use crate::metric::MetricId;
use crate::route::Operation;

/// Capability shared by every credential variant.
///
/// Given the secret a caller presented, the requested operation, and the
/// candidate fingerprints, return the subset the caller may see or fail with
/// [`ExchangeError::AccessDenied`].
pub trait Credential: Send + Sync {
    fn authorize(
        &self,
        presented: &str,
        operation: Operation,
        candidates: &[MetricId],
    ) -> Result<Vec<MetricId>>;
}

impl<C: Credential + ?Sized> Credential for Arc<C> {
    fn authorize(
        &self,
        presented: &str,
        operation: Operation,
        candidates: &[MetricId],
    ) -> Result<Vec<MetricId>> {
        (**self).authorize(presented, operation, candidates)
    }
}

impl<C: Credential + ?Sized> Credential for Box<C> {
    fn authorize(
        &self,
        presented: &str,
        operation: Operation,
        candidates: &[MetricId],
    ) -> Result<Vec<MetricId>> {
        (**self).authorize(presented, operation, candidates)
    }
}

/// Bare shared secret. Grants every operation over every metric once matched.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        SharedSecret(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl Credential for SharedSecret {
    fn authorize(
        &self,
        presented: &str,
        _operation: Operation,
        candidates: &[MetricId],
    ) -> Result<Vec<MetricId>> {
        if super::secret_matches(&self.0, presented) {
            Ok(candidates.to_vec())
        } else {
            Err(ExchangeError::AccessDenied)
        }
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Several credentials accepted side by side.
///
/// The first member that grants the request decides the result, using its own
/// rule. An empty set denies everything.
#[derive(Clone, Default)]
pub struct CredentialSet {
    members: Vec<Arc<dyn Credential>>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, member: impl Credential + 'static) -> Self {
        self.push(member);
        self
    }

    pub fn push(&mut self, member: impl Credential + 'static) {
        self.members.push(Arc::new(member));
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Credential for CredentialSet {
    fn authorize(
        &self,
        presented: &str,
        operation: Operation,
        candidates: &[MetricId],
    ) -> Result<Vec<MetricId>> {
        self.members
            .iter()
            .find_map(|member| member.authorize(presented, operation, candidates).ok())
            .ok_or(ExchangeError::AccessDenied)
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("members", &self.members.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Scope, ScopedToken};

    fn ids(names: &[&str]) -> Vec<MetricId> {
        names.iter().map(|n| MetricId::of(n)).collect()
    }

    #[test]
    fn test_shared_secret_grants_everything() {
        let secret = SharedSecret::new("hunter2");
        let candidates = ids(&["a", "b"]);
        for op in Operation::ALL {
            assert_eq!(secret.authorize("hunter2", op, &candidates).unwrap(), candidates);
        }
        assert!(matches!(
            secret.authorize("hunter3", Operation::ListMetrics, &candidates),
            Err(ExchangeError::AccessDenied)
        ));
    }

    #[test]
    fn test_set_uses_matching_member_rule() {
        let set = CredentialSet::new()
            .with(SharedSecret::new("root"))
            .with(ScopedToken::new("reader", [Scope::List]).with_accessible(["a"]));
        let candidates = ids(&["a", "b"]);

        assert_eq!(
            set.authorize("root", Operation::ListMetrics, &candidates).unwrap(),
            candidates
        );
        assert_eq!(
            set.authorize("reader", Operation::ListMetrics, &candidates).unwrap(),
            ids(&["a"])
        );
        assert!(set.authorize("reader", Operation::History, &ids(&["a"])).is_err());
        assert!(set.authorize("nobody", Operation::ListMetrics, &candidates).is_err());
    }

    #[test]
    fn test_empty_set_denies() {
        let set = CredentialSet::new();
        assert!(set.is_empty());
        assert!(set.authorize("", Operation::ListMetrics, &[]).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        assert!(!format!("{:?}", SharedSecret::new("hunter2")).contains("hunter2"));
    }
}
