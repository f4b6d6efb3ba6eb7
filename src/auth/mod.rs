// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Authorization Engine - Scoped Credential Access Control
//!
//! Every request is checked here before any metric data is touched.
//!
//! # Credential Model
//!
//! Three variants share the [`Credential`] capability:
//! - **SharedSecret**: a bare secret granting everything once matched
//! - **CredentialSet**: several credentials, the first granting member wins
//! - **ScopedToken**: a secret with named [`Scope`]s and a metric allow/deny filter
//!
//! # Decision
//!
//! 1. The presented secret must equal the credential's own secret. On
//!    mismatch nothing else is evaluated.
//! 2. Every scope the [`Operation`] requires must be held.
//! 3. Each candidate fingerprint is filtered independently. Multi-metric
//!    operations succeed with whatever subset passes, even an empty one.
//!    Single-metric operations fail when their target does not pass.
//!
//! All failures collapse into [`ExchangeError::AccessDenied`] so a caller can
//! not tell which check rejected it.
//!
//! # Configuration
//!
//! ```toml
//! [access]
//! secrets = ["sk-root"]
//!
//! [[access.tokens]]
//! token = "sk-dashboard"
//! permissions = ["list", "last"]
//! accessibleMetrics = ["cpu_usage_percent", "memory_used_bytes"]
//! inaccessibleMetrics = []
//! ```

mod credential;
mod scope;
mod token;

pub use credential::{Credential, CredentialSet, SharedSecret};
pub use scope::Scope;
pub use token::ScopedToken;

use subtle::ConstantTimeEq;

use crate::error::{ExchangeError, Result};
use crate::metric::MetricId;
use crate::route::Operation;

/// Exact secret comparison that does not stop at the first differing byte
pub(crate) fn secret_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Evaluate a presented secret against a credential.
///
/// Returns exactly the candidates the caller may access.
pub fn authorize(
    credential: &dyn Credential,
    presented: &str,
    operation: Operation,
    candidates: &[MetricId],
) -> Result<Vec<MetricId>> {
    let granted = match credential.authorize(presented, operation, candidates) {
        Ok(granted) => granted,
        Err(e) => {
            log::debug!("{} denied", operation);
            return Err(e);
        }
    };
    if operation.targets_one() && granted.is_empty() {
        log::debug!("{} denied: target filtered out", operation);
        return Err(ExchangeError::AccessDenied);
    }
    log::debug!(
        "{} granted for {} of {} metrics",
        operation,
        granted.len(),
        candidates.len()
    );
    Ok(granted)
}

/// Authorize a single-metric operation against its target
pub fn authorize_one(
    credential: &dyn Credential,
    presented: &str,
    operation: Operation,
    target: &MetricId,
) -> Result<()> {
    authorize(credential, presented, operation, std::slice::from_ref(target)).map(|_| ())
}
