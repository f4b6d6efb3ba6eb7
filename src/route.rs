// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Route contract: logical operations, the scopes they require, and the
//! paths they are served under.

use serde::{Deserialize, Serialize};

use crate::auth::Scope;
use crate::error::{ExchangeError, Result};
use crate::metric::MetricId;

/// Default path prefix grouping every route
pub const DEFAULT_PREFIX: &str = "metrics";

/// Header carrying the bare secret or token string
pub const CREDENTIAL_HEADER: &str = "x-access-token";

/// Route segments below the prefix
pub mod segments {
    pub const LIST: &str = "list";
    pub const EXTENDED: &str = "extended";
    pub const LAST: &str = "last";
    pub const ALL: &str = "all";
    pub const HISTORY: &str = "history";
    pub const PUSH: &str = "push";
}

/// Logical operations a caller can invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Enumerate metric descriptors
    ListMetrics,
    /// Most recent value of one metric
    LastValueOfOne,
    /// Most recent value of every metric
    LastValuesOfAll,
    /// Descriptor plus most recent value of every metric
    ExtendedList,
    /// Time-ranged values of one metric
    History,
    /// Remote-originated update of one metric
    Push,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::ListMetrics,
        Operation::LastValueOfOne,
        Operation::LastValuesOfAll,
        Operation::ExtendedList,
        Operation::History,
        Operation::Push,
    ];

    /// Scopes a credential must hold, all of them, to invoke this operation.
    ///
    /// The combined endpoints need both `list` and `last`, while a single last
    /// value needs only `last`.
    pub fn required_scopes(&self) -> &'static [Scope] {
        match self {
            Operation::ListMetrics => &[Scope::List],
            Operation::LastValueOfOne => &[Scope::Last],
            Operation::LastValuesOfAll | Operation::ExtendedList => &[Scope::Last, Scope::List],
            Operation::History => &[Scope::History],
            Operation::Push => &[Scope::Push],
        }
    }

    /// Whether the operation names exactly one target metric
    pub fn targets_one(&self) -> bool {
        matches!(
            self,
            Operation::LastValueOfOne | Operation::History | Operation::Push
        )
    }

    /// HTTP method the operation is served under
    pub fn method(&self) -> &'static str {
        match self {
            Operation::History | Operation::Push => "POST",
            _ => "GET",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::ListMetrics => "list",
            Operation::LastValueOfOne => "last",
            Operation::LastValuesOfAll => "last_all",
            Operation::ExtendedList => "list_extended",
            Operation::History => "history",
            Operation::Push => "push",
        };
        write!(f, "{}", name)
    }
}

/// An operation resolved from a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub operation: Operation,
    pub target: Option<MetricId>,
}

/// Builds and parses paths under a configurable prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    prefix: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl Routes {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Absolute path for an operation. Single-target operations need `target`.
    pub fn path(&self, operation: Operation, target: Option<&MetricId>) -> Result<String> {
        use segments::*;
        let tail = match (operation, target) {
            (Operation::ListMetrics, _) => LIST.to_string(),
            (Operation::ExtendedList, _) => format!("{}/{}", LIST, EXTENDED),
            (Operation::LastValuesOfAll, _) => format!("{}/{}", LAST, ALL),
            (Operation::LastValueOfOne, Some(id)) => format!("{}/{}", LAST, id),
            (Operation::History, Some(id)) => format!("{}/{}", HISTORY, id),
            (Operation::Push, Some(id)) => format!("{}/{}", PUSH, id),
            (op, None) => {
                return Err(ExchangeError::BadRequest(format!(
                    "Operation {} requires a metric fingerprint",
                    op
                )))
            }
        };
        if self.prefix.is_empty() {
            Ok(format!("/{}", tail))
        } else {
            Ok(format!("/{}/{}", self.prefix, tail))
        }
    }

    /// Resolve a request path.
    ///
    /// `Ok(None)` means the path is not one of ours. A known operation with a
    /// missing or malformed fingerprint is a bad request.
    pub fn resolve(&self, path: &str) -> Result<Option<Route>> {
        use segments::*;
        let path = path.split('?').next().unwrap_or_default().trim_matches('/');
        let rest = if self.prefix.is_empty() {
            path
        } else {
            match path.strip_prefix(self.prefix.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
                _ => return Ok(None),
            }
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let route = match parts.as_slice() {
            [LIST] => Route {
                operation: Operation::ListMetrics,
                target: None,
            },
            [LIST, EXTENDED] => Route {
                operation: Operation::ExtendedList,
                target: None,
            },
            [LAST, ALL] => Route {
                operation: Operation::LastValuesOfAll,
                target: None,
            },
            [LAST, id] => Route {
                operation: Operation::LastValueOfOne,
                target: Some(id.parse()?),
            },
            [HISTORY, id] => Route {
                operation: Operation::History,
                target: Some(id.parse()?),
            },
            [PUSH, id] => Route {
                operation: Operation::Push,
                target: Some(id.parse()?),
            },
            [LAST] | [HISTORY] | [PUSH] => {
                return Err(ExchangeError::BadRequest(
                    "Missing metric fingerprint".to_string(),
                ))
            }
            _ => return Ok(None),
        };
        Ok(Some(route))
    }
}
