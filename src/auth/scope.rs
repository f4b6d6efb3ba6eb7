// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

use serde::{Deserialize, Serialize};

/// A named capability a credential may hold.
///
/// Scopes form a flat set. No scope implies another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Enumerate metrics
    List,
    /// Read the most recent value
    Last,
    /// Read time-ranged values
    History,
    /// Accept remote-originated updates
    Push,
}

impl Scope {
    pub fn all() -> [Scope; 4] {
        [Scope::List, Scope::Last, Scope::History, Scope::Push]
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Scope::List => "list",
            Scope::Last => "last",
            Scope::History => "history",
            Scope::Push => "push",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "list" => Ok(Scope::List),
            "last" => Ok(Scope::Last),
            "history" => Ok(Scope::History),
            "push" => Ok(Scope::Push),
            _ => Err(format!("Unknown scope: {}", s)),
        }
    }
}
