// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Metric fingerprints and timestamped values

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ExchangeError;

/// Number of digest bytes kept in a fingerprint
const FINGERPRINT_BYTES: usize = 16;

/// Caller-visible fingerprint of a metric.
///
/// Derived from the metric's internal identifier as the first 16 bytes of its
/// SHA-256 digest, rendered as 32 lowercase hex characters. Raw identifiers
/// never cross the wire; peers and callers only ever see this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetricId(String);

impl MetricId {
    /// Fingerprint an internal metric identifier
    pub fn of(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        MetricId(hex::encode(&digest[..FINGERPRINT_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for MetricId {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == FINGERPRINT_BYTES * 2
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(MetricId(s.to_string()))
        } else {
            Err(ExchangeError::BadRequest(format!("Invalid metric fingerprint: {}", s)))
        }
    }
}

impl TryFrom<String> for MetricId {
    type Error = ExchangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MetricId> for String {
    fn from(id: MetricId) -> Self {
        id.0
    }
}

/// A single recorded value and the instant it was recorded at.
///
/// Timestamps travel as signed milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamped {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub value: serde_json::Value,
}

impl Timestamped {
    pub fn new(timestamp: DateTime<Utc>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }

    /// Value stamped with the current time at millisecond precision
    pub fn now(value: impl Into<serde_json::Value>) -> Self {
        Self::new(now_millis(), value)
    }
}

/// Earliest instant a history request or sync cursor can name
pub fn earliest() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

/// Latest instant a history request can name
pub fn latest() -> DateTime<Utc> {
    DateTime::<Utc>::MAX_UTC
}

/// Current time truncated to what survives the wire
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}
