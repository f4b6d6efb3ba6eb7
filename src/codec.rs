// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Wire payloads exchanged between callers, peers and the dispatch layer
//!
//! Bodies are JSON. Encode/decode failures are logged here with full detail
//! and converted to [`ExchangeError::FailedToEncode`] /
//! [`ExchangeError::FailedToDecode`], whose public message carries none of it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, Result};
use crate::metric::{earliest, latest, MetricId, Timestamped};

/// Time-ranged history query.
///
/// `start <= end` walks forward over `start <= t < end`; `start > end` walks
/// backward over `end < t <= start`, newest first. `max_count` keeps that many
/// values from the starting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,
}

impl HistoryRequest {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            max_count: None,
        }
    }

    /// Every value, oldest first
    pub fn everything() -> Self {
        Self::between(earliest(), latest())
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn is_reversed(&self) -> bool {
        self.start > self.end
    }

    /// Whether a timestamp falls inside the requested window
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if self.is_reversed() {
            self.end < timestamp && timestamp <= self.start
        } else {
            self.start <= timestamp && timestamp < self.end
        }
    }
}

/// Caller-facing metric descriptor. Never carries the raw identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricInfo {
    pub id: MetricId,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub remotely_updatable: bool,
}

/// Descriptor plus most recent value, served by the extended list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedMetricInfo {
    #[serde(flatten)]
    pub info: MetricInfo,
    pub last: Option<Timestamped>,
}

/// Serialize a payload to a JSON body
pub fn encode<T: Serialize>(payload: &T) -> Result<String> {
    serde_json::to_string(payload).map_err(|e| {
        log::error!("Failed to encode {}: {}", std::any::type_name::<T>(), e);
        ExchangeError::FailedToEncode(e.to_string())
    })
}

/// Deserialize a JSON body
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        log::warn!("Failed to decode {}: {}", std::any::type_name::<T>(), e);
        ExchangeError::FailedToDecode(e.to_string())
    })
}

/// Deserialize a body that may legitimately be absent or blank
pub fn decode_optional<T: DeserializeOwned>(body: Option<&str>) -> Result<Option<T>> {
    match body.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => decode(text).map(Some),
    }
}
