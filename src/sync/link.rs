// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::error::Result;
use crate::metric::MetricId;
use crate::route::{Operation, Routes, CREDENTIAL_HEADER};

/// Default timeout for requests sent to a peer
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// How credentials are attached to requests this instance sends a peer
#[derive(Clone, PartialEq, Eq)]
pub struct PeerAuth {
    token: Option<String>,
    timeout: Duration,
}

impl Default for PeerAuth {
    fn default() -> Self {
        Self {
            token: None,
            timeout: DEFAULT_PEER_TIMEOUT,
        }
    }
}

impl PeerAuth {
    /// Send no credential
    pub fn none() -> Self {
        Self::default()
    }

    /// Send `token` in the credential header
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The credential presented to the peer, if any
    pub fn credential(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Decorate an outgoing request
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(self.timeout);
        match &self.token {
            Some(token) => request.header(CREDENTIAL_HEADER, token),
            None => request,
        }
    }
}

impl std::fmt::Debug for PeerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerAuth")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A peer instance.
///
/// Identity is the base address alone: two links to the same address are the
/// same link whatever credential they carry.
#[derive(Debug, Clone)]
pub struct RemoteLink {
    base_url: String,
    auth: PeerAuth,
    routes: Routes,
}

impl RemoteLink {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            auth: PeerAuth::default(),
            routes: Routes::default(),
        }
    }

    pub fn with_auth(mut self, auth: PeerAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Path prefix the peer serves its routes under
    pub fn with_routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &PeerAuth {
        &self.auth
    }

    /// Full URL of an operation on this peer
    pub fn url(&self, operation: Operation, target: Option<&MetricId>) -> Result<String> {
        Ok(format!("{}{}", self.base_url, self.routes.path(operation, target)?))
    }
}

impl PartialEq for RemoteLink {
    fn eq(&self, other: &Self) -> bool {
        self.base_url == other.base_url
    }
}

impl Eq for RemoteLink {}

impl Hash for RemoteLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base_url.hash(state);
    }
}

impl std::fmt::Display for RemoteLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_url)
    }
}
