// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Exchange configuration
//!
//! A single TOML file describes the listener, the accepted credentials, the
//! hosted metrics, the peers and the synchronization wiring between them.
//! [`ExchangeConfig::build`] turns it into a running [`Exchange`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::MetricsApi;
use crate::auth::{CredentialSet, ScopedToken, SharedSecret};
use crate::client::HttpPeerClient;
use crate::error::{ExchangeError, Result};
use crate::http_server::HttpServerConfig;
use crate::metric::{Metric, MetricCollection, SubscriptionId};
use crate::route::{Routes, DEFAULT_PREFIX};
use crate::server::{RequestHandler, ServerConfig};
use crate::sync::{
    JobScheduler, PeerAuth, PeerClient, RemoteLink, SyncRegistry, Synchronizer, TokioScheduler,
};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn as_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Credentials accepted by this instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Bare shared secrets, each granting everything
    pub secrets: Vec<String>,
    /// Scoped tokens in their wire shape
    pub tokens: Vec<ScopedToken>,
}

impl AccessConfig {
    /// Combine every configured credential into one set
    pub fn credential(&self) -> CredentialSet {
        let mut set = CredentialSet::new();
        for secret in &self.secrets {
            set.push(SharedSecret::new(secret.clone()));
        }
        for token in &self.tokens {
            set.push(token.clone());
        }
        set
    }
}

/// A hosted metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub remotely_updatable: bool,
}

impl MetricConfig {
    pub fn to_metric(&self) -> Metric {
        let metric = Metric::new(self.name.clone())
            .with_description(self.description.clone())
            .remotely_updatable(self.remotely_updatable);
        match &self.unit {
            Some(unit) => metric.with_unit(unit.clone()),
            None => metric,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// A peer instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    pub base_url: String,
    /// Credential presented to the peer
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prefix the peer serves its routes under
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl PeerConfig {
    pub fn link(&self) -> RemoteLink {
        let auth = match &self.token {
            Some(token) => PeerAuth::token(token.clone()),
            None => PeerAuth::none(),
        };
        RemoteLink::new(&self.base_url)
            .with_auth(auth.with_timeout(Duration::from_secs(self.timeout_secs)))
            .with_routes(Routes::new(&self.prefix))
    }
}

/// Direction of a synchronization entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Catch up from the peer when triggered
    #[default]
    Pull,
    /// Notify the peer of every local update
    Push,
    Both,
}

impl SyncDirection {
    pub fn pulls(&self) -> bool {
        matches!(self, SyncDirection::Pull | SyncDirection::Both)
    }

    pub fn pushes(&self) -> bool {
        matches!(self, SyncDirection::Push | SyncDirection::Both)
    }
}

/// Wiring between a local metric and a peer's metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local metric name
    pub metric: String,
    /// Peer name from `[[peers]]`
    pub peer: String,
    /// Metric name on the peer, defaults to the local name
    #[serde(default)]
    pub remote_metric: Option<String>,
    #[serde(default)]
    pub direction: SyncDirection,
}

impl SyncConfig {
    pub fn remote_name(&self) -> &str {
        self.remote_metric.as_deref().unwrap_or(&self.metric)
    }
}

/// Complete exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub bind_address: String,
    pub port: u16,
    /// Path prefix the metric routes are served under
    pub prefix: String,
    pub request_logging: bool,
    pub max_body_size: usize,
    pub request_timeout_secs: u64,
    pub cors_enabled: bool,
    pub log_level: LogLevel,
    pub access: AccessConfig,
    pub metrics: Vec<MetricConfig>,
    pub peers: Vec<PeerConfig>,
    pub sync: Vec<SyncConfig>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        let server = HttpServerConfig::default();
        Self {
            bind_address: server.bind_address,
            port: server.port,
            prefix: DEFAULT_PREFIX.to_string(),
            request_logging: true,
            max_body_size: server.max_body_size,
            request_timeout_secs: server.request_timeout_secs,
            cors_enabled: server.cors_enabled,
            log_level: LogLevel::default(),
            access: AccessConfig::default(),
            metrics: Vec::new(),
            peers: Vec::new(),
            sync: Vec::new(),
        }
    }
}

/// Everything a configured instance runs with
pub struct Exchange {
    pub metrics: Arc<MetricCollection>,
    pub api: Arc<MetricsApi>,
    pub handler: Arc<RequestHandler>,
    pub synchronizer: Synchronizer,
    /// Push notifier subscriptions, one per pushing sync entry
    pub subscriptions: Vec<SubscriptionId>,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("metrics", &self.metrics.len())
            .field("synchronizer", &self.synchronizer)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl ExchangeConfig {
    /// Load from TOML file
    pub fn from_toml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExchangeError::Config(format!("Cannot read {}: {}", path, e)))?;
        Self::from_toml(&content)
    }

    /// Parse from TOML string and validate
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ExchangeError::Config(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Listener settings
    pub fn server(&self) -> HttpServerConfig {
        HttpServerConfig {
            bind_address: self.bind_address.clone(),
            port: self.port,
            max_body_size: self.max_body_size,
            request_timeout_secs: self.request_timeout_secs,
            cors_enabled: self.cors_enabled,
            ..HttpServerConfig::default()
        }
    }

    /// Request handler settings
    pub fn handler(&self) -> ServerConfig {
        ServerConfig {
            prefix: self.prefix.clone(),
            request_logging: self.request_logging,
        }
    }

    /// Check cross references between sections
    pub fn validate(&self) -> Result<()> {
        let mut metrics: HashMap<&str, &MetricConfig> = HashMap::new();
        for metric in &self.metrics {
            if metrics.insert(metric.name.as_str(), metric).is_some() {
                return Err(ExchangeError::Config(format!(
                    "Metric '{}' is declared twice",
                    metric.name
                )));
            }
        }

        let mut peers = HashSet::new();
        for peer in &self.peers {
            if !peers.insert(peer.name.as_str()) {
                return Err(ExchangeError::Config(format!(
                    "Peer '{}' is declared twice",
                    peer.name
                )));
            }
            if !peer.base_url.starts_with("http://") && !peer.base_url.starts_with("https://") {
                return Err(ExchangeError::Config(format!(
                    "Peer '{}' has a non-HTTP base_url: {}",
                    peer.name, peer.base_url
                )));
            }
        }

        for entry in &self.sync {
            let metric = metrics.get(entry.metric.as_str()).ok_or_else(|| {
                ExchangeError::Config(format!("Sync entry names unknown metric '{}'", entry.metric))
            })?;
            if !peers.contains(entry.peer.as_str()) {
                return Err(ExchangeError::Config(format!(
                    "Sync entry names unknown peer '{}'",
                    entry.peer
                )));
            }
            if entry.direction.pulls() && !metric.remotely_updatable {
                return Err(ExchangeError::Config(format!(
                    "Metric '{}' pulls from '{}' but is not remotely_updatable",
                    entry.metric, entry.peer
                )));
            }
        }
        Ok(())
    }

    /// Assemble an exchange on the current tokio runtime
    pub fn build(&self) -> Result<Exchange> {
        let client: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new()?);
        let scheduler: Arc<dyn JobScheduler> = Arc::new(TokioScheduler::current()?);
        self.build_with(client, scheduler)
    }

    /// Assemble an exchange around the given peer client and scheduler
    pub fn build_with(
        &self,
        client: Arc<dyn PeerClient>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Result<Exchange> {
        self.validate()?;

        let credential = self.access.credential();
        if credential.is_empty() {
            log::warn!("No credentials configured; every request will be denied");
        }

        let metrics = Arc::new(MetricCollection::new());
        for config in &self.metrics {
            let metric = metrics.register(config.to_metric());
            log::info!("Hosting {} as {}", metric.name(), metric.id());
        }

        let registry = Arc::new(SyncRegistry::new());
        let synchronizer = Synchronizer::new(Arc::clone(&registry), client, Arc::clone(&scheduler));

        let links: HashMap<&str, RemoteLink> = self
            .peers
            .iter()
            .map(|peer| (peer.name.as_str(), peer.link()))
            .collect();

        let mut subscriptions = Vec::new();
        for entry in &self.sync {
            let (metric, link) = match (metrics.get_by_name(&entry.metric), links.get(entry.peer.as_str())) {
                (Some(metric), Some(link)) => (metric, link.clone()),
                _ => continue,
            };
            if entry.direction.pulls() {
                synchronizer.pull_from(&metric, link.clone(), entry.remote_name());
            }
            if entry.direction.pushes() {
                subscriptions.push(synchronizer.push_to(&metric, link, entry.remote_name()));
            }
        }

        let api = Arc::new(MetricsApi::new(
            Arc::clone(&metrics),
            Arc::new(credential),
            registry,
            scheduler,
        ));
        let handler = Arc::new(RequestHandler::new(Arc::clone(&api), self.handler()));

        Ok(Exchange {
            metrics,
            api,
            handler,
            synchronizer,
            subscriptions,
        })
    }

    /// Generate sample config
    pub fn sample_toml() -> String {
        r#"# Metric Exchange Configuration
bind_address = "127.0.0.1"
port = 8080
prefix = "metrics"
request_logging = true
max_body_size = 1048576
log_level = "info"

[access]
# Bare secrets grant every operation on every metric
secrets = ["change-me"]

# Scoped tokens: permissions from list, last, history, push
[[access.tokens]]
token = "dashboard-token"
permissions = ["list", "last"]
accessibleMetrics = ["cpu_usage_percent"]
inaccessibleMetrics = []

[[metrics]]
name = "cpu_usage_percent"
description = "CPU usage"
unit = "%"

[[metrics]]
name = "remote_cpu_usage_percent"
description = "CPU usage of the peer"
unit = "%"
remotely_updatable = true

# [[peers]]
# name = "edge-1"
# base_url = "http://10.0.0.2:8080"
# token = "peer-token"
# timeout_secs = 10
# prefix = "metrics"

# [[sync]]
# metric = "remote_cpu_usage_percent"
# peer = "edge-1"
# remote_metric = "cpu_usage_percent"
# direction = "pull"        # pull | push | both
"#
        .into()
    }
}
