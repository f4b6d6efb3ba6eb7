// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! HTTP client for peer instances
//!
//! Speaks the same routes [`RequestHandler`](crate::server::RequestHandler)
//! serves. Every call goes through a [`RemoteLink`], which supplies the
//! base address, credential and timeout.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::codec::{self, ExtendedMetricInfo, HistoryRequest, MetricInfo};
use crate::error::{ExchangeError, Result};
use crate::metric::{MetricId, Timestamped};
use crate::route::Operation;
use crate::sync::{PeerClient, RemoteLink};

/// reqwest-backed peer client
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    http: Client,
}

impl HttpPeerClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("metricx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExchangeError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Reuse an existing reqwest client
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Metrics the link's credential may list
    pub async fn list(&self, link: &RemoteLink) -> Result<Vec<MetricInfo>> {
        self.fetch(link, Operation::ListMetrics, None, None).await
    }

    /// Latest value of one metric, `None` if it has never recorded one
    pub async fn last(&self, link: &RemoteLink, id: &MetricId) -> Result<Option<Timestamped>> {
        match self.fetch(link, Operation::LastValueOfOne, Some(id), None).await {
            Ok(value) => Ok(Some(value)),
            Err(ExchangeError::RemoteStatus { status, .. })
                if status == StatusCode::GONE.as_u16() =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Latest value of every accessible metric that has one
    pub async fn last_all(&self, link: &RemoteLink) -> Result<BTreeMap<MetricId, Timestamped>> {
        self.fetch(link, Operation::LastValuesOfAll, None, None).await
    }

    pub async fn extended_list(
        &self,
        link: &RemoteLink,
    ) -> Result<BTreeMap<MetricId, ExtendedMetricInfo>> {
        self.fetch(link, Operation::ExtendedList, None, None).await
    }

    pub async fn history(
        &self,
        link: &RemoteLink,
        id: &MetricId,
        request: &HistoryRequest,
    ) -> Result<Vec<Timestamped>> {
        let body = codec::encode(request)?;
        self.fetch(link, Operation::History, Some(id), Some(body)).await
    }

    /// Push values directly into a peer's metric
    pub async fn push_values(
        &self,
        link: &RemoteLink,
        id: &MetricId,
        values: &[Timestamped],
    ) -> Result<()> {
        let body = codec::encode(&values)?;
        self.send(link, Operation::Push, Some(id), Some(body)).await?;
        Ok(())
    }

    /// Empty-body push: asks the peer to pull from its binding
    pub async fn notify_push(&self, link: &RemoteLink, id: &MetricId) -> Result<()> {
        self.send(link, Operation::Push, Some(id), None).await?;
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        link: &RemoteLink,
        operation: Operation,
        target: Option<&MetricId>,
        body: Option<String>,
    ) -> Result<T> {
        let response = self.send(link, operation, target, body).await?;
        let text = response.text().await?;
        codec::decode(&text)
    }

    async fn send(
        &self,
        link: &RemoteLink,
        operation: Operation,
        target: Option<&MetricId>,
        body: Option<String>,
    ) -> Result<reqwest::Response> {
        let url = link.url(operation, target)?;
        let method = match operation.method() {
            "POST" => Method::POST,
            _ => Method::GET,
        };

        let mut request = link.auth().apply(self.http.request(method, &url));
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        log::debug!("{} {}", operation.method(), url);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            log::debug!("{} answered {}", url, status);
            return Err(ExchangeError::RemoteStatus {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn history(
        &self,
        link: &RemoteLink,
        remote: &MetricId,
        request: &HistoryRequest,
    ) -> Result<Vec<Timestamped>> {
        HttpPeerClient::history(self, link, remote, request).await
    }

    async fn notify_push(&self, link: &RemoteLink, remote: &MetricId) -> Result<()> {
        HttpPeerClient::notify_push(self, link, remote).await
    }
}
