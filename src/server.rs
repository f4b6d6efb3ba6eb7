// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Request dispatch for the metrics API
//!
//! Maps transport-neutral [`HttpRequest`]s onto [`MetricsApi`] calls and
//! turns results and errors into [`HttpResponse`]s. The socket side lives in
//! [`http_server`](crate::http_server).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::api::{MetricsApi, RequestContext};
use crate::codec::{self, HistoryRequest};
use crate::error::{ExchangeError, Result};
use crate::metric::{now_millis, MetricId, Timestamped};
use crate::route::{Operation, Route, Routes, CREDENTIAL_HEADER, DEFAULT_PREFIX};

/// Counter for unique request IDs
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique request ID using timestamp + counter
fn generate_request_id() -> String {
    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("req-{}-{}", now_millis().timestamp_millis(), counter)
}

/// Routes served outside the metrics prefix
pub mod routes {
    /// Health check, no credential required
    pub const HEALTH: &str = "/health";
}

/// Handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path prefix the metric routes are served under
    pub prefix: String,
    /// Log one line per request
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            request_logging: true,
        }
    }
}

/// HTTP request
#[derive(Debug, Default)]
pub struct HttpRequest {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Headers, keys lowercased
    pub headers: HashMap<String, String>,
    /// Body
    pub body: Option<String>,
    /// Client address
    pub client_addr: Option<SocketAddr>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    /// The presented credential
    pub fn token(&self) -> Option<&str> {
        self.header(CREDENTIAL_HEADER)
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Headers
    pub headers: HashMap<String, String>,
    /// Body
    pub body: String,
}

impl HttpResponse {
    /// Create a JSON response
    pub fn json<T: Serialize>(status: u16, data: &T) -> Self {
        match codec::encode(data) {
            Ok(body) => {
                let mut headers = HashMap::new();
                headers.insert("content-type".to_string(), "application/json".to_string());
                Self {
                    status,
                    headers,
                    body,
                }
            }
            Err(e) => Self::from_error(&e),
        }
    }

    /// Create an error response
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({
            "error": message,
            "status": status
        });
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status,
            headers,
            body: body.to_string(),
        }
    }

    /// Error response for an exchange error, detail withheld
    pub fn from_error(err: &ExchangeError) -> Self {
        Self::error(err.status_code(), &err.public_message())
    }

    /// 200 OK
    pub fn ok<T: Serialize>(data: &T) -> Self {
        Self::json(200, data)
    }

    /// 204 No Content
    pub fn no_content() -> Self {
        Self {
            status: 204,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// 400 Bad Request
    pub fn bad_request(message: &str) -> Self {
        Self::error(400, message)
    }

    /// 404 Not Found
    pub fn not_found(message: &str) -> Self {
        Self::error(404, message)
    }

    /// 405 Method Not Allowed
    pub fn method_not_allowed(allowed: &str) -> Self {
        let mut response = Self::error(405, "Method not allowed");
        response.headers.insert("allow".to_string(), allowed.to_string());
        response
    }
}

/// Request handler context
pub struct RequestHandler {
    api: Arc<MetricsApi>,
    routes: Routes,
    config: ServerConfig,
}

impl RequestHandler {
    pub fn new(api: Arc<MetricsApi>, config: ServerConfig) -> Self {
        Self {
            api,
            routes: Routes::new(&config.prefix),
            config,
        }
    }

    pub fn api(&self) -> &Arc<MetricsApi> {
        &self.api
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Handle an HTTP request
    pub fn handle(&self, request: HttpRequest) -> HttpResponse {
        let start = Instant::now();
        let response = self.route(&request);

        if self.config.request_logging {
            log::info!(
                "{} {} {} {}ms",
                request.method,
                request.path,
                response.status,
                start.elapsed().as_millis()
            );
        }

        response
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        if request.path == routes::HEALTH && request.method == "GET" {
            return HttpResponse::ok(&serde_json::json!({
                "status": "healthy",
                "metrics": self.api.metrics().len(),
                "timestamp": now_millis().timestamp_millis()
            }));
        }

        let route = match self.routes.resolve(&request.path) {
            Ok(Some(route)) => route,
            Ok(None) => return HttpResponse::not_found("Unknown route"),
            Err(e) => return self.error_response(e),
        };

        let allowed = route.operation.method();
        if request.method != allowed {
            return HttpResponse::method_not_allowed(allowed);
        }

        let token = match request.token() {
            Some(token) => token,
            None => {
                return HttpResponse::bad_request(&format!("Missing {} header", CREDENTIAL_HEADER))
            }
        };

        let mut ctx = RequestContext::new(token).with_request_id(generate_request_id());
        if let Some(addr) = request.client_addr {
            ctx = ctx.with_client_ip(addr.ip().to_string());
        }

        match self.dispatch(route, &ctx, request.body.as_deref()) {
            Ok(response) => response,
            Err(e) => self.error_response(e),
        }
    }

    fn dispatch(&self, route: Route, ctx: &RequestContext, body: Option<&str>) -> Result<HttpResponse> {
        let Route { operation, target: fingerprint } = route;
        let target = || -> Result<MetricId> {
            fingerprint
                .clone()
                .ok_or_else(|| ExchangeError::BadRequest("Missing metric fingerprint".into()))
        };

        let response = match operation {
            Operation::ListMetrics => HttpResponse::ok(&self.api.list(ctx)?),
            Operation::LastValuesOfAll => HttpResponse::ok(&self.api.last_all(ctx)?),
            Operation::ExtendedList => HttpResponse::ok(&self.api.extended_list(ctx)?),
            Operation::LastValueOfOne => HttpResponse::ok(&self.api.last(ctx, &target()?)?),
            // The body is only decoded once the caller is known to be
            // authorized, so a denial never reads as a malformed request.
            Operation::History => {
                let id = target()?;
                self.api.authorize(ctx, operation, &id)?;
                let request: HistoryRequest = codec::decode_optional(body)?.ok_or_else(|| {
                    ExchangeError::BadRequest("Missing history request body".into())
                })?;
                HttpResponse::ok(&self.api.history(ctx, &id, &request)?)
            }
            Operation::Push => {
                let id = target()?;
                self.api.authorize(ctx, operation, &id)?;
                let values: Option<Vec<Timestamped>> = codec::decode_optional(body)?;
                self.api.push(ctx, &id, values)?;
                HttpResponse::no_content()
            }
        };
        Ok(response)
    }

    fn error_response(&self, err: ExchangeError) -> HttpResponse {
        match err.status_code() {
            500 => log::error!("Request failed: {}", err),
            _ => log::debug!("Request rejected: {}", err),
        }
        HttpResponse::from_error(&err)
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("routes", &self.routes)
            .field("config", &self.config)
            .finish()
    }
}
