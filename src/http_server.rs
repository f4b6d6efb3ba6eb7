// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! HTTP Server for the Metric Exchange API
//!
//! A lightweight HTTP/1.1 server built on tokio. One request per connection;
//! bodies are read according to `Content-Length`.
//!
//! # Examples
//!
//! ```no_run
//! use metricx::config::ExchangeConfig;
//! use metricx::http_server::HttpServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExchangeConfig::from_toml_file("metricx.toml")?;
//!     let exchange = config.build()?;
//!     let server = HttpServer::new(config.server(), exchange.handler);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{ExchangeError, Result};
use crate::route::CREDENTIAL_HEADER;
use crate::server::{HttpRequest, HttpResponse, RequestHandler};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    /// Bind address (default: "127.0.0.1")
    pub bind_address: String,
    /// Port (default: 8080)
    pub port: u16,
    /// CORS enabled (default: false)
    pub cors_enabled: bool,
    /// Allowed CORS origins (default: ["*"])
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes (default: 1MB)
    pub max_body_size: usize,
    /// Time allowed to receive a full request, in seconds (default: 30)
    pub request_timeout_secs: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 8080,
            cors_enabled: false,
            cors_origins: vec!["*".into()],
            max_body_size: 1_048_576,
            request_timeout_secs: 30,
        }
    }
}

impl HttpServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Why a raw request could not be read
#[derive(Debug, PartialEq, Eq)]
enum ReadError {
    Closed,
    Malformed,
    TooLarge,
}

/// HTTP server that exposes hosted metrics
pub struct HttpServer {
    config: HttpServerConfig,
    handler: Arc<RequestHandler>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, handler: Arc<RequestHandler>) -> Self {
        Self { config, handler }
    }

    /// Bind the configured address and serve until the task is dropped
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ExchangeError::Config(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        log::info!(
            "HTTP server listening on http://{} (routes under /{})",
            local,
            self.handler.routes().prefix()
        );

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("Accept error: {}", e);
                    continue;
                }
            };

            let handler = Arc::clone(&self.handler);
            let config = self.config.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, peer_addr, handler, config).await {
                    log::debug!("Connection from {} ended: {}", peer_addr, e);
                }
            });
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        peer_addr: SocketAddr,
        handler: Arc<RequestHandler>,
        config: HttpServerConfig,
    ) -> Result<()> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let read = tokio::time::timeout(timeout, read_request(&mut stream, config.max_body_size));
        let (head, body) = match read.await {
            Ok(Ok(raw)) => raw,
            Ok(Err(ReadError::Closed)) => return Ok(()),
            Ok(Err(ReadError::TooLarge)) => {
                let response = HttpResponse::error(413, "Request body too large");
                return write_response(&mut stream, response, &config).await;
            }
            Ok(Err(ReadError::Malformed)) | Err(_) => {
                let response = HttpResponse::bad_request("Bad Request");
                return write_response(&mut stream, response, &config).await;
            }
        };

        let request = match parse_http_request(&head, &body, peer_addr) {
            Some(req) => req,
            None => {
                let response = HttpResponse::bad_request("Bad Request");
                return write_response(&mut stream, response, &config).await;
            }
        };

        // CORS preflight
        if request.method == "OPTIONS" && config.cors_enabled {
            let mut response = HttpResponse::no_content();
            response.headers.insert(
                "access-control-allow-methods".to_string(),
                "GET, POST, OPTIONS".to_string(),
            );
            response.headers.insert(
                "access-control-allow-headers".to_string(),
                format!("Content-Type, {}", CREDENTIAL_HEADER),
            );
            response
                .headers
                .insert("access-control-max-age".to_string(), "86400".to_string());
            return write_response(&mut stream, response, &config).await;
        }

        let response = handler.handle(request);
        write_response(&mut stream, response, &config).await
    }
}

/// Read the head and body of one request
async fn read_request(
    stream: &mut TcpStream,
    max_body: usize,
) -> std::result::Result<(String, Vec<u8>), ReadError> {
    const MAX_HEAD: usize = 16 * 1024;
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEAD {
            return Err(ReadError::Malformed);
        }
        let n = stream.read(&mut chunk).await.map_err(|_| ReadError::Closed)?;
        if n == 0 {
            return Err(if buf.is_empty() {
                ReadError::Closed
            } else {
                ReadError::Malformed
            });
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = content_length(&head).ok_or(ReadError::Malformed)?;
    if content_length > max_body {
        return Err(ReadError::TooLarge);
    }

    let mut body = buf.split_off(head_end + 4);
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.map_err(|_| ReadError::Closed)?;
        if n == 0 {
            return Err(ReadError::Malformed);
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);
    Ok((head, body))
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Declared body length. Absent means zero; unparsable means malformed.
fn content_length(head: &str) -> Option<usize> {
    for line in head.lines().skip(1) {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse().ok();
            }
        }
    }
    Some(0)
}

/// Parse a raw HTTP/1.1 request head plus body
fn parse_http_request(head: &str, body: &[u8], client_addr: SocketAddr) -> Option<HttpRequest> {
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let method = parts[0].to_uppercase();
    let full_path = parts[1];

    // No route takes query parameters
    let path = full_path
        .split_once('?')
        .map_or(full_path, |(path, _)| path)
        .to_string();

    // Parse headers
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let body = if body.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(body).into_owned())
    };

    Some(HttpRequest {
        method,
        path,
        headers,
        body,
        client_addr: Some(client_addr),
    })
}

async fn write_response(
    stream: &mut TcpStream,
    response: HttpResponse,
    config: &HttpServerConfig,
) -> Result<()> {
    let mut resp = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        status_text(response.status)
    );

    for (key, value) in &response.headers {
        resp.push_str(&format!("{}: {}\r\n", key, value));
    }

    if config.cors_enabled {
        let origin = config.cors_origins.first().map(String::as_str).unwrap_or("*");
        resp.push_str(&format!("Access-Control-Allow-Origin: {}\r\n", origin));
    }

    resp.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    resp.push_str("Connection: close\r\n");
    resp.push_str("\r\n");
    resp.push_str(&response.body);

    stream.write_all(resp.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        410 => "Gone",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
