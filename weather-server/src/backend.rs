//! Execution backends for the weather tools.
//!
//! The JSON-RPC dispatcher does not call the provider itself; it hands each
//! tool call to a [`ToolBackend`]. The bridge uses [`LoopbackBackend`], which
//! goes through the process's own HTTP listener, while `POST /mcp` uses
//! [`DirectBackend`] because it already runs inside that listener.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc, time::Duration};

use weather_core::{Result, Target, WeatherError, WeatherQuery, WeatherService};

use crate::http::ApiResponse;

#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<Value>;
    async fn forecast(&self, query: &WeatherQuery) -> Result<Value>;
}

/// Runs the handlers in-process.
#[derive(Debug, Clone)]
pub struct DirectBackend {
    service: Arc<WeatherService>,
}

impl DirectBackend {
    pub fn new(service: Arc<WeatherService>) -> Self {
        Self { service }
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| WeatherError::Backend {
        status: 500,
        message: format!("Failed to encode result: {e}"),
    })
}

#[async_trait]
impl ToolBackend for DirectBackend {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<Value> {
        to_payload(&self.service.current_weather(query).await?)
    }

    async fn forecast(&self, query: &WeatherQuery) -> Result<Value> {
        to_payload(&self.service.forecast(query).await?)
    }
}

/// Calls a running HTTP listener (usually this process's own).
#[derive(Debug, Clone)]
pub struct LoopbackBackend {
    base_url: String,
    http: Client,
}

impl LoopbackBackend {
    pub const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| WeatherError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Backend for a listener bound to `addr`; wildcard binds are reached
    /// through the loopback interface.
    pub fn for_addr(addr: SocketAddr) -> Result<Self> {
        let mut addr = addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(if addr.is_ipv4() {
                std::net::Ipv4Addr::LOCALHOST.into()
            } else {
                std::net::Ipv6Addr::LOCALHOST.into()
            });
        }
        Self::new(format!("http://{addr}"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, endpoint: &str, query: &WeatherQuery) -> Result<Value> {
        let mut params = vec![
            ("units", query.units.as_str().to_string()),
            ("lang", query.lang.clone()),
        ];
        match &query.target {
            Target::Coordinates(c) => {
                params.push(("latitude", c.latitude().to_string()));
                params.push(("longitude", c.longitude().to_string()));
            }
            Target::Place(name) => params.push(("location", name.clone())),
        }

        let url = format!("{}{endpoint}", self.base_url);
        tracing::debug!(%url, "calling HTTP backend");

        let res = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| WeatherError::Network(format!("HTTP backend unreachable: {e}")))?;

        let status = res.status();
        let envelope: ApiResponse<Value> = res.json().await.map_err(|e| WeatherError::Backend {
            status: status.as_u16(),
            message: format!("Unexpected response from HTTP backend: {e}"),
        })?;

        match envelope {
            ApiResponse { success: true, data, .. } if status.is_success() => {
                Ok(data.unwrap_or(Value::Null))
            }
            ApiResponse { error, .. } => Err(WeatherError::Backend {
                status: status.as_u16(),
                message: error.unwrap_or_else(|| format!("HTTP backend answered {status}")),
            }),
        }
    }
}

#[async_trait]
impl ToolBackend for LoopbackBackend {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<Value> {
        self.get("/weather", query).await
    }

    async fn forecast(&self, query: &WeatherQuery) -> Result<Value> {
        self.get("/forecast", query).await
    }
}
