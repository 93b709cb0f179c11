//! Line-delimited JSON-RPC 2.0 (MCP) front end.
//!
//! One request per line in, one response per line out, in order. The loop
//! is synchronous: each request is fully answered before the next line is
//! read. Tool calls are delegated to a [`ToolBackend`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{BufRead, Write};

use weather_core::{WeatherError, WeatherQuery};

use crate::backend::ToolBackend;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "weather-mcp-server";

/// JSON-RPC error codes.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const SERVER_ERROR: i64 = -32000;
}

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";
    pub const LIST_RESOURCES: &str = "resources/list";
    pub const LIST_PROMPTS: &str = "prompts/list";
}

pub mod tools {
    pub const CURRENT_WEATHER: &str = "get_current_weather";
    /// Older name for [`CURRENT_WEATHER`], still accepted by `tools/call`.
    pub const CURRENT_WEATHER_ALIAS: &str = "get_weather";
    pub const FORECAST: &str = "get_forecast";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<WeatherError> for RpcError {
    fn from(err: WeatherError) -> Self {
        Self::new(err.rpc_code(), err.to_string())
    }
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn location_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "latitude": {"type": "number", "minimum": -90, "maximum": 90, "description": "Latitude in degrees"},
            "longitude": {"type": "number", "minimum": -180, "maximum": 180, "description": "Longitude in degrees"},
            "location": {"type": "string", "description": "Place name, used instead of coordinates"},
            "units": {"type": "string", "enum": ["metric", "imperial", "standard"], "default": "metric"},
            "lang": {"type": "string", "default": "en", "description": "Language code for descriptions"}
        }
    })
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: tools::CURRENT_WEATHER,
            description: "Get current weather conditions for a location given as coordinates or a place name",
            input_schema: location_schema(),
        },
        ToolDefinition {
            name: tools::FORECAST,
            description: "Get current conditions plus the hourly and daily forecast for a location",
            input_schema: location_schema(),
        },
    ]
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolArguments {
    latitude: Option<f64>,
    longitude: Option<f64>,
    location: Option<String>,
    units: Option<String>,
    lang: Option<String>,
}

impl ToolArguments {
    fn into_query(self) -> Result<WeatherQuery, WeatherError> {
        WeatherQuery::from_parts(
            self.latitude,
            self.longitude,
            self.location.as_deref(),
            self.units.as_deref(),
            self.lang.as_deref(),
        )
    }
}

/// Maps JSON-RPC messages onto the weather tools.
#[derive(Debug)]
pub struct Dispatcher<B> {
    backend: B,
}

impl<B: ToolBackend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Handle one raw line. `None` means nothing should be written back
    /// (blank line or notification).
    pub async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable JSON-RPC line");
                Some(RpcResponse::failure(
                    Value::Null,
                    RpcError::new(codes::PARSE_ERROR, format!("Parse error: {e}")),
                ))
            }
        }
    }

    /// Handle one decoded message.
    pub async fn handle_message(&self, message: Value) -> Option<RpcResponse> {
        let has_id = message.get("id").is_some();
        let has_method = message.get("method").is_some_and(Value::is_string);

        if has_method && !has_id {
            match message.get("method").and_then(Value::as_str) {
                Some(methods::INITIALIZED) => tracing::info!("client initialized"),
                method => tracing::debug!(?method, "notification ignored"),
            }
            return None;
        }

        let id = message.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<RpcRequest>(message) {
            Ok(request) => Some(self.handle(request).await),
            Err(e) => Some(RpcResponse::failure(
                id,
                RpcError::new(codes::INVALID_REQUEST, format!("Invalid Request: {e}")),
            )),
        }
    }

    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        tracing::debug!(method = %request.method, "handling request");

        let outcome = match request.method.as_str() {
            methods::INITIALIZE => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
            })),
            methods::PING => Ok(json!({})),
            methods::LIST_TOOLS => Ok(json!({"tools": tool_definitions()})),
            methods::LIST_RESOURCES => Ok(json!({"resources": []})),
            methods::LIST_PROMPTS => Ok(json!({"prompts": []})),
            methods::CALL_TOOL => self.call_tool(request.params).await,
            other => Err(RpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        };

        match outcome {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(error) => RpcResponse::failure(request.id, error),
        }
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let params: ToolCallParams = serde_json::from_value(params)
            .map_err(|e| RpcError::new(codes::INVALID_PARAMS, format!("Invalid params: {e}")))?;

        let arguments = match params.arguments {
            None | Some(Value::Null) => ToolArguments::default(),
            Some(args) => serde_json::from_value(args).map_err(|e| {
                RpcError::new(codes::INVALID_PARAMS, format!("Invalid arguments: {e}"))
            })?,
        };

        let payload = match params.name.as_str() {
            tools::CURRENT_WEATHER | tools::CURRENT_WEATHER_ALIAS => {
                let query = arguments.into_query()?;
                self.backend.current_weather(&query).await
            }
            tools::FORECAST => {
                let query = arguments.into_query()?;
                self.backend.forecast(&query).await
            }
            other => {
                return Err(RpcError::new(
                    codes::INVALID_PARAMS,
                    format!("Unknown tool: {other}"),
                ));
            }
        };

        let payload = payload.map_err(|e| {
            tracing::warn!(tool = %params.name, error = %e, "tool call failed");
            RpcError::from(e)
        })?;

        let text = serde_json::to_string_pretty(&payload).map_err(|e| {
            RpcError::new(codes::SERVER_ERROR, format!("Failed to encode tool result: {e}"))
        })?;

        Ok(json!({"content": [{"type": "text", "text": text}]}))
    }
}

/// Synchronous line loop driving a [`Dispatcher`].
#[derive(Debug)]
pub struct RpcServer<B> {
    dispatcher: Dispatcher<B>,
}

impl<B: ToolBackend> RpcServer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            dispatcher: Dispatcher::new(backend),
        }
    }

    /// Serve until `reader` reaches EOF or fails.
    ///
    /// Must not be called from inside a tokio runtime: each request is
    /// driven on a private current-thread runtime.
    pub fn run<R: BufRead, W: Write>(&self, reader: R, writer: W) -> anyhow::Result<()> {
        self.run_until(reader, writer, || Ok(()))
    }

    /// Like [`RpcServer::run`], but calls `check` before each request; an
    /// error from it stops the loop and is returned.
    pub fn run_until<R, W, F>(&self, mut reader: R, mut writer: W, mut check: F) -> anyhow::Result<()>
    where
        R: BufRead,
        W: Write,
        F: FnMut() -> anyhow::Result<()>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build JSON-RPC runtime")?;

        tracing::info!("JSON-RPC loop listening");

        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    tracing::info!("input closed, shutting down JSON-RPC loop");
                    break;
                }
                Ok(_) => {
                    check()?;

                    // invalid UTF-8 decodes to replacement chars and fails as a parse error
                    let line = String::from_utf8_lossy(&buf);
                    let Some(response) = runtime.block_on(self.dispatcher.handle_line(&line))
                    else {
                        continue;
                    };

                    let encoded = serde_json::to_string(&response)
                        .context("Failed to encode JSON-RPC response")?;
                    writeln!(writer, "{encoded}").context("Failed to write JSON-RPC response")?;
                    writer.flush().context("Failed to flush JSON-RPC output")?;
                }
                Err(e) => {
                    tracing::error!(error = %e, "error reading JSON-RPC input");
                    break;
                }
            }
        }

        Ok(())
    }
}
