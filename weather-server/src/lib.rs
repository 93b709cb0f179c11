//! Front ends for the weather proxy.
//!
//! - [`http`]: the REST API (axum)
//! - [`rpc`]: line-delimited JSON-RPC / MCP over any reader and writer
//! - [`backend`]: where tool calls are executed (in-process or over HTTP)
//! - [`bridge`]: stdio mode, running both surfaces in one process

pub mod backend;
pub mod bridge;
pub mod http;
pub mod rpc;
