//! Error taxonomy shared by every transport.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeatherError>;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// Input rejected locally; never reaches the network.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Location '{0}' not found")]
    LocationNotFound(String),

    /// Non-2xx (or unreadable) answer from the weather or geocoding provider.
    #[error("Provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// Timeout or connection failure on an outbound call.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure relayed from the local HTTP listener by the loopback backend.
    /// The message is already user-facing, so it is shown as-is.
    #[error("{message}")]
    Backend { status: u16, message: String },
}

impl WeatherError {
    /// Build from a transport-level reqwest failure. The URL is dropped
    /// because it carries the API key.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            WeatherError::Network(format!("request timed out: {err}"))
        } else if let Some(status) = err.status() {
            WeatherError::Provider {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            WeatherError::Network(err.to_string())
        }
    }

    /// HTTP status the REST surface answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            WeatherError::Validation(_) => 400,
            WeatherError::LocationNotFound(_) => 404,
            WeatherError::Provider { status: 401, .. } => 401,
            WeatherError::Provider { status: 429, .. } => 429,
            WeatherError::Backend { status, .. } => *status,
            _ => 500,
        }
    }

    /// JSON-RPC error code for the tool-calling surface.
    pub fn rpc_code(&self) -> i64 {
        match self {
            WeatherError::Validation(_) => -32602,
            WeatherError::LocationNotFound(_) => -32001,
            WeatherError::Provider { status: 401, .. } => -32003,
            WeatherError::Provider { status: 429, .. } => -32004,
            WeatherError::Network(_) => -32005,
            WeatherError::Backend { status, .. } => match status {
                400 => -32602,
                404 => -32001,
                401 => -32003,
                429 => -32004,
                _ => -32000,
            },
            _ => -32000,
        }
    }
}
