//! REST surface: `/`, `/health`, `/weather`, `/forecast` and `POST /mcp`.

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use weather_core::{WeatherError, WeatherQuery, WeatherService};

use crate::{backend::DirectBackend, rpc::Dispatcher};

/// Envelope shared by every REST answer; exactly one of `data`/`error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error rendered as an error envelope with the mapped status.
#[derive(Debug)]
pub struct ApiError(pub WeatherError);

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        Self(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(WeatherError::Validation(rejection.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(WeatherError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::warn!(error = %self.0, status = status.as_u16(), "request rejected");
        }

        (status, Json(ApiResponse::<()>::failure(self.0.to_string()))).into_response()
    }
}

fn respond<T: Serialize>(data: T) -> Response {
    Json(ApiResponse::ok(data)).into_response()
}

/// Shared, read-only state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    service: Arc<WeatherService>,
    environment: String,
    mcp: Arc<Dispatcher<DirectBackend>>,
}

impl AppState {
    pub fn new(service: Arc<WeatherService>, environment: impl Into<String>) -> Self {
        let mcp = Arc::new(Dispatcher::new(DirectBackend::new(service.clone())));
        Self {
            service,
            environment: environment.into(),
            mcp,
        }
    }
}

/// Location parameters accepted by `/weather` and `/forecast`.
#[derive(Debug, Default, Deserialize)]
pub struct WeatherParams {
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(alias = "lon")]
    pub longitude: Option<f64>,
    pub location: Option<String>,
    pub units: Option<String>,
    pub lang: Option<String>,
    /// `GET /weather` only: `false` returns the provider document untouched.
    pub formatted: Option<bool>,
}

impl WeatherParams {
    fn to_query(&self) -> Result<WeatherQuery, WeatherError> {
        WeatherQuery::from_parts(
            self.latitude,
            self.longitude,
            self.location.as_deref(),
            self.units.as_deref(),
            self.lang.as_deref(),
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/weather", get(get_weather).post(post_weather))
        .route("/forecast", get(get_forecast))
        .route("/mcp", post(mcp))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `router(state)` on `listener` until `shutdown` resolves, then
/// finish in-flight requests and return.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "Weather MCP Server",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Weather data from OpenWeatherMap over HTTP and JSON-RPC",
        "environment": state.environment,
        "endpoints": {
            "health": "GET /health",
            "weather": "GET|POST /weather",
            "forecast": "GET /forecast",
            "mcp": "POST /mcp"
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"status": "healthy", "environment": state.environment}))
}

async fn get_weather(
    State(state): State<AppState>,
    params: Result<Query<WeatherParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let query = params.to_query()?;

    if params.formatted.unwrap_or(true) {
        Ok(respond(state.service.current_weather(&query).await?))
    } else {
        Ok(respond(state.service.current_weather_raw(&query).await?))
    }
}

async fn post_weather(
    State(state): State<AppState>,
    body: Result<Json<WeatherParams>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(params) = body?;
    let query = params.to_query()?;
    Ok(respond(state.service.current_weather(&query).await?))
}

async fn get_forecast(
    State(state): State<AppState>,
    params: Result<Query<WeatherParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let query = params.to_query()?;
    Ok(respond(state.service.forecast(&query).await?))
}

async fn mcp(State(state): State<AppState>, body: String) -> Response {
    match state.mcp.handle_line(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
