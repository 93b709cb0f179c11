//! Request handlers shared by the HTTP and JSON-RPC transports.

use serde_json::Value;
use std::sync::Arc;

use crate::{
    config::ServiceConfig,
    error::Result,
    format::{format_current, format_forecast},
    geocode::{Geocoder, GeocodingClient},
    model::{Coordinate, ForecastBundle, Section, Target, WeatherQuery, WeatherReport},
    provider::{OpenWeatherClient, WeatherProvider},
};

/// Composes geocoding, the provider call and formatting.
#[derive(Debug, Clone)]
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    geocoder: Arc<dyn Geocoder>,
}

impl WeatherService {
    pub fn new(provider: Arc<dyn WeatherProvider>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { provider, geocoder }
    }

    /// Service backed by the real OpenWeatherMap clients.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(OpenWeatherClient::new(config)?),
            Arc::new(GeocodingClient::new(config)?),
        ))
    }

    /// Current conditions only.
    pub async fn current_weather(&self, query: &WeatherQuery) -> Result<WeatherReport> {
        let raw = self.current_weather_raw(query).await?;
        Ok(format_current(&raw))
    }

    /// Current conditions as the provider sent them, unformatted.
    pub async fn current_weather_raw(&self, query: &WeatherQuery) -> Result<Value> {
        let coordinate = self.locate(query).await?;
        tracing::info!("fetching current weather");
        self.provider
            .fetch(coordinate, query.units, &query.lang, Section::FORECAST_SECTIONS)
            .await
    }

    /// Current conditions plus hourly and daily forecast.
    pub async fn forecast(&self, query: &WeatherQuery) -> Result<ForecastBundle> {
        let coordinate = self.locate(query).await?;
        tracing::info!("fetching forecast");
        let raw = self
            .provider
            .fetch(coordinate, query.units, &query.lang, &[])
            .await?;
        Ok(format_forecast(&raw))
    }

    async fn locate(&self, query: &WeatherQuery) -> Result<Coordinate> {
        match &query.target {
            Target::Coordinates(c) => Ok(*c),
            Target::Place(name) => self.geocoder.resolve(name).await,
        }
    }
}
