//! Forward geocoding: place name to coordinates, via the OpenWeatherMap
//! direct geocoding endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;

use crate::{
    config::ServiceConfig,
    error::{Result, WeatherError},
    model::Coordinate,
    provider::truncate_body,
};

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn resolve(&self, place: &str) -> Result<Coordinate>;
}

#[derive(Debug, Deserialize)]
struct GeoMatch {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeocodingClient {
    api_key: String,
    url: String,
    http: Client,
}

impl GeocodingClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WeatherError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            url: config.geocoding_url.clone(),
            http,
        })
    }
}

#[async_trait]
impl Geocoder for GeocodingClient {
    async fn resolve(&self, place: &str) -> Result<Coordinate> {
        let res = self
            .http
            .get(&self.url)
            .query(&[("q", place), ("limit", "1"), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(WeatherError::from_transport)?;

        let status = res.status();
        let body = res.text().await.map_err(WeatherError::from_transport)?;

        if !status.is_success() {
            return Err(WeatherError::Provider {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        let matches: Vec<GeoMatch> =
            serde_json::from_str(&body).map_err(|e| WeatherError::Provider {
                status: status.as_u16(),
                message: format!("Failed to parse geocoding JSON: {e}"),
            })?;

        let Some(GeoMatch { lat: Some(lat), lon: Some(lon), name }) = matches.into_iter().next()
        else {
            return Err(WeatherError::LocationNotFound(place.to_string()));
        };

        tracing::info!(
            place,
            matched = name.as_deref().unwrap_or("?"),
            lat,
            lon,
            "geocoded location"
        );

        Coordinate::new(lat, lon)
    }
}
