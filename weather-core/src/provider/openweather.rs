use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::{
    config::ServiceConfig,
    error::{Result, WeatherError},
    model::{Coordinate, Section, Units},
};

use super::{WeatherProvider, exclusion_list, truncate_body};

/// Client for the OpenWeatherMap One Call 3.0 endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WeatherError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            http,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch(
        &self,
        coordinate: Coordinate,
        units: Units,
        lang: &str,
        exclude: &[Section],
    ) -> Result<Value> {
        let mut query = vec![
            ("lat", coordinate.latitude().to_string()),
            ("lon", coordinate.longitude().to_string()),
            ("appid", self.api_key.clone()),
            ("units", units.as_str().to_string()),
            ("lang", lang.to_string()),
        ];
        if !exclude.is_empty() {
            query.push(("exclude", exclusion_list(exclude)));
        }

        tracing::debug!(
            lat = coordinate.latitude(),
            lon = coordinate.longitude(),
            %units,
            "fetching One Call document"
        );

        let res = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(WeatherError::from_transport)?;

        let status = res.status();
        let body = res.text().await.map_err(WeatherError::from_transport)?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "OpenWeather request failed");
            return Err(WeatherError::Provider {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| WeatherError::Provider {
            status: status.as_u16(),
            message: format!("Failed to parse OpenWeather JSON: {e}"),
        })
    }
}
