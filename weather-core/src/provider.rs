use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    error::Result,
    model::{Coordinate, Section, Units},
};

pub mod openweather;

pub use openweather::OpenWeatherClient;

/// Source of raw weather documents.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Fetch one document for `coordinate`, omitting the `exclude` sections.
    async fn fetch(
        &self,
        coordinate: Coordinate,
        units: Units,
        lang: &str,
        exclude: &[Section],
    ) -> Result<Value>;
}

/// Comma-separated exclusion list, as the provider expects it.
pub fn exclusion_list(exclude: &[Section]) -> String {
    exclude
        .iter()
        .map(Section::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
