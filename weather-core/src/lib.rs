//! Core library for the weather proxy.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The error taxonomy every transport maps from
//! - Provider and geocoding clients (OpenWeatherMap)
//! - Formatting of raw provider documents into the stable output schema
//! - Request handlers composing the above
//!
//! It is used by `weather-server`, which exposes it over HTTP and stdio JSON-RPC.

pub mod config;
pub mod error;
pub mod format;
pub mod geocode;
pub mod model;
pub mod provider;
pub mod service;

pub use config::{Config, ServiceConfig};
pub use error::{Result, WeatherError};
pub use format::{format_current, format_forecast};
pub use geocode::{Geocoder, GeocodingClient};
pub use model::{
    Condition, Coordinate, CurrentConditions, ForecastBundle, Section, Target, Units,
    WeatherQuery, WeatherReport,
};
pub use provider::{OpenWeatherClient, WeatherProvider};
pub use service::WeatherService;
