use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

use crate::error::{Result, WeatherError};

/// Maximum number of hourly entries carried in a forecast.
pub const MAX_HOURLY: usize = 48;
/// Maximum number of daily entries carried in a forecast.
pub const MAX_DAILY: usize = 8;

pub const DEFAULT_LANG: &str = "en";

/// A validated latitude/longitude pair; only constructible through [`Coordinate::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(WeatherError::Validation(format!(
                "Invalid latitude: {latitude}. Must be between -90 and 90."
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(WeatherError::Validation(format!(
                "Invalid longitude: {longitude}. Must be between -180 and 180."
            )));
        }

        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial, Units::Standard]
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = WeatherError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" | "kelvin" => Ok(Units::Standard),
            _ => Err(WeatherError::Validation(format!(
                "Unknown units '{value}'. Supported units: metric, imperial, standard."
            ))),
        }
    }
}

/// Optional sections of a One Call document that can be excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Current,
    Minutely,
    Hourly,
    Daily,
    Alerts,
}

impl Section {
    /// Exclusions used when only current conditions are wanted.
    pub const FORECAST_SECTIONS: &'static [Section] = &[
        Section::Minutely,
        Section::Hourly,
        Section::Daily,
        Section::Alerts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Current => "current",
            Section::Minutely => "minutely",
            Section::Hourly => "hourly",
            Section::Daily => "daily",
            Section::Alerts => "alerts",
        }
    }
}

/// Where a query points: coordinates or a place name still to be geocoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Coordinates(Coordinate),
    Place(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherQuery {
    pub target: Target,
    pub units: Units,
    pub lang: String,
}

impl WeatherQuery {
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            target: Target::Coordinates(coordinate),
            units: Units::default(),
            lang: DEFAULT_LANG.to_string(),
        }
    }

    pub fn place(name: impl Into<String>) -> Self {
        Self {
            target: Target::Place(name.into()),
            units: Units::default(),
            lang: DEFAULT_LANG.to_string(),
        }
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Build a query from loosely-typed transport parameters.
    ///
    /// Exactly one of a coordinate pair or a place name must be given.
    /// Coordinates are range-checked here; place names are checked after
    /// geocoding.
    pub fn from_parts(
        latitude: Option<f64>,
        longitude: Option<f64>,
        location: Option<&str>,
        units: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Self> {
        let location = location.map(str::trim).filter(|l| !l.is_empty());

        let target = match (latitude, longitude, location) {
            (None, None, Some(place)) => Target::Place(place.to_string()),
            (Some(lat), Some(lon), None) => Target::Coordinates(Coordinate::new(lat, lon)?),
            (None, None, None) => {
                return Err(WeatherError::Validation(
                    "Either 'location' or both 'latitude' and 'longitude' must be provided"
                        .to_string(),
                ));
            }
            (_, _, Some(_)) => {
                return Err(WeatherError::Validation(
                    "Provide either 'location' or coordinates, not both".to_string(),
                ));
            }
            _ => {
                return Err(WeatherError::Validation(
                    "Both 'latitude' and 'longitude' are required".to_string(),
                ));
            }
        };

        let units = match units.map(str::trim).filter(|u| !u.is_empty()) {
            Some(u) => Units::try_from(u)?,
            None => Units::default(),
        };

        let lang = lang
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANG)
            .to_string();

        Ok(Self { target, units, lang })
    }
}

/// Single weather-condition descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: Option<i64>,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            id: None,
            main: NOT_AVAILABLE.to_string(),
            description: NOT_AVAILABLE.to_string(),
            icon: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Placeholder for descriptive text the provider did not supply.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub timestamp: Option<i64>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub pressure: Option<i64>,
    pub humidity: Option<i64>,
    pub dew_point: Option<f64>,
    pub uvi: Option<f64>,
    pub clouds: Option<i64>,
    pub visibility: Option<i64>,
    pub wind_speed: Option<f64>,
    pub wind_deg: Option<i64>,
    pub weather: Condition,
}

/// Current-only answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: LocationInfo,
    pub current: CurrentConditions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    pub dt: Option<i64>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub pressure: Option<i64>,
    pub humidity: Option<i64>,
    pub dew_point: Option<f64>,
    pub uvi: Option<f64>,
    pub clouds: Option<i64>,
    pub visibility: Option<i64>,
    pub wind_speed: Option<f64>,
    pub wind_deg: Option<i64>,
    pub wind_gust: Option<f64>,
    /// Probability of precipitation, 0..=1.
    pub pop: Option<f64>,
    pub rain: Option<f64>,
    pub snow: Option<f64>,
    pub weather: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTemperature {
    pub day: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub night: Option<f64>,
    pub eve: Option<f64>,
    pub morn: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFeelsLike {
    pub day: Option<f64>,
    pub night: Option<f64>,
    pub eve: Option<f64>,
    pub morn: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub dt: Option<i64>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
    pub summary: String,
    pub temp: DailyTemperature,
    pub feels_like: DailyFeelsLike,
    pub pressure: Option<i64>,
    pub humidity: Option<i64>,
    pub dew_point: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_deg: Option<i64>,
    pub wind_gust: Option<f64>,
    pub clouds: Option<i64>,
    pub uvi: Option<f64>,
    pub pop: Option<f64>,
    pub rain: f64,
    pub snow: f64,
    pub weather: Condition,
}

/// Current conditions plus hourly and daily outlook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub location: LocationInfo,
    pub timezone: String,
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyEntry>,
    pub daily: Vec<DailyEntry>,
}
