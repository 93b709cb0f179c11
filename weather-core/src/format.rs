//! Reshapes a raw One Call document into the stable output schema.
//!
//! The provider document is untrusted: any field may be missing, null, of
//! the wrong type, or an empty array. All reads go through [`Field`], which
//! turns every one of those cases into a neutral default, so both
//! formatters are total over arbitrary JSON input.

use serde_json::Value;

use crate::model::{
    Condition, CurrentConditions, DailyEntry, DailyFeelsLike, DailyTemperature, ForecastBundle,
    HourlyEntry, LocationInfo, MAX_DAILY, MAX_HOURLY, NOT_AVAILABLE, WeatherReport,
};

/// Optional view into a JSON document.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a>(Option<&'a Value>);

impl<'a> Field<'a> {
    pub fn root(value: &'a Value) -> Self {
        Field(Some(value))
    }

    /// Child by key; absent unless `self` is an object holding `key`.
    pub fn get(self, key: &str) -> Field<'a> {
        Field(self.0.and_then(|v| v.get(key)))
    }

    pub fn f64(self) -> Option<f64> {
        self.0.and_then(Value::as_f64)
    }

    /// Integer read that also accepts floats, rounding them.
    pub fn i64(self) -> Option<i64> {
        let value = self.0?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
    }

    pub fn str_or(self, default: &str) -> String {
        self.0
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Elements of an array; empty for anything that is not an array.
    pub fn items(self) -> &'a [Value] {
        self.0
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First element of an array, absent when the array is missing or empty.
    pub fn first(self) -> Field<'a> {
        Field(self.items().first())
    }
}

/// Format a current-only document.
pub fn format_current(raw: &Value) -> WeatherReport {
    let root = Field::root(raw);

    WeatherReport {
        location: location(root),
        current: current_conditions(root.get("current")),
    }
}

/// Format a full document: current conditions plus hourly and daily outlook.
pub fn format_forecast(raw: &Value) -> ForecastBundle {
    let root = Field::root(raw);

    ForecastBundle {
        location: location(root),
        timezone: root.get("timezone").str_or(NOT_AVAILABLE),
        current: current_conditions(root.get("current")),
        hourly: root
            .get("hourly")
            .items()
            .iter()
            .take(MAX_HOURLY)
            .map(|hour| hourly_entry(Field::root(hour)))
            .collect(),
        daily: root
            .get("daily")
            .items()
            .iter()
            .take(MAX_DAILY)
            .map(|day| daily_entry(Field::root(day)))
            .collect(),
    }
}

/// First condition descriptor of a `weather` array, or the default one.
fn condition(weather: Field<'_>) -> Condition {
    let first = weather.first();
    if first.0.is_none() {
        return Condition::default();
    }

    Condition {
        id: first.get("id").i64(),
        main: first.get("main").str_or(NOT_AVAILABLE),
        description: first.get("description").str_or(NOT_AVAILABLE),
        icon: first.get("icon").str_or(NOT_AVAILABLE),
    }
}

fn location(root: Field<'_>) -> LocationInfo {
    LocationInfo {
        latitude: root.get("lat").f64(),
        longitude: root.get("lon").f64(),
        timezone: root.get("timezone").str_or(NOT_AVAILABLE),
    }
}

fn current_conditions(current: Field<'_>) -> CurrentConditions {
    CurrentConditions {
        timestamp: current.get("dt").i64(),
        temperature: current.get("temp").f64(),
        feels_like: current.get("feels_like").f64(),
        pressure: current.get("pressure").i64(),
        humidity: current.get("humidity").i64(),
        dew_point: current.get("dew_point").f64(),
        uvi: current.get("uvi").f64(),
        clouds: current.get("clouds").i64(),
        visibility: current.get("visibility").i64(),
        wind_speed: current.get("wind_speed").f64(),
        wind_deg: current.get("wind_deg").i64(),
        weather: condition(current.get("weather")),
    }
}

fn hourly_entry(hour: Field<'_>) -> HourlyEntry {
    HourlyEntry {
        dt: hour.get("dt").i64(),
        temperature: hour.get("temp").f64(),
        feels_like: hour.get("feels_like").f64(),
        pressure: hour.get("pressure").i64(),
        humidity: hour.get("humidity").i64(),
        dew_point: hour.get("dew_point").f64(),
        uvi: hour.get("uvi").f64(),
        clouds: hour.get("clouds").i64(),
        visibility: hour.get("visibility").i64(),
        wind_speed: hour.get("wind_speed").f64(),
        wind_deg: hour.get("wind_deg").i64(),
        wind_gust: hour.get("wind_gust").f64(),
        pop: hour.get("pop").f64(),
        // hourly precipitation is reported as {"1h": mm}
        rain: hour.get("rain").get("1h").f64(),
        snow: hour.get("snow").get("1h").f64(),
        weather: condition(hour.get("weather")),
    }
}

fn daily_entry(day: Field<'_>) -> DailyEntry {
    let temp = day.get("temp");
    let feels_like = day.get("feels_like");

    DailyEntry {
        dt: day.get("dt").i64(),
        sunrise: day.get("sunrise").i64(),
        sunset: day.get("sunset").i64(),
        summary: day.get("summary").str_or(NOT_AVAILABLE),
        temp: DailyTemperature {
            day: temp.get("day").f64(),
            min: temp.get("min").f64(),
            max: temp.get("max").f64(),
            night: temp.get("night").f64(),
            eve: temp.get("eve").f64(),
            morn: temp.get("morn").f64(),
        },
        feels_like: DailyFeelsLike {
            day: feels_like.get("day").f64(),
            night: feels_like.get("night").f64(),
            eve: feels_like.get("eve").f64(),
            morn: feels_like.get("morn").f64(),
        },
        pressure: day.get("pressure").i64(),
        humidity: day.get("humidity").i64(),
        dew_point: day.get("dew_point").f64(),
        wind_speed: day.get("wind_speed").f64(),
        wind_deg: day.get("wind_deg").i64(),
        wind_gust: day.get("wind_gust").f64(),
        clouds: day.get("clouds").i64(),
        uvi: day.get("uvi").f64(),
        pop: day.get("pop").f64(),
        rain: day.get("rain").f64().unwrap_or(0.0),
        snow: day.get("snow").f64().unwrap_or(0.0),
        weather: condition(day.get("weather")),
    }
}
