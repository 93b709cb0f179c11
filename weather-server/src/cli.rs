use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use inquire::Password;
use std::{path::PathBuf, sync::Arc};

use weather_core::{
    Config, ForecastBundle, ServiceConfig, Units, WeatherQuery, WeatherReport, WeatherService,
    config::{DEFAULT_HOST, DEFAULT_PORT},
};
use weather_server::{
    backend::{LoopbackBackend, ToolBackend},
    bridge::Bridge,
    http::{self, AppState},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-server",
    version,
    about = "Weather proxy over HTTP and stdio JSON-RPC"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "WEATHER_SERVER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// HTTP API only.
    Http,
    /// JSON-RPC on stdin/stdout, backed by the HTTP API on a background thread.
    Stdio,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    #[arg(long, env = "MCP_SERVER_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "MCP_SERVER_PORT")]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct ProviderArgs {
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "OPENWEATHER_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "OPENWEATHER_GEOCODING_URL")]
    pub geocoding_url: Option<String>,

    /// Timeout for provider requests, in seconds.
    #[arg(long, env = "OPENWEATHER_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, env = "ENVIRONMENT")]
    pub environment: Option<String>,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Place name, used instead of --lat/--lon.
    #[arg(long)]
    pub location: Option<String>,

    /// metric, imperial or standard.
    #[arg(long)]
    pub units: Option<String>,

    #[arg(long)]
    pub lang: Option<String>,

    #[command(flatten)]
    pub server: ListenArgs,
}

impl QueryArgs {
    fn to_query(&self) -> weather_core::Result<WeatherQuery> {
        WeatherQuery::from_parts(
            self.lat,
            self.lon,
            self.location.as_deref(),
            self.units.as_deref(),
            self.lang.as_deref(),
        )
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the server.
    Serve {
        #[arg(long, value_enum, env = "MCP_MODE", default_value_t = Mode::Http)]
        mode: Mode,

        /// Seconds to wait for the HTTP listener before starting the stdio loop.
        #[arg(long, env = "MCP_SERVER_STARTUP_WAIT")]
        startup_wait: Option<f64>,

        #[command(flatten)]
        listen: ListenArgs,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Ask a running server for current conditions.
    Current(QueryArgs),

    /// Ask a running server for the forecast.
    Forecast(QueryArgs),

    /// Store the OpenWeatherMap API key in the config file.
    Configure,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let config_path = self.config;

        match self.command {
            Command::Serve {
                mode,
                startup_wait,
                listen,
                provider,
            } => {
                let overrides = Config {
                    api_key: provider.api_key,
                    base_url: provider.base_url,
                    geocoding_url: provider.geocoding_url,
                    host: listen.host,
                    port: listen.port,
                    environment: provider.environment,
                    startup_wait_secs: startup_wait,
                    request_timeout_secs: provider.request_timeout_secs,
                };
                let config = load_config(config_path.as_ref())?.merge(overrides);
                serve(mode, &config)
            }
            Command::Current(args) => {
                let config = load_config(config_path.as_ref())?;
                let query = args.to_query()?;
                let report: WeatherReport = fetch(&config, &args.server, &query, false)?;
                print!("{}", describe_current(&report, query.units));
                Ok(())
            }
            Command::Forecast(args) => {
                let config = load_config(config_path.as_ref())?;
                let query = args.to_query()?;
                let bundle: ForecastBundle = fetch(&config, &args.server, &query, true)?;
                print!("{}", describe_forecast(&bundle, query.units));
                Ok(())
            }
            Command::Configure => configure(config_path),
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn serve(mode: Mode, config: &Config) -> Result<()> {
    let default_host = match mode {
        Mode::Http => DEFAULT_HOST,
        Mode::Stdio => "127.0.0.1",
    };
    let settings = config.resolve(default_host)?;
    let service = WeatherService::from_config(&settings)?;
    let state = AppState::new(Arc::new(service), settings.environment.clone());

    tracing::info!(?mode, environment = %settings.environment, "starting weather server");

    match mode {
        Mode::Http => serve_http(&settings, state),
        Mode::Stdio => Bridge::new(settings).run_stdio(state).map_err(Into::into),
    }
}

fn serve_http(settings: &ServiceConfig, state: AppState) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to build tokio runtime")?;

    runtime.block_on(async {
        let addr = settings.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP listener on {addr}"))?;

        tracing::info!(addr = %listener.local_addr()?, "HTTP API listening");

        http::serve(listener, state, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
        })
        .await
        .context("HTTP server failed")
    })
}

fn fetch<T: serde::de::DeserializeOwned>(
    config: &Config,
    server: &ListenArgs,
    query: &WeatherQuery,
    forecast: bool,
) -> Result<T> {
    let host = server
        .host
        .clone()
        .or_else(|| config.host.clone())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = server.port.or(config.port).unwrap_or(DEFAULT_PORT);

    let backend = match format!("{host}:{port}").parse() {
        Ok(addr) => LoopbackBackend::for_addr(addr)?,
        Err(_) => LoopbackBackend::new(format!("http://{host}:{port}"))?,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to build tokio runtime")?;
    let payload = runtime.block_on(async {
        if forecast {
            backend.forecast(query).await
        } else {
            backend.current_weather(query).await
        }
    })?;

    serde_json::from_value(payload).context("Server answered with an unexpected payload")
}

fn configure(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::config_file_path()?,
    };

    let mut config = if path.exists() {
        Config::load_from(&path)?
    } else {
        Config::default()
    };

    let api_key = Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.set_api_key(api_key.trim().to_string());
    config.save_to(&path)?;

    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn temperature_unit(units: Units) -> &'static str {
    match units {
        Units::Metric => "°C",
        Units::Imperial => "°F",
        Units::Standard => "K",
    }
}

fn timestamp(ts: Option<i64>, pattern: &str) -> String {
    ts.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|dt| dt.format(pattern).to_string())
        .unwrap_or_else(|| "unknown time".to_string())
}

fn reading(value: Option<f64>) -> String {
    value.map_or_else(|| "?".to_string(), |v| format!("{v:.1}"))
}

pub fn describe_current(report: &WeatherReport, units: Units) -> String {
    let current = &report.current;
    let degree = temperature_unit(units);
    let mut out = format!(
        "Weather at {}, {} ({})\n",
        reading(report.location.latitude),
        reading(report.location.longitude),
        report.location.timezone
    );
    out.push_str(&format!(
        "  {}: {}\n",
        timestamp(current.timestamp, "%Y-%m-%d %H:%M UTC"),
        current.weather.description
    ));
    out.push_str(&format!(
        "  temperature {}{degree} (feels like {}{degree}), humidity {}%\n",
        reading(current.temperature),
        reading(current.feels_like),
        current.humidity.map_or_else(|| "?".to_string(), |h| h.to_string())
    ));
    let speed = if units == Units::Imperial { "mph" } else { "m/s" };
    out.push_str(&format!("  wind {} {speed}\n", reading(current.wind_speed)));
    out
}

/// One line per day: date, min / max, description, chance of precipitation.
pub fn describe_forecast(bundle: &ForecastBundle, units: Units) -> String {
    let degree = temperature_unit(units);
    let mut out = format!("Forecast for {}\n", bundle.timezone);
    for day in &bundle.daily {
        out.push_str(&format!(
            "  {}  {}{degree} / {}{degree}  {}  ({:.0}% precipitation)\n",
            timestamp(day.dt, "%a %Y-%m-%d"),
            reading(day.temp.min),
            reading(day.temp.max),
            day.weather.description,
            day.pop.unwrap_or(0.0) * 100.0
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::try_parse_from([
            "weather-server",
            "serve",
            "--mode",
            "stdio",
            "--port",
            "9001",
            "--api-key",
            "abc",
        ])
        .unwrap();

        match cli.command {
            Command::Serve { mode, listen, provider, .. } => {
                assert_eq!(mode, Mode::Stdio);
                assert_eq!(listen.port, Some(9001));
                assert_eq!(provider.api_key.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn client_accepts_negative_coordinates() {
        let cli =
            Cli::try_parse_from(["weather-server", "current", "--lat", "-33.86", "--lon", "151.2"])
                .unwrap();

        match cli.command {
            Command::Current(args) => {
                assert_eq!(args.lat, Some(-33.86));
                assert_eq!(args.lon, Some(151.2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn forecast_summary_lists_days() {
        let bundle = weather_core::format_forecast(&json!({
            "timezone": "Europe/Vienna",
            "daily": [
                {"dt": 1_700_000_000, "temp": {"min": 3.2, "max": 9.8}, "pop": 0.4,
                 "weather": [{"description": "light rain"}]}
            ]
        }));

        let text = describe_forecast(&bundle, Units::Metric);
        assert!(text.starts_with("Forecast for Europe/Vienna"));
        assert!(text.contains("2023-11-14"));
        assert!(text.contains("3.2°C / 9.8°C"));
        assert!(text.contains("light rain"));
        assert!(text.contains("40% precipitation"));
    }

    #[test]
    fn current_summary_tolerates_missing_fields() {
        let report = weather_core::format_current(&json!({}));
        let text = describe_current(&report, Units::Imperial);

        assert!(text.contains("unknown time"));
        assert!(text.contains("N/A"));
        assert!(text.contains("mph"));
    }
}
