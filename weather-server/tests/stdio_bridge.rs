//! Stdio mode end to end: JSON-RPC lines in, tool calls looped back through
//! a real HTTP listener on an ephemeral port, provider stubbed by wiremock.

use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_core::{ServiceConfig, WeatherService};
use weather_server::{
    bridge::{Bridge, BridgeError},
    http::AppState,
};

fn state_for(config: &ServiceConfig) -> AppState {
    let service = WeatherService::from_config(config).expect("service builds");
    AppState::new(Arc::new(service), "test")
}

fn run_bridge(config: ServiceConfig, input: &str) -> Result<Vec<Value>, BridgeError> {
    let state = state_for(&config);
    let mut out = Vec::new();
    Bridge::new(config).run(state, input.as_bytes(), &mut out)?;

    Ok(String::from_utf8(out)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("every output line is JSON"))
        .collect())
}

fn stub_provider(runtime: &tokio::runtime::Runtime) -> MockServer {
    runtime.block_on(async {
        let server = MockServer::start().await;

        let hourly: Vec<Value> = (0..50).map(|i| json!({"dt": i, "temp": 10.0})).collect();
        let daily: Vec<Value> = (0..9)
            .map(|i| json!({"dt": i, "temp": {"min": 1.0, "max": 5.0}}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall"))
            .and(query_param("lat", "40.7128"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "lat": 40.7128,
                "lon": -74.006,
                "timezone": "America/New_York",
                "current": {"temp": 12.0, "weather": []},
                "hourly": hourly,
                "daily": daily
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        server
    })
}

#[test]
fn forecast_tool_call_round_trips_through_http() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = stub_provider(&runtime);
    let config = ServiceConfig::for_provider("TEST_KEY", &server.uri());

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"get_forecast","arguments":{"latitude":40.7128,"longitude":-74.006}}}"#,
        "\n",
    );

    let out = run_bridge(config, input).expect("bridge runs");

    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["id"], 1);
    assert_eq!(out[1]["id"], 7);

    let text = out[1]["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    let forecast: Value = serde_json::from_str(text).expect("tool text is JSON");
    assert_eq!(forecast["daily"].as_array().unwrap().len(), 8);
    assert_eq!(forecast["hourly"].as_array().unwrap().len(), 48);
    assert_eq!(forecast["current"]["weather"]["description"], "N/A");
}

#[test]
fn failures_are_answered_and_the_loop_keeps_going() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = stub_provider(&runtime);
    let config = ServiceConfig::for_provider("TEST_KEY", &server.uri());

    let input = concat!(
        "this is not json\n",
        r#"{"jsonrpc":"2.0","id":"d","method":"tools/call","params":{"name":"get_current_weather","arguments":{"location":"Nonexistent Place XYZ"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":"v","method":"tools/call","params":{"name":"get_current_weather","arguments":{"latitude":95,"longitude":0}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#,
        "\n",
    );

    let out = run_bridge(config, input).expect("bridge runs");

    assert_eq!(out.len(), 4);
    assert_eq!(out[0]["id"], Value::Null);
    assert_eq!(out[0]["error"]["code"], -32700);

    assert_eq!(out[1]["id"], "d");
    assert_eq!(out[1]["error"]["code"], -32001);
    assert_eq!(
        out[1]["error"]["message"],
        "Location 'Nonexistent Place XYZ' not found"
    );

    assert_eq!(out[2]["id"], "v");
    assert_eq!(out[2]["error"]["code"], -32602);

    assert_eq!(out[3]["id"], "p");
    assert_eq!(out[3]["result"], json!({}));
}

#[test]
fn occupied_port_is_fatal_and_writes_nothing() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = ServiceConfig::for_provider("TEST_KEY", "http://127.0.0.1:9");
    config.port = taken.local_addr().unwrap().port();

    let state = state_for(&config);
    let mut out = Vec::new();
    let err = Bridge::new(config)
        .run(
            state,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n".as_bytes(),
            &mut out,
        )
        .unwrap_err();

    assert!(matches!(err, BridgeError::Startup { .. }), "got {err:?}");
    assert!(out.is_empty());
}

#[test]
fn bind_failure_after_startup_wait_is_still_fatal() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = ServiceConfig::for_provider("TEST_KEY", "http://127.0.0.1:9");
    config.port = taken.local_addr().unwrap().port();
    config.startup_wait = Duration::ZERO;

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        "\n",
    );

    let err = run_bridge(config, input).unwrap_err();
    assert!(matches!(err, BridgeError::Startup { .. }), "got {err:?}");
}

#[test]
fn slow_listener_start_is_tolerated() {
    // free port, released so the listener can take it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut config = ServiceConfig::for_provider("TEST_KEY", "http://127.0.0.1:9");
    config.port = port;
    config.startup_wait = Duration::ZERO;

    let out = run_bridge(config, "{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n")
        .expect("bridge continues without waiting");

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["id"], 3);
    assert_eq!(out[0]["result"], json!({}));
}
