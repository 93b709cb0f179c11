use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_core::{ServiceConfig, WeatherService};
use weather_server::http::{AppState, router};

const ONECALL: &str = "/data/3.0/onecall";
const DIRECT: &str = "/geo/1.0/direct";

fn app_for(server: &MockServer) -> Router {
    let config = ServiceConfig::for_provider("TEST_KEY", &server.uri());
    let service = WeatherService::from_config(&config).expect("service builds");
    router(AppState::new(Arc::new(service), "test"))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(request).await.expect("router answers");
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn one_call(weather: Value) -> Value {
    json!({
        "lat": 40.7128,
        "lon": -74.006,
        "timezone": "America/New_York",
        "current": {
            "dt": 1_700_000_000,
            "temp": 12.3,
            "feels_like": 11.0,
            "humidity": 60,
            "weather": weather
        }
    })
}

#[tokio::test]
async fn current_weather_by_coordinates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL))
        .and(query_param("lat", "40.7128"))
        .and(query_param("lon", "-74.006"))
        .and(query_param("units", "metric"))
        .and(query_param("exclude", "minutely,hourly,daily,alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_call(json!([
            {"id": 801, "main": "Clouds", "description": "few clouds", "icon": "02d"}
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        app_for(&server),
        get("/weather?latitude=40.7128&longitude=-74.0060&units=metric"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["error"], Value::Null);
    assert_eq!(body["data"]["current"]["weather"]["description"], "few clouds");
    assert_eq!(body["data"]["current"]["weather"]["id"], 801);
    assert_eq!(body["data"]["location"]["timezone"], "America/New_York");
}

#[tokio::test]
async fn empty_condition_list_still_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_call(json!([]))))
        .mount(&server)
        .await;

    let (status, body) = send(
        app_for(&server),
        get("/weather?latitude=40.7128&longitude=-74.0060&units=metric"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current"]["weather"]["description"], "N/A");
    assert_eq!(body["data"]["current"]["weather"]["id"], Value::Null);
}

#[tokio::test]
async fn unknown_place_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECT))
        .and(query_param("q", "Nonexistent Place XYZ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ONECALL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let (status, body) = send(
        app_for(&server),
        get("/weather?location=Nonexistent%20Place%20XYZ"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["error"], "Location 'Nonexistent Place XYZ' not found");
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_outbound_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    for uri in [
        "/weather?latitude=95&longitude=0",
        "/weather?lat=0&lon=-181",
        "/weather?latitude=north&longitude=0",
        "/weather?latitude=10",
        "/weather",
        "/weather?latitude=1&longitude=2&location=Paris",
        "/weather?location=Paris&units=furlongs",
        "/forecast?latitude=-91&longitude=0",
    ] {
        let (status, body) = send(app_for(&server), get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], false, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn post_weather_reads_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL))
        .and(query_param("units", "imperial"))
        .and(query_param("lang", "fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_call(json!([
            {"id": 500, "main": "Rain", "description": "pluie légère", "icon": "10d"}
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        app_for(&server),
        post_json(
            "/weather",
            r#"{"lat": 40.7128, "lon": -74.006, "units": "imperial", "lang": "fr"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current"]["weather"]["description"], "pluie légère");
}

#[tokio::test]
async fn malformed_post_body_is_bad_request() {
    let server = MockServer::start().await;

    let (status, body) = send(app_for(&server), post_json("/weather", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unformatted_weather_returns_provider_document() {
    let server = MockServer::start().await;
    let raw = one_call(json!([{"id": 800}]));
    Mock::given(method("GET"))
        .and(path(ONECALL))
        .respond_with(ResponseTemplate::new(200).set_body_json(raw.clone()))
        .mount(&server)
        .await;

    let (status, body) = send(
        app_for(&server),
        get("/weather?latitude=40.7128&longitude=-74.006&formatted=false"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], raw);
}

#[tokio::test]
async fn forecast_is_bounded() {
    let server = MockServer::start().await;
    let hourly: Vec<Value> = (0..60).map(|i| json!({"dt": i})).collect();
    let daily: Vec<Value> = (0..10).map(|i| json!({"dt": i})).collect();
    Mock::given(method("GET"))
        .and(path(ONECALL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "timezone": "UTC", "hourly": hourly, "daily": daily
        })))
        .mount(&server)
        .await;

    let (status, body) = send(app_for(&server), get("/forecast?lat=0&lon=0")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hourly"].as_array().unwrap().len(), 48);
    assert_eq!(body["data"]["daily"].as_array().unwrap().len(), 8);
    assert_eq!(body["data"]["daily"][7]["dt"], 7);
}

#[tokio::test]
async fn provider_failures_map_to_status() {
    for (upstream, expected) in [
        (401, StatusCode::UNAUTHORIZED),
        (429, StatusCode::TOO_MANY_REQUESTS),
        (503, StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ONECALL))
            .respond_with(ResponseTemplate::new(upstream).set_body_string("upstream says no"))
            .mount(&server)
            .await;

        let (status, body) = send(app_for(&server), get("/weather?lat=1&lon=1")).await;

        assert_eq!(status, expected, "upstream {upstream}");
        assert_eq!(body["success"], false);
        let message = body["error"].as_str().unwrap();
        assert!(!message.contains("TEST_KEY"), "key leaked: {message}");
    }
}

#[tokio::test]
async fn health_and_metadata() {
    let server = MockServer::start().await;

    let (status, body) = send(app_for(&server), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "environment": "test"}));

    let (status, body) = send(app_for(&server), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["environment"], "test");
    assert!(body["endpoints"]["forecast"].is_string());
}

#[tokio::test]
async fn mcp_endpoint_dispatches_tool_calls_in_process() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (status, body) = send(
        app_for(&server),
        post_json(
            "/mcp",
            r#"{"jsonrpc":"2.0","id":"q1","method":"tools/call","params":{"name":"get_current_weather","arguments":{"location":"Nonexistent Place XYZ"}}}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "q1");
    assert_eq!(body["error"]["code"], -32001);

    let (status, body) = send(
        app_for(&server),
        post_json("/mcp", r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
}
