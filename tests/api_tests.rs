//! HTTP API tests driving the full router in-process.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use vpp_dispatch::api;
use vpp_dispatch::config::Config;
use vpp_dispatch::controller::AppState;
use vpp_dispatch::domain::{BatteryFleet, BatterySpec};
use vpp_dispatch::forecast::InMemoryForecastStore;
use vpp_dispatch::optimizer::{DispatchOptimizer, DispatchSettings};

fn test_app() -> Router {
    let cfg = Config::default();
    let fleet = BatteryFleet::from_specs(&[BatterySpec {
        capacity_kwh: 10.0,
        current_soc_kwh: 5.0,
        max_charge_kw: 2.0,
        max_discharge_kw: 2.0,
        round_trip_efficiency: 0.95,
        ..Default::default()
    }])
    .unwrap();
    let state = AppState::from_parts(
        cfg.clone(),
        fleet,
        Arc::new(InMemoryForecastStore::new()),
        DispatchOptimizer::with_default_solver(DispatchSettings::default()),
    );
    api::router(state, &cfg)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn hourly(values: &[f64]) -> Value {
    Value::Array(
        values
            .iter()
            .enumerate()
            .map(|(h, v)| json!({"timestamp": format!("2025-07-01T{h:02}:00:00Z"), "value": v}))
            .collect(),
    )
}

#[tokio::test]
async fn health_reports_components() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;

    if cfg!(feature = "optimization") {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
    assert_eq!(body["checks"]["controller"]["detail"], "1 batteries");
}

#[tokio::test]
async fn battery_lifecycle() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/api/batteries", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["batteries"][0]["id"], "battery_1");

    let (status, body) = send(
        &app,
        "POST",
        "/api/batteries",
        Some(json!({
            "capacity_kwh": 13.5,
            "current_soc_kwh": 20.0,
            "max_charge_kw": 5.0,
            "max_discharge_kw": 5.0,
            "round_trip_efficiency": 0.9
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "battery_2");
    // SOC is clamped into capacity
    assert_eq!(body["current_soc_kwh"], 13.5);

    let (status, _) = send(&app, "DELETE", "/api/batteries/battery_2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", "/api/batteries/battery_2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn invalid_battery_is_rejected() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/batteries",
        Some(json!({
            "capacity_kwh": 10.0,
            "max_charge_kw": 2.0,
            "max_discharge_kw": 2.0,
            "round_trip_efficiency": 1.5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn manual_charge_and_discharge() {
    let app = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/batteries/battery_1/charge",
        Some(json!({"power_kw": 5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // clamped to max_charge_kw
    let actual = body["actual_power_kw"].as_f64().unwrap();
    assert!((actual - 2.0).abs() < 1e-9);
    let soc = body["battery"]["current_soc_kwh"].as_f64().unwrap();
    assert!((soc - 6.9).abs() < 1e-9);

    let (status, body) = send(
        &app,
        "POST",
        "/api/batteries/battery_1/discharge",
        Some(json!({"power_kw": 1.0, "duration_h": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn forecast_ingest_and_query() {
    let app = test_app();

    let (status, body) = send(
        &app,
        "PUT",
        "/api/forecasted/solar/pv_east",
        Some(hourly(&[0.0, 2.0, 4.0])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stored"], 3);
    send(&app, "PUT", "/api/forecasted/solar/pv_west", Some(hourly(&[1.0, 1.0, 1.0]))).await;

    let (status, body) = send(&app, "GET", "/api/forecasted/solar", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"][2]["value"], 5.0);

    let (status, body) = send(
        &app,
        "GET",
        "/api/forecasted/solar?source_id=pv_east&start=2025-07-01T01:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/api/device-status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"solar": 2, "wind": 0}));

    let (status, _) = send(&app, "GET", "/api/forecasted/coal", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/forecasted/wind", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn source_ids_are_listed_per_kind() {
    let app = test_app();
    send(&app, "PUT", "/api/forecasted/wind/turbine_b", Some(hourly(&[1.0]))).await;
    send(&app, "PUT", "/api/forecasted/wind/turbine_a", Some(hourly(&[2.0]))).await;
    send(&app, "PUT", "/api/forecasted/solar/pv", Some(hourly(&[3.0]))).await;

    let (status, body) = send(&app, "GET", "/api/source-ids/wind", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["turbine_a", "turbine_b"]));

    let (status, body) = send(&app, "GET", "/api/source-ids/load", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, "GET", "/api/source-ids/coal", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadRequest");
}

#[tokio::test]
async fn optimize_without_forecasts_is_not_found() {
    let app = test_app();

    let (status, body) = send(&app, "POST", "/api/optimize", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");

    let (status, _) = send(&app, "GET", "/api/optimize/last", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn optimize_rejects_misaligned_frame() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/optimize",
        Some(json!({
            "frame": {
                "solar": hourly(&[1.0, 2.0]),
                "wind": hourly(&[0.0, 0.0]),
                "load": hourly(&[1.0]),
                "price": hourly(&[10.0, 10.0])
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("load"));
}

#[cfg(feature = "optimization")]
#[tokio::test]
async fn optimize_from_store_and_read_back() {
    let app = test_app();
    send(&app, "PUT", "/api/forecasted/solar/pv", Some(hourly(&[0.0, 10.0, 0.0]))).await;
    send(&app, "PUT", "/api/forecasted/load/house", Some(hourly(&[0.0, 0.0, 3.0]))).await;
    send(&app, "PUT", "/api/forecasted/market/spot", Some(hourly(&[50.0, 10.0, 100.0]))).await;

    let (status, body) = send(&app, "POST", "/api/optimize", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "optimal");
    assert_eq!(body["applied"], 1);
    assert_eq!(body["rows"].as_array().unwrap().len(), 3);
    let final_soc = body["final_soc"][0][1].as_f64().unwrap();

    let (status, battery) = send(&app, "GET", "/api/batteries/battery_1", None).await;
    assert_eq!(status, StatusCode::OK);
    let soc = battery["current_soc_kwh"].as_f64().unwrap();
    assert!((soc - final_soc).abs() < 1e-9);

    let (status, last) = send(&app, "GET", "/api/optimize/last", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(last["run_id"], body["run_id"]);
}

#[cfg(feature = "optimization")]
#[tokio::test]
async fn optimize_with_explicit_rows() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/optimize",
        Some(json!({
            "frame": [
                {"time": "2025-07-01T00:00:00Z", "solar": 5, "wind": 0, "load": 8, "price": 20}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let cost = body["total_cost"].as_f64().unwrap();
    assert!((cost - 60.0).abs() < 1e-6);
    assert_eq!(body["rows"][0]["battery_id"], "battery_1");
    let soc = body["rows"][0]["soc"].as_f64().unwrap();
    assert!((soc - 5.0).abs() < 1e-6);
}
