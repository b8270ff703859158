use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::time::Instant;

use crate::controller::AppState;
use crate::domain::SourceType;
use crate::forecast::ForecastStore;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    controller: ComponentHealth,
    forecast_store: ComponentHealth,
    solver: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64, detail: String) -> Self {
        Self {
            status: "healthy".to_string(),
            latency_ms: Some(latency_ms),
            detail: Some(detail),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            latency_ms: None,
            detail: None,
            error: Some(error),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let controller = check_controller(&state).await;
    let forecast_store = check_forecast_store(&state).await;
    let solver = check_solver(&state);

    let all_healthy = controller.is_healthy() && forecast_store.is_healthy() && solver.is_healthy();

    let response = HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            controller,
            forecast_store,
            solver,
        },
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(healthy = all_healthy, "Health check completed");
    (status_code, Json(response))
}

async fn check_controller(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    let batteries = state.controller.list_batteries().await.len();
    ComponentHealth::healthy(
        start.elapsed().as_millis() as u64,
        format!("{batteries} batteries"),
    )
}

async fn check_forecast_store(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    match state.controller.store().source_ids(SourceType::Market).await {
        Ok(ids) => ComponentHealth::healthy(
            start.elapsed().as_millis() as u64,
            format!("{} market sources", ids.len()),
        ),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    }
}

fn check_solver(state: &AppState) -> ComponentHealth {
    if cfg!(feature = "optimization") {
        ComponentHealth::healthy(0, state.controller.solver_name().to_string())
    } else {
        ComponentHealth::unhealthy("built without the 'optimization' feature".to_string())
    }
}
