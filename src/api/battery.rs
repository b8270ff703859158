//! Battery fleet endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ApiError;
use crate::{
    controller::{AppState, StepOutcome},
    domain::{Battery, BatteryId, BatterySpec},
};

#[derive(Debug, Serialize)]
pub struct BatteryList {
    pub count: usize,
    pub batteries: Vec<Battery>,
}

/// GET /api/batteries
pub async fn list_batteries(State(st): State<AppState>) -> Json<BatteryList> {
    let batteries = st.controller.list_batteries().await;
    Json(BatteryList {
        count: batteries.len(),
        batteries,
    })
}

/// POST /api/batteries
pub async fn create_battery(
    State(st): State<AppState>,
    Json(spec): Json<BatterySpec>,
) -> Result<(StatusCode, Json<Battery>), ApiError> {
    spec.validate()?;
    let battery = st.controller.add_battery(spec).await?;
    Ok((StatusCode::CREATED, Json(battery)))
}

/// GET /api/batteries/:id
pub async fn get_battery(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Battery>, ApiError> {
    Ok(Json(st.controller.get_battery(&BatteryId::new(id)).await?))
}

/// DELETE /api/batteries/:id
pub async fn delete_battery(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    st.controller.remove_battery(&BatteryId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn default_duration_h() -> f64 {
    1.0
}

/// Manual charge or discharge command
#[derive(Debug, Deserialize, Validate)]
pub struct PowerStepRequest {
    /// Negative power is treated as zero.
    pub power_kw: f64,
    #[serde(default = "default_duration_h")]
    #[validate(range(exclusive_min = 0.0))]
    pub duration_h: f64,
}

/// POST /api/batteries/:id/charge
pub async fn charge_battery(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PowerStepRequest>,
) -> Result<Json<StepOutcome>, ApiError> {
    req.validate()?;
    let outcome = st
        .controller
        .charge_battery(&BatteryId::new(id), req.power_kw, req.duration_h)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/batteries/:id/discharge
pub async fn discharge_battery(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PowerStepRequest>,
) -> Result<Json<StepOutcome>, ApiError> {
    req.validate()?;
    let outcome = st
        .controller
        .discharge_battery(&BatteryId::new(id), req.power_kw, req.duration_h)
        .await?;
    Ok(Json(outcome))
}
