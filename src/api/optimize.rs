use axum::{body::Bytes, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::ApiError;
use crate::{
    controller::{AppState, DispatchRequest, DispatchRun},
    domain::{AlignedForecastFrame, ForecastColumns, ForecastStep, FrameError, TimeRange},
    optimizer::OptimizerError,
};

/// Forecast frame as rows or as columns
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FrameInput {
    Rows(Vec<ForecastStep>),
    Columns(ForecastColumns),
}

impl FrameInput {
    pub fn into_frame(self) -> Result<AlignedForecastFrame, FrameError> {
        match self {
            FrameInput::Rows(steps) => AlignedForecastFrame::new(steps),
            FrameInput::Columns(columns) => AlignedForecastFrame::from_columns(columns),
        }
    }
}

/// Request to run the dispatch optimizer
///
/// Without a frame, forecasts between `start` and `end` are aggregated from the store.
#[derive(Debug, Default, Deserialize)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub frame: Option<FrameInput>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// POST /api/optimize
pub async fn run_optimization(
    State(st): State<AppState>,
    body: Bytes,
) -> Result<Json<DispatchRun>, ApiError> {
    let request: OptimizeRequest = if body.iter().all(u8::is_ascii_whitespace) {
        OptimizeRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let frame = request
        .frame
        .map(FrameInput::into_frame)
        .transpose()
        .map_err(OptimizerError::from)?;

    tracing::info!(
        explicit_frame = frame.is_some(),
        start = ?request.start,
        end = ?request.end,
        "Triggering dispatch optimization"
    );

    let run = st
        .controller
        .run_dispatch(DispatchRequest {
            frame,
            range: TimeRange {
                start: request.start,
                end: request.end,
            },
        })
        .await?;
    Ok(Json(run))
}

/// GET /api/optimize/last
pub async fn last_optimization(State(st): State<AppState>) -> Result<Json<DispatchRun>, ApiError> {
    st.controller
        .last_run()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No dispatch run yet".to_string()))
}
