use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::{
    controller::AppState,
    domain::{SeriesPoint, SourceType, TimeRange},
    forecast::ForecastStore,
};

fn parse_source(source: &str) -> Result<SourceType, ApiError> {
    source
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown forecast source '{source}'")))
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub source_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ForecastSeries {
    pub source: SourceType,
    /// `None` when summed over every source of the kind.
    pub source_id: Option<String>,
    pub points: Vec<SeriesPoint>,
}

/// GET /api/forecasted/:source
pub async fn get_forecast(
    State(st): State<AppState>,
    Path(source): Path<String>,
    Query(q): Query<ForecastQuery>,
) -> Result<Json<ForecastSeries>, ApiError> {
    let kind = parse_source(&source)?;
    let range = TimeRange {
        start: q.start,
        end: q.end,
    };

    let points = match &q.source_id {
        Some(id) => {
            let points = st.controller.store().load_forecast(kind, id, &range).await?;
            if points.is_empty() {
                return Err(ApiError::NotFound(format!("No {kind} forecast for source '{id}'")));
            }
            points
        }
        None => st
            .controller
            .aggregator()
            .aggregate(kind, &range)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No {kind} sources registered")))?,
    };

    Ok(Json(ForecastSeries {
        source: kind,
        source_id: q.source_id,
        points,
    }))
}

#[derive(Debug, Serialize)]
pub struct StoredForecast {
    pub source: SourceType,
    pub source_id: String,
    pub stored: usize,
}

/// PUT /api/forecasted/:source/:source_id
pub async fn put_forecast(
    State(st): State<AppState>,
    Path((source, source_id)): Path<(String, String)>,
    Json(points): Json<Vec<SeriesPoint>>,
) -> Result<Json<StoredForecast>, ApiError> {
    let kind = parse_source(&source)?;
    if let Some(p) = points.iter().find(|p| !p.value.is_finite()) {
        return Err(ApiError::ValidationError(format!(
            "non-finite value at {}",
            p.timestamp
        )));
    }
    let stored = st
        .controller
        .store()
        .store_forecast(kind, &source_id, &points)
        .await?;
    Ok(Json(StoredForecast {
        source: kind,
        source_id,
        stored,
    }))
}

/// GET /api/source-ids/:source
///
/// Sorted ids of every source of the kind; empty when none is registered.
pub async fn source_ids(
    State(st): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let kind = parse_source(&source)?;
    let ids = st.controller.store().source_ids(kind).await?;
    Ok(Json(ids))
}

/// Number of registered generation sources
#[derive(Debug, Serialize)]
pub struct DeviceCounts {
    pub solar: usize,
    pub wind: usize,
}

/// GET /api/device-status
pub async fn device_status(State(st): State<AppState>) -> Result<Json<DeviceCounts>, ApiError> {
    let counts = st
        .controller
        .source_counts(&[SourceType::Solar, SourceType::Wind])
        .await?;
    let count_of = |kind| {
        counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, n)| *n)
    };
    Ok(Json(DeviceCounts {
        solar: count_of(SourceType::Solar),
        wind: count_of(SourceType::Wind),
    }))
}
