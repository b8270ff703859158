use std::sync::Arc;

use thiserror::Error;

use super::store::ForecastStore;
use crate::domain::{
    AlignedForecastFrame, ForecastColumns, FrameColumn, FrameError, SeriesPoint, SourceType,
    TimeRange,
};

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Forecast store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("No {0} forecast available")]
    MissingSeries(SourceType),

    #[error("Forecast data misaligned: {0}")]
    Misaligned(#[from] FrameError),
}

/// Element-wise sum of same-kind series.
///
/// Every series must share the first one's timestamps exactly.
pub fn sum_series(
    column: FrameColumn,
    series: Vec<Vec<SeriesPoint>>,
) -> Result<Vec<SeriesPoint>, FrameError> {
    let mut iter = series.into_iter();
    let Some(mut total) = iter.next() else {
        return Ok(Vec::new());
    };
    for other in iter {
        if other.len() != total.len() {
            return Err(FrameError::LengthMismatch {
                column,
                expected: total.len(),
                found: other.len(),
            });
        }
        for (position, (acc, p)) in total.iter_mut().zip(&other).enumerate() {
            if acc.timestamp != p.timestamp {
                return Err(FrameError::IndexMismatch { column, position });
            }
            acc.value += p.value;
        }
    }
    Ok(total)
}

/// Builds optimization frames from a [`ForecastStore`].
///
/// Per kind, all sources are summed. Load and market are required; solar and
/// wind with no registered source contribute zeros on the load index.
#[derive(Clone)]
pub struct ForecastAggregator {
    store: Arc<dyn ForecastStore>,
}

impl ForecastAggregator {
    pub fn new(store: Arc<dyn ForecastStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ForecastStore> {
        &self.store
    }

    /// Summed forecast of every source of `kind`; `None` when no source exists.
    pub async fn aggregate(
        &self,
        kind: SourceType,
        range: &TimeRange,
    ) -> Result<Option<Vec<SeriesPoint>>, AggregationError> {
        let ids = self.store.source_ids(kind).await?;
        if ids.is_empty() {
            return Ok(None);
        }
        let mut series = Vec::with_capacity(ids.len());
        for id in &ids {
            series.push(self.store.load_forecast(kind, id, range).await?);
        }
        let total = sum_series(kind.into(), series)?;
        tracing::debug!(%kind, sources = ids.len(), points = total.len(), "aggregated forecast");
        Ok(Some(total))
    }

    pub async fn load_optimization_columns(
        &self,
        range: &TimeRange,
    ) -> Result<ForecastColumns, AggregationError> {
        let (solar, wind, load, price) = tokio::try_join!(
            self.aggregate(SourceType::Solar, range),
            self.aggregate(SourceType::Wind, range),
            self.aggregate(SourceType::Load, range),
            self.aggregate(SourceType::Market, range),
        )?;

        let load = load.ok_or(AggregationError::MissingSeries(SourceType::Load))?;
        let price = price.ok_or(AggregationError::MissingSeries(SourceType::Market))?;

        let zeros = || {
            load.iter()
                .map(|p| SeriesPoint::new(p.timestamp, 0.0))
                .collect::<Vec<_>>()
        };
        let solar = solar.unwrap_or_else(zeros);
        let wind = wind.unwrap_or_else(zeros);

        Ok(ForecastColumns {
            solar,
            wind,
            load,
            price,
        })
    }

    /// Aggregate and align the four series over `range`.
    pub async fn load_optimization_frame(
        &self,
        range: &TimeRange,
    ) -> Result<AlignedForecastFrame, AggregationError> {
        let columns = self.load_optimization_columns(range).await?;
        let frame = AlignedForecastFrame::from_columns(columns)?;
        tracing::info!(steps = frame.len(), "optimization frame loaded");
        Ok(frame)
    }
}
