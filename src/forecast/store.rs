use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{SeriesPoint, SourceType, TimeRange};

/// Source of per-source forecast series
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Registered source ids of a kind, sorted.
    async fn source_ids(&self, kind: SourceType) -> Result<Vec<String>>;

    /// Forecast of one source within `range`, in time order.
    ///
    /// An unknown source yields an empty series.
    async fn load_forecast(
        &self,
        kind: SourceType,
        source_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<SeriesPoint>>;

    /// Upsert points of one source; returns how many were written.
    async fn store_forecast(
        &self,
        kind: SourceType,
        source_id: &str,
        points: &[SeriesPoint],
    ) -> Result<usize>;
}

type SeriesKey = (SourceType, String);

/// Process-local forecast store
#[derive(Debug, Default)]
pub struct InMemoryForecastStore {
    series: RwLock<HashMap<SeriesKey, BTreeMap<DateTime<Utc>, f64>>>,
}

impl InMemoryForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered sources per kind
    pub fn source_count(&self, kind: SourceType) -> usize {
        self.series.read().keys().filter(|(k, _)| *k == kind).count()
    }
}

#[async_trait]
impl ForecastStore for InMemoryForecastStore {
    async fn source_ids(&self, kind: SourceType) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .series
            .read()
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn load_forecast(
        &self,
        kind: SourceType,
        source_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<SeriesPoint>> {
        let guard = self.series.read();
        let Some(points) = guard.get(&(kind, source_id.to_string())) else {
            return Ok(Vec::new());
        };
        Ok(points
            .iter()
            .filter(|(t, _)| range.contains(**t))
            .map(|(t, v)| SeriesPoint::new(*t, *v))
            .collect())
    }

    async fn store_forecast(
        &self,
        kind: SourceType,
        source_id: &str,
        points: &[SeriesPoint],
    ) -> Result<usize> {
        if let Some(p) = points.iter().find(|p| !p.value.is_finite()) {
            anyhow::bail!("non-finite forecast value at {}", p.timestamp);
        }
        let mut guard = self.series.write();
        let series = guard.entry((kind, source_id.to_string())).or_default();
        for p in points {
            series.insert(p.timestamp, p.value);
        }
        tracing::debug!(%kind, source_id, points = points.len(), "stored forecast");
        Ok(points.len())
    }
}
