use chrono::{DateTime, Utc};
use itertools::izip;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Kind of forecasted series
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SourceType {
    Solar,
    Wind,
    Load,
    Market,
}

/// Column names of the aligned frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FrameColumn {
    Solar,
    Wind,
    Load,
    Price,
}

impl From<SourceType> for FrameColumn {
    fn from(kind: SourceType) -> Self {
        match kind {
            SourceType::Solar => Self::Solar,
            SourceType::Wind => Self::Wind,
            SourceType::Load => Self::Load,
            SourceType::Market => Self::Price,
        }
    }
}

/// Forecast data contract violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("column {column} has {found} points, expected {expected}")]
    LengthMismatch {
        column: FrameColumn,
        expected: usize,
        found: usize,
    },
    #[error("column {column} is not aligned with the time index at position {position}")]
    IndexMismatch { column: FrameColumn, position: usize },
    #[error("time index is not strictly increasing at position {position}")]
    NonMonotonic { position: usize },
    #[error("column {column} has a non-finite value at position {position}")]
    NonFinite { column: FrameColumn, position: usize },
}

/// A single timestamped value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Inclusive time window; an open end is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| t >= s) && self.end.map_or(true, |e| t <= e)
    }
}

/// One optimization time step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub time: DateTime<Utc>,
    pub solar: f64,
    pub wind: f64,
    pub load: f64,
    pub price: f64,
}

impl ForecastStep {
    /// Generation minus load, before any battery action
    pub fn net_generation(&self) -> f64 {
        self.solar + self.wind - self.load
    }
}

/// The four forecast series as separate columns, as produced by aggregation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastColumns {
    pub solar: Vec<SeriesPoint>,
    pub wind: Vec<SeriesPoint>,
    pub load: Vec<SeriesPoint>,
    pub price: Vec<SeriesPoint>,
}

/// Solar, wind, load and price on one shared, strictly increasing time index.
///
/// Construction validates the data contract, so a frame in hand is always aligned
/// and finite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ForecastStep>", into = "Vec<ForecastStep>")]
pub struct AlignedForecastFrame {
    steps: Vec<ForecastStep>,
}

impl AlignedForecastFrame {
    pub fn new(steps: Vec<ForecastStep>) -> Result<Self, FrameError> {
        for (position, step) in steps.iter().enumerate() {
            let values = [
                (FrameColumn::Solar, step.solar),
                (FrameColumn::Wind, step.wind),
                (FrameColumn::Load, step.load),
                (FrameColumn::Price, step.price),
            ];
            if let Some((column, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
                return Err(FrameError::NonFinite {
                    column: *column,
                    position,
                });
            }
            if position > 0 && step.time <= steps[position - 1].time {
                return Err(FrameError::NonMonotonic { position });
            }
        }
        Ok(Self { steps })
    }

    /// Join four columns on their common index.
    ///
    /// The solar column defines the index; every other column must match it in
    /// length and timestamps exactly.
    pub fn from_columns(columns: ForecastColumns) -> Result<Self, FrameError> {
        let expected = columns.solar.len();
        let others = [
            (FrameColumn::Wind, &columns.wind),
            (FrameColumn::Load, &columns.load),
            (FrameColumn::Price, &columns.price),
        ];

        for (column, series) in others {
            if series.len() != expected {
                return Err(FrameError::LengthMismatch {
                    column,
                    expected,
                    found: series.len(),
                });
            }
            if let Some(position) = columns
                .solar
                .iter()
                .zip(series.iter())
                .position(|(a, b)| a.timestamp != b.timestamp)
            {
                return Err(FrameError::IndexMismatch { column, position });
            }
        }

        let steps = izip!(&columns.solar, &columns.wind, &columns.load, &columns.price)
            .map(|(s, w, l, p)| ForecastStep {
                time: s.timestamp,
                solar: s.value,
                wind: w.value,
                load: l.value,
                price: p.value,
            })
            .collect();

        Self::new(steps)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[ForecastStep] {
        &self.steps
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForecastStep> {
        self.steps.iter()
    }

    /// Largest `|solar| + |wind| + |load|` over the horizon
    pub fn max_abs_flow(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| s.solar.abs() + s.wind.abs() + s.load.abs())
            .fold(0.0, f64::max)
    }
}

impl TryFrom<Vec<ForecastStep>> for AlignedForecastFrame {
    type Error = FrameError;

    fn try_from(steps: Vec<ForecastStep>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<AlignedForecastFrame> for Vec<ForecastStep> {
    fn from(frame: AlignedForecastFrame) -> Self {
        frame.steps
    }
}
