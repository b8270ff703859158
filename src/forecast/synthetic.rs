//! Synthetic forecasts for demos and local testing.
//!
//! Solar follows a half-sine between sunrise and sunset, wind a slow daily
//! cosine, load a morning/evening double peak and price tracks load. All series
//! carry Gaussian noise from a seeded RNG, so a given seed always produces the
//! same data.

use anyhow::Result;
use chrono::{DateTime, Duration, DurationRound, Timelike, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::store::ForecastStore;
use crate::domain::{SeriesPoint, SourceType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticForecastConfig {
    pub seed: Option<u64>,
    /// Hourly steps to generate, starting at the current hour.
    pub hours: u32,
    pub solar_sources: u32,
    pub wind_sources: u32,
    pub solar_peak_kw: f64,
    pub wind_mean_kw: f64,
    pub base_load_kw: f64,
    pub base_price: f64,
    pub sunrise_hour: f64,
    pub sunset_hour: f64,
    /// Relative standard deviation of the noise.
    pub noise: f64,
}

impl Default for SyntheticForecastConfig {
    fn default() -> Self {
        Self {
            seed: Some(42),
            hours: 24,
            solar_sources: 1,
            wind_sources: 1,
            solar_peak_kw: 8.0,
            wind_mean_kw: 3.0,
            base_load_kw: 4.0,
            base_price: 60.0,
            sunrise_hour: 6.0,
            sunset_hour: 20.0,
            noise: 0.05,
        }
    }
}

pub struct SyntheticForecastGenerator {
    config: SyntheticForecastConfig,
    rng: StdRng,
    noise: Normal<f64>,
}

impl SyntheticForecastGenerator {
    pub fn new(config: SyntheticForecastConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, config.noise.max(0.0))?;
        Ok(Self { config, rng, noise })
    }

    fn jitter(&mut self, value: f64) -> f64 {
        value * (1.0 + self.noise.sample(&mut self.rng))
    }

    fn timeline(&self, start: DateTime<Utc>) -> impl Iterator<Item = DateTime<Utc>> {
        (0..self.config.hours as i64).map(move |h| start + Duration::hours(h))
    }

    fn solar_shape(&self, hour: f64) -> f64 {
        let (rise, set) = (self.config.sunrise_hour, self.config.sunset_hour);
        if hour < rise || hour > set {
            return 0.0;
        }
        let x = (hour - rise) / (set - rise).max(0.01);
        (std::f64::consts::PI * x).sin().max(0.0)
    }

    pub fn solar(&mut self, start: DateTime<Utc>) -> Vec<SeriesPoint> {
        let times: Vec<_> = self.timeline(start).collect();
        times
            .into_iter()
            .map(|t| {
                let kw = self.config.solar_peak_kw * self.solar_shape(t.hour() as f64);
                SeriesPoint::new(t, self.jitter(kw).max(0.0))
            })
            .collect()
    }

    pub fn wind(&mut self, start: DateTime<Utc>) -> Vec<SeriesPoint> {
        let times: Vec<_> = self.timeline(start).collect();
        times
            .into_iter()
            .map(|t| {
                let angle = 2.0 * std::f64::consts::PI * t.hour() as f64 / 24.0;
                let kw = self.config.wind_mean_kw * (1.0 + 0.4 * angle.cos());
                SeriesPoint::new(t, self.jitter(kw).max(0.0))
            })
            .collect()
    }

    fn load_shape(hour: f64) -> f64 {
        let bump = |center: f64, width: f64| (-((hour - center) / width).powi(2)).exp();
        0.6 + 0.5 * bump(8.0, 2.0) + 0.8 * bump(19.0, 2.5)
    }

    pub fn load(&mut self, start: DateTime<Utc>) -> Vec<SeriesPoint> {
        let times: Vec<_> = self.timeline(start).collect();
        times
            .into_iter()
            .map(|t| {
                let kw = self.config.base_load_kw * Self::load_shape(t.hour() as f64);
                SeriesPoint::new(t, self.jitter(kw).max(0.0))
            })
            .collect()
    }

    pub fn price(&mut self, start: DateTime<Utc>) -> Vec<SeriesPoint> {
        let times: Vec<_> = self.timeline(start).collect();
        times
            .into_iter()
            .map(|t| {
                let shape = Self::load_shape(t.hour() as f64);
                SeriesPoint::new(t, self.jitter(self.config.base_price * shape))
            })
            .collect()
    }

    /// Fill `store` with one horizon of data; returns the number of points written.
    pub async fn seed_store(
        &mut self,
        store: &dyn ForecastStore,
        start: DateTime<Utc>,
    ) -> Result<usize> {
        let mut written = 0;
        for i in 1..=self.config.solar_sources {
            let series = self.solar(start);
            written += store
                .store_forecast(SourceType::Solar, &format!("solar_{i}"), &series)
                .await?;
        }
        for i in 1..=self.config.wind_sources {
            let series = self.wind(start);
            written += store
                .store_forecast(SourceType::Wind, &format!("wind_{i}"), &series)
                .await?;
        }
        let load = self.load(start);
        written += store.store_forecast(SourceType::Load, "load", &load).await?;
        let price = self.price(start);
        written += store
            .store_forecast(SourceType::Market, "market", &price)
            .await?;

        tracing::info!(
            written,
            hours = self.config.hours,
            solar_sources = self.config.solar_sources,
            wind_sources = self.config.wind_sources,
            "seeded synthetic forecasts"
        );
        Ok(written)
    }
}

/// Start of the current UTC hour
pub fn current_hour() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::hours(1)).unwrap_or(now)
}
