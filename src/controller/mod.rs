use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    AlignedForecastFrame, Battery, BatteryError, BatteryFleet, BatteryId, BatterySpec, SourceType,
    TimeRange,
};
use crate::forecast::{
    current_hour, AggregationError, ForecastAggregator, ForecastStore, InMemoryForecastStore,
    SyntheticForecastGenerator,
};
use crate::optimizer::{apply_solution_to_fleet, DispatchOptimizer, DispatchSolution, OptimizerError};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Battery {0} not found")]
    BatteryNotFound(BatteryId),

    #[error(transparent)]
    Battery(#[from] BatteryError),

    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("Dispatch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<DispatchController>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let fleet = BatteryFleet::from_specs(&cfg.fleet.batteries)?;
        let store = Arc::new(InMemoryForecastStore::new());

        if let Some(synthetic) = cfg.forecast.synthetic.clone() {
            SyntheticForecastGenerator::new(synthetic)?
                .seed_store(store.as_ref(), current_hour())
                .await?;
        }

        let optimizer = DispatchOptimizer::with_default_solver(cfg.optimizer.clone());
        info!(
            batteries = fleet.len(),
            solver = optimizer.solver_name(),
            "dispatch controller ready"
        );

        Ok(Self::from_parts(cfg, fleet, store, optimizer))
    }

    pub fn from_parts(
        cfg: Config,
        fleet: BatteryFleet,
        store: Arc<dyn ForecastStore>,
        optimizer: DispatchOptimizer,
    ) -> Self {
        let controller = Arc::new(DispatchController::new(fleet, store, optimizer));
        Self { cfg, controller }
    }
}

pub fn spawn_controller_tasks(state: &AppState) {
    let every = state.cfg.controller.reoptimize_every_minutes;
    if every == 0 {
        return;
    }
    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.reoptimize_loop(every).await;
    });
}

/// Inputs of a dispatch run: an explicit frame, or a range to aggregate from the store
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    pub frame: Option<AlignedForecastFrame>,
    pub range: TimeRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Batteries whose SOC was written back
    pub applied: usize,
    #[serde(flatten)]
    pub solution: DispatchSolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub actual_power_kw: f64,
    pub battery: Battery,
}

/// Owns the fleet and serializes every run and manual action on it.
pub struct DispatchController {
    fleet: Mutex<BatteryFleet>,
    aggregator: ForecastAggregator,
    optimizer: Arc<DispatchOptimizer>,
    last_run: RwLock<Option<DispatchRun>>,
}

impl DispatchController {
    pub fn new(fleet: BatteryFleet, store: Arc<dyn ForecastStore>, optimizer: DispatchOptimizer) -> Self {
        Self {
            fleet: Mutex::new(fleet),
            aggregator: ForecastAggregator::new(store),
            optimizer: Arc::new(optimizer),
            last_run: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn ForecastStore> {
        self.aggregator.store()
    }

    pub fn aggregator(&self) -> &ForecastAggregator {
        &self.aggregator
    }

    pub fn solver_name(&self) -> &'static str {
        self.optimizer.solver_name()
    }

    pub async fn list_batteries(&self) -> Vec<Battery> {
        self.fleet.lock().await.snapshot()
    }

    pub async fn get_battery(&self, id: &BatteryId) -> Result<Battery, ControllerError> {
        self.fleet
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ControllerError::BatteryNotFound(id.clone()))
    }

    pub async fn add_battery(&self, spec: BatterySpec) -> Result<Battery, ControllerError> {
        let mut fleet = self.fleet.lock().await;
        let id = fleet.add(spec)?;
        info!(battery_id = %id, "battery registered");
        fleet
            .get(&id)
            .cloned()
            .ok_or(ControllerError::BatteryNotFound(id))
    }

    pub async fn remove_battery(&self, id: &BatteryId) -> Result<Battery, ControllerError> {
        let removed = self
            .fleet
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| ControllerError::BatteryNotFound(id.clone()))?;
        info!(battery_id = %id, "battery removed");
        Ok(removed)
    }

    pub async fn charge_battery(
        &self,
        id: &BatteryId,
        power_kw: f64,
        duration_h: f64,
    ) -> Result<StepOutcome, ControllerError> {
        let mut fleet = self.fleet.lock().await;
        let battery = fleet
            .get_mut(id)
            .ok_or_else(|| ControllerError::BatteryNotFound(id.clone()))?;
        let actual_power_kw = battery.charge(power_kw, duration_h)?;
        info!(battery_id = %id, requested_kw = power_kw, actual_power_kw, soc_kwh = battery.current_soc_kwh(), "battery charged");
        Ok(StepOutcome {
            actual_power_kw,
            battery: battery.clone(),
        })
    }

    pub async fn discharge_battery(
        &self,
        id: &BatteryId,
        power_kw: f64,
        duration_h: f64,
    ) -> Result<StepOutcome, ControllerError> {
        let mut fleet = self.fleet.lock().await;
        let battery = fleet
            .get_mut(id)
            .ok_or_else(|| ControllerError::BatteryNotFound(id.clone()))?;
        let actual_power_kw = battery.discharge(power_kw, duration_h)?;
        info!(battery_id = %id, requested_kw = power_kw, actual_power_kw, soc_kwh = battery.current_soc_kwh(), "battery discharged");
        Ok(StepOutcome {
            actual_power_kw,
            battery: battery.clone(),
        })
    }

    /// Optimize the whole fleet and write the final SOC back.
    ///
    /// The fleet lock is held from snapshot to write-back, so runs never
    /// interleave with each other or with manual charge/discharge.
    pub async fn run_dispatch(&self, request: DispatchRequest) -> Result<DispatchRun, ControllerError> {
        let frame = match request.frame {
            Some(frame) => frame,
            None => self.aggregator.load_optimization_frame(&request.range).await?,
        };

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut fleet = self.fleet.lock().await;
        let batteries = fleet.snapshot();

        let optimizer = self.optimizer.clone();
        let solution =
            tokio::task::spawn_blocking(move || optimizer.optimize(&batteries, &frame)).await??;

        let applied = apply_solution_to_fleet(&solution, &mut fleet);
        drop(fleet);

        let run = DispatchRun {
            run_id,
            started_at,
            finished_at: Utc::now(),
            applied,
            solution,
        };
        info!(
            %run_id,
            status = %run.solution.status,
            total_cost = run.solution.total_cost,
            applied,
            "dispatch run complete"
        );
        *self.last_run.write().await = Some(run.clone());
        Ok(run)
    }

    pub async fn last_run(&self) -> Option<DispatchRun> {
        self.last_run.read().await.clone()
    }

    /// Registered source count per kind
    pub async fn source_counts(&self, kinds: &[SourceType]) -> Result<Vec<(SourceType, usize)>> {
        let mut out = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            out.push((kind, self.store().source_ids(kind).await?.len()));
        }
        Ok(out)
    }

    pub async fn reoptimize_loop(&self, every_minutes: u64) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(every_minutes.max(1) * 60));
        loop {
            interval.tick().await;
            let range = TimeRange {
                start: Some(current_hour()),
                end: None,
            };
            if let Err(e) = self.run_dispatch(DispatchRequest { frame: None, range }).await {
                warn!(error = %e, "periodic dispatch failed");
            }
        }
    }
}
