use std::time::Instant;

use super::builder::DispatchModelBuilder;
use super::extract::{extract_solution, DispatchSolution};
use super::settings::DispatchSettings;
use super::solver::{GoodLpSolver, MilpSolver, SolveStatus};
use super::OptimizerError;
use crate::domain::{AlignedForecastFrame, Battery, ForecastColumns};

/// Cost-minimal battery and grid dispatch over a forecast horizon.
///
/// `optimize` reads the batteries and never mutates them; final SOC goes back
/// to the fleet only through [`apply_solution_to_fleet`](super::apply_solution_to_fleet).
pub struct DispatchOptimizer {
    settings: DispatchSettings,
    solver: Box<dyn MilpSolver>,
}

impl DispatchOptimizer {
    pub fn new(settings: DispatchSettings, solver: Box<dyn MilpSolver>) -> Self {
        Self { settings, solver }
    }

    pub fn with_default_solver(settings: DispatchSettings) -> Self {
        Self::new(settings, Box::new(GoodLpSolver))
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Align raw forecast columns, then optimize.
    pub fn optimize_columns(
        &self,
        batteries: &[Battery],
        columns: ForecastColumns,
    ) -> Result<DispatchSolution, OptimizerError> {
        let frame = AlignedForecastFrame::from_columns(columns)?;
        self.optimize(batteries, &frame)
    }

    pub fn optimize(
        &self,
        batteries: &[Battery],
        frame: &AlignedForecastFrame,
    ) -> Result<DispatchSolution, OptimizerError> {
        let model = DispatchModelBuilder::new(&self.settings).build(batteries, frame)?;

        if model.horizon == 0 {
            tracing::info!(batteries = batteries.len(), "empty forecast horizon, nothing to dispatch");
            return Ok(DispatchSolution::empty(SolveStatus::NoData));
        }

        let started = Instant::now();
        let outcome = self.solver.solve(&model.lp)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if outcome.status != SolveStatus::Optimal {
            tracing::warn!(
                status = %outcome.status,
                solver = self.solver.name(),
                elapsed_ms,
                "dispatch optimization failed"
            );
            return Err(OptimizerError::OptimizationFailed {
                status: outcome.status,
            });
        }
        if outcome.values.len() != model.lp.variables().len() {
            tracing::error!(
                expected = model.lp.variables().len(),
                found = outcome.values.len(),
                "solver returned a malformed solution"
            );
            return Err(OptimizerError::OptimizationFailed {
                status: SolveStatus::Undetermined,
            });
        }

        let solution = extract_solution(&model, batteries, frame, &outcome.values);

        tracing::info!(
            horizon = model.horizon,
            batteries = batteries.len(),
            big_m = model.big_m,
            status = %solution.status,
            total_cost = solution.total_cost,
            elapsed_ms,
            "dispatch optimized"
        );

        Ok(solution)
    }
}
