use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::builder::DispatchModel;
use super::solver::SolveStatus;
use crate::domain::{AlignedForecastFrame, Battery, BatteryFleet, BatteryId};

const ZERO_SNAP: f64 = 1e-9;

/// One output row per (time step, battery)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRow {
    pub time: DateTime<Utc>,
    pub battery_id: BatteryId,
    pub charge: f64,
    pub discharge: f64,
    pub soc: f64,
    pub grid_buy: f64,
    pub grid_sell: f64,
    pub status: SolveStatus,
    pub total_cost: f64,
}

/// Grid exchange of one time step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStep {
    pub time: DateTime<Utc>,
    pub grid_buy: f64,
    pub grid_sell: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSolution {
    pub status: SolveStatus,
    pub total_cost: f64,
    pub big_m: f64,
    /// Time-major: all batteries of step 0, then step 1, ...
    pub rows: Vec<DispatchRow>,
    /// Grid values per step, present even for an empty fleet.
    pub grid: Vec<GridStep>,
    /// SOC of each battery at the last step, in fleet order.
    pub final_soc: Vec<(BatteryId, f64)>,
}

impl DispatchSolution {
    pub fn empty(status: SolveStatus) -> Self {
        Self {
            status,
            total_cost: 0.0,
            big_m: 0.0,
            rows: Vec::new(),
            grid: Vec::new(),
            final_soc: Vec::new(),
        }
    }

    /// Rows of a single battery, in time order.
    pub fn battery_rows<'a>(&'a self, id: &'a BatteryId) -> impl Iterator<Item = &'a DispatchRow> {
        self.rows.iter().filter(move |r| &r.battery_id == id)
    }

    /// Write final SOC back into `batteries`, matching by id.
    ///
    /// Returns how many batteries were updated.
    pub fn apply_to_batteries(&self, batteries: &mut [Battery]) -> usize {
        let mut updated = 0;
        for (id, soc) in &self.final_soc {
            match batteries.iter_mut().find(|b| b.id() == id) {
                Some(battery) => {
                    battery.set_soc(*soc);
                    updated += 1;
                }
                None => tracing::warn!(battery_id = %id, "no battery for dispatch result, skipping"),
            }
        }
        updated
    }
}

/// Write the final SOC of every optimized battery back into the fleet.
///
/// Batteries removed since the run are skipped. Returns the number updated.
pub fn apply_solution_to_fleet(solution: &DispatchSolution, fleet: &mut BatteryFleet) -> usize {
    let mut updated = 0;
    for (id, soc) in &solution.final_soc {
        match fleet.get_mut(id) {
            Some(battery) => {
                battery.set_soc(*soc);
                updated += 1;
            }
            None => tracing::warn!(battery_id = %id, "battery left the fleet, skipping SOC write-back"),
        }
    }
    tracing::debug!(updated, total = solution.final_soc.len(), "applied dispatch SOC");
    updated
}

fn snap(v: f64) -> f64 {
    if v.abs() < ZERO_SNAP {
        0.0
    } else {
        v
    }
}

/// Turn solver values of an optimal solve into rows.
pub(crate) fn extract_solution(
    model: &DispatchModel,
    batteries: &[Battery],
    frame: &AlignedForecastFrame,
    values: &[f64],
) -> DispatchSolution {
    let value = |v: super::VarId| snap(values[v.index()]);
    let vars = &model.vars;

    let grid: Vec<GridStep> = frame
        .iter()
        .enumerate()
        .map(|(t, step)| GridStep {
            time: step.time,
            grid_buy: value(vars.grid_buy[t]),
            grid_sell: value(vars.grid_sell[t]),
            price: step.price,
        })
        .collect();

    let total_cost = snap(
        grid.iter()
            .map(|g| g.price * (g.grid_buy - g.grid_sell))
            .sum(),
    );

    let status = SolveStatus::Optimal;
    let mut rows = Vec::with_capacity(grid.len() * batteries.len());
    for (t, g) in grid.iter().enumerate() {
        for (b, battery) in batteries.iter().enumerate() {
            rows.push(DispatchRow {
                time: g.time,
                battery_id: battery.id().clone(),
                charge: value(vars.charge[b][t]),
                discharge: value(vars.discharge[b][t]),
                soc: value(vars.soc[b][t]),
                grid_buy: g.grid_buy,
                grid_sell: g.grid_sell,
                status,
                total_cost,
            });
        }
    }

    let final_soc = match model.horizon.checked_sub(1) {
        Some(last) => batteries
            .iter()
            .enumerate()
            .map(|(b, battery)| {
                let soc = value(vars.soc[b][last]).clamp(0.0, battery.capacity_kwh());
                (battery.id().clone(), soc)
            })
            .collect(),
        None => Vec::new(),
    };

    DispatchSolution {
        status,
        total_cost,
        big_m: model.big_m,
        rows,
        grid,
        final_soc,
    }
}
