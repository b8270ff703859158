use std::collections::HashSet;

use super::model::{LinearConstraint, LinearExpr, LinearModel, VarId};
use super::settings::DispatchSettings;
use super::OptimizerError;
use crate::domain::{AlignedForecastFrame, Battery, BatteryError};

/// Variable handles of a dispatch model.
///
/// Per-battery tables are indexed `[battery][t]` in the order the batteries were
/// given to the builder.
#[derive(Debug, Clone, Default)]
pub struct DispatchVariables {
    pub charge: Vec<Vec<VarId>>,
    pub discharge: Vec<Vec<VarId>>,
    pub soc: Vec<Vec<VarId>>,
    pub grid_buy: Vec<VarId>,
    pub grid_sell: Vec<VarId>,
    pub delta: Vec<VarId>,
}

/// A built dispatch problem, ready for a [`MilpSolver`](super::MilpSolver)
#[derive(Debug, Clone)]
pub struct DispatchModel {
    pub lp: LinearModel,
    pub vars: DispatchVariables,
    /// `solar + wind - load - Σ(charge - discharge)` per step
    pub net_excess: Vec<LinearExpr>,
    pub big_m: f64,
    pub horizon: usize,
}

pub struct DispatchModelBuilder<'a> {
    settings: &'a DispatchSettings,
}

impl<'a> DispatchModelBuilder<'a> {
    pub fn new(settings: &'a DispatchSettings) -> Self {
        Self { settings }
    }

    pub fn build(
        &self,
        batteries: &[Battery],
        frame: &AlignedForecastFrame,
    ) -> Result<DispatchModel, OptimizerError> {
        validate_fleet(batteries)?;

        let horizon = frame.len();
        let big_m = self.settings.big_m.resolve(batteries, frame)?;
        let efficiency = self.settings.efficiency_model;

        let mut lp = LinearModel::new();
        let mut vars = DispatchVariables::default();

        for battery in batteries {
            // A battery without capacity cannot pass energy through: with
            // soc pinned at 0 the recurrence alone would still allow d = η·c.
            let (max_charge, max_discharge) = if battery.capacity_kwh() > 0.0 {
                (battery.max_charge_kw(), battery.max_discharge_kw())
            } else {
                (0.0, 0.0)
            };
            let charge: Vec<VarId> = (0..horizon)
                .map(|_| lp.add_continuous(0.0, Some(max_charge)))
                .collect();
            let discharge: Vec<VarId> = (0..horizon)
                .map(|_| lp.add_continuous(0.0, Some(max_discharge)))
                .collect();
            let soc: Vec<VarId> = (0..horizon)
                .map(|_| lp.add_continuous(0.0, Some(battery.capacity_kwh())))
                .collect();

            if horizon > 0 {
                // Step 0 is the measured state, so no energy moves there.
                lp.add_constraint(LinearConstraint::equal(
                    LinearExpr::var(soc[0]),
                    LinearExpr::constant(battery.current_soc_kwh()),
                ));
                lp.add_constraint(LinearConstraint::equal(
                    LinearExpr::var(charge[0]),
                    LinearExpr::constant(0.0),
                ));
                lp.add_constraint(LinearConstraint::equal(
                    LinearExpr::var(discharge[0]),
                    LinearExpr::constant(0.0),
                ));
            }

            let eta = battery.round_trip_efficiency();
            let eta_c = efficiency.charge_factor(eta);
            let eta_d = efficiency.discharge_factor(eta);
            for t in 1..horizon {
                let mut next = LinearExpr::var(soc[t - 1]);
                next.add_term(charge[t], eta_c)
                    .add_term(discharge[t], -1.0 / eta_d);
                lp.add_constraint(LinearConstraint::equal(LinearExpr::var(soc[t]), next));
            }

            vars.charge.push(charge);
            vars.discharge.push(discharge);
            vars.soc.push(soc);
        }

        let mut net_excess = Vec::with_capacity(horizon);
        let mut objective = LinearExpr::default();

        for (t, step) in frame.iter().enumerate() {
            let buy = lp.add_continuous(0.0, None);
            let sell = lp.add_continuous(0.0, None);
            let delta = lp.add_binary();

            let mut net = LinearExpr::constant(step.net_generation());
            for b in 0..batteries.len() {
                net.add_term(vars.charge[b][t], -1.0)
                    .add_term(vars.discharge[b][t], 1.0);
            }

            // grid_sell >= 0 and grid_buy >= 0 are carried by the variable bounds.
            lp.add_constraint(LinearConstraint::geq(LinearExpr::var(sell), net.clone()));
            lp.add_constraint(LinearConstraint::leq(
                LinearExpr::var(sell),
                net.clone()
                    .plus_scaled(&LinearExpr::constant(big_m), 1.0)
                    .plus_scaled(&LinearExpr::term(delta, big_m), -1.0),
            ));
            lp.add_constraint(LinearConstraint::leq(
                LinearExpr::var(sell),
                LinearExpr::term(delta, big_m),
            ));

            lp.add_constraint(LinearConstraint::geq(LinearExpr::var(buy), net.negated()));
            lp.add_constraint(LinearConstraint::leq(
                LinearExpr::var(buy),
                net.negated().plus_scaled(&LinearExpr::term(delta, big_m), 1.0),
            ));
            let mut buy_cap = LinearExpr::constant(big_m);
            buy_cap.add_term(delta, -big_m);
            lp.add_constraint(LinearConstraint::leq(LinearExpr::var(buy), buy_cap));

            objective.add_term(buy, step.price).add_term(sell, -step.price);

            vars.grid_buy.push(buy);
            vars.grid_sell.push(sell);
            vars.delta.push(delta);
            net_excess.push(net);
        }

        lp.minimise(objective);

        tracing::debug!(
            horizon,
            batteries = batteries.len(),
            variables = lp.variables().len(),
            constraints = lp.constraints().len(),
            big_m,
            "dispatch model built"
        );

        Ok(DispatchModel {
            lp,
            vars,
            net_excess,
            big_m,
            horizon,
        })
    }
}

fn validate_fleet(batteries: &[Battery]) -> Result<(), BatteryError> {
    let mut seen = HashSet::new();
    for battery in batteries {
        battery.validate()?;
        if !seen.insert(battery.id()) {
            return Err(BatteryError::InvalidParameter(format!(
                "duplicate battery id {}",
                battery.id()
            )));
        }
    }
    Ok(())
}
