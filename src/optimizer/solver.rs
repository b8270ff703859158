//! Solver invocation.
//!
//! The dispatch core only depends on [`MilpSolver`]: hand over a [`LinearModel`],
//! get back a [`SolveStatus`] and, when optimal, one value per variable.
//! [`GoodLpSolver`] is the bundled backend (pure-Rust `microlp` through `good_lp`).

use serde::{Deserialize, Serialize};
use strum::Display;

use super::model::LinearModel;
use super::OptimizerError;

/// Outcome status of a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Undetermined,
    /// Empty horizon, nothing was solved.
    NoData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub status: SolveStatus,
    /// One value per model variable, empty unless `status` is `Optimal`.
    pub values: Vec<f64>,
}

impl SolverOutcome {
    pub fn optimal(values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values,
        }
    }

    pub fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
        }
    }
}

pub trait MilpSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve `model` to optimality.
    ///
    /// Infeasible or unbounded models are reported through the status, not as
    /// `Err`; `Err` means the solver could not be run at all.
    fn solve(&self, model: &LinearModel) -> Result<SolverOutcome, OptimizerError>;
}

/// `good_lp` backed solver using the `microlp` branch-and-bound MILP solver
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

#[cfg(feature = "optimization")]
impl MilpSolver for GoodLpSolver {
    fn name(&self) -> &'static str {
        "good_lp/microlp"
    }

    fn solve(&self, model: &LinearModel) -> Result<SolverOutcome, OptimizerError> {
        use good_lp::{
            constraint, variable, Expression, ProblemVariables, ResolutionError, Solution,
            SolverModel, Variable,
        };

        use super::model::{LinearExpr, Relation, VarKind};

        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .variables()
            .iter()
            .map(|def| {
                let definition = match def.kind {
                    VarKind::Binary => variable().binary(),
                    VarKind::Continuous => {
                        let v = variable().min(def.lower);
                        match def.upper {
                            Some(upper) => v.max(upper),
                            None => v,
                        }
                    }
                };
                problem.add(definition)
            })
            .collect();

        let to_expression = |expr: &LinearExpr| -> Expression {
            let mut out = Expression::default();
            out += expr.constant;
            for &(var, coef) in &expr.terms {
                out += coef * vars[var.index()];
            }
            out
        };

        let objective = to_expression(model.objective());
        let mut milp = problem.minimise(objective).using(good_lp::microlp);

        for c in model.constraints() {
            let lhs = to_expression(&c.lhs);
            let rhs = to_expression(&c.rhs);
            milp = milp.with(match c.relation {
                Relation::LessOrEqual => constraint::leq(lhs, rhs),
                Relation::GreaterOrEqual => constraint::geq(lhs, rhs),
                Relation::Equal => constraint::eq(lhs, rhs),
            });
        }

        match milp.solve() {
            Ok(solution) => Ok(SolverOutcome::optimal(
                vars.iter().map(|&v| solution.value(v)).collect(),
            )),
            Err(ResolutionError::Infeasible) => Ok(SolverOutcome::failed(SolveStatus::Infeasible)),
            Err(ResolutionError::Unbounded) => Ok(SolverOutcome::failed(SolveStatus::Unbounded)),
            Err(e) => {
                tracing::warn!(error = %e, "solver returned without a solution");
                Ok(SolverOutcome::failed(SolveStatus::Undetermined))
            }
        }
    }
}

#[cfg(not(feature = "optimization"))]
impl MilpSolver for GoodLpSolver {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn solve(&self, _model: &LinearModel) -> Result<SolverOutcome, OptimizerError> {
        Err(OptimizerError::SolverUnavailable(
            "MILP optimization requires the 'optimization' feature to be enabled".to_string(),
        ))
    }
}
