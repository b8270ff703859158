//! Solver-independent mixed-integer linear model.
//!
//! Variables are addressed by [`VarId`] handles; the dispatch builder keeps them
//! in `[battery][time]` tables so nothing is ever looked up by name.

/// Handle of a model variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableDef {
    pub kind: VarKind,
    pub lower: f64,
    pub upper: Option<f64>,
}

/// `Σ coef·var + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn var(var: VarId) -> Self {
        Self::term(var, 1.0)
    }

    pub fn term(var: VarId, coef: f64) -> Self {
        Self {
            terms: vec![(var, coef)],
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) -> &mut Self {
        self.terms.push((var, coef));
        self
    }

    pub fn add_constant(&mut self, value: f64) -> &mut Self {
        self.constant += value;
        self
    }

    /// `self + coef·other`
    pub fn plus_scaled(mut self, other: &LinearExpr, coef: f64) -> Self {
        self.terms
            .extend(other.terms.iter().map(|&(v, c)| (v, c * coef)));
        self.constant += other.constant * coef;
        self
    }

    pub fn negated(&self) -> Self {
        Self::default().plus_scaled(self, -1.0)
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(v, c)| c * values[v.index()])
            .sum::<f64>()
            + self.constant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
}

/// `lhs (<=|>=|==) rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub lhs: LinearExpr,
    pub relation: Relation,
    pub rhs: LinearExpr,
}

impl LinearConstraint {
    pub fn leq(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self {
            lhs,
            relation: Relation::LessOrEqual,
            rhs,
        }
    }

    pub fn geq(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self {
            lhs,
            relation: Relation::GreaterOrEqual,
            rhs,
        }
    }

    pub fn equal(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self {
            lhs,
            relation: Relation::Equal,
            rhs,
        }
    }

    /// Signed slack `lhs - rhs`
    pub fn residual(&self, values: &[f64]) -> f64 {
        self.lhs.evaluate(values) - self.rhs.evaluate(values)
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let r = self.residual(values);
        match self.relation {
            Relation::LessOrEqual => r <= tolerance,
            Relation::GreaterOrEqual => r >= -tolerance,
            Relation::Equal => r.abs() <= tolerance,
        }
    }
}

/// A minimisation problem over bounded continuous and binary variables
#[derive(Debug, Clone, Default)]
pub struct LinearModel {
    variables: Vec<VariableDef>,
    constraints: Vec<LinearConstraint>,
    objective: LinearExpr,
}

impl LinearModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_continuous(&mut self, lower: f64, upper: Option<f64>) -> VarId {
        self.push_variable(VariableDef {
            kind: VarKind::Continuous,
            lower,
            upper,
        })
    }

    pub fn add_binary(&mut self) -> VarId {
        self.push_variable(VariableDef {
            kind: VarKind::Binary,
            lower: 0.0,
            upper: Some(1.0),
        })
    }

    fn push_variable(&mut self, def: VariableDef) -> VarId {
        self.variables.push(def);
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(&mut self, constraint: LinearConstraint) {
        self.constraints.push(constraint);
    }

    pub fn minimise(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    /// Check bounds, integrality and every constraint against an assignment.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let bounds_ok = self.variables.iter().zip(values).all(|(def, &v)| {
            let in_bounds =
                v >= def.lower - tolerance && def.upper.map_or(true, |u| v <= u + tolerance);
            let integral = match def.kind {
                VarKind::Continuous => true,
                VarKind::Binary => (v - v.round()).abs() <= tolerance,
            };
            in_bounds && integral
        });
        bounds_ok
            && self
                .constraints
                .iter()
                .all(|c| c.is_satisfied(values, tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_evaluation() {
        let mut model = LinearModel::new();
        let x = model.add_continuous(0.0, None);
        let y = model.add_continuous(0.0, Some(3.0));

        let mut expr = LinearExpr::term(x, 2.0);
        expr.add_term(y, -1.0).add_constant(4.0);

        assert_eq!(expr.evaluate(&[1.5, 2.0]), 5.0);
        assert_eq!(expr.negated().evaluate(&[1.5, 2.0]), -5.0);
        assert_eq!(
            LinearExpr::constant(1.0).plus_scaled(&expr, 2.0).evaluate(&[0.0, 0.0]),
            9.0
        );
    }

    #[test]
    fn test_feasibility_check() {
        let mut model = LinearModel::new();
        let x = model.add_continuous(0.0, Some(10.0));
        let d = model.add_binary();
        model.add_constraint(LinearConstraint::leq(
            LinearExpr::var(x),
            LinearExpr::term(d, 10.0),
        ));

        assert!(model.is_feasible(&[5.0, 1.0], 1e-9));
        assert!(!model.is_feasible(&[5.0, 0.0], 1e-9));
        assert!(!model.is_feasible(&[0.0, 0.5], 1e-9));
        assert!(!model.is_feasible(&[11.0, 1.0], 1e-9));
    }
}
