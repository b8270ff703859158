use serde::{Deserialize, Serialize};

use super::OptimizerError;
use crate::domain::{AlignedForecastFrame, Battery, EfficiencyModel};

/// Big-M constant of the buy/sell disjunction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BigM {
    /// `factor` times an upper bound of `|net_excess|` derived from the data.
    Auto { factor: f64 },
    /// A caller-chosen constant.
    Fixed { value: f64 },
}

impl Default for BigM {
    fn default() -> Self {
        Self::Auto { factor: 10.0 }
    }
}

impl BigM {
    /// Upper bound of `|net_excess[t]|` over the horizon: the largest
    /// `|solar| + |wind| + |load|` plus the fleet's largest possible battery flow.
    pub fn data_bound(batteries: &[Battery], frame: &AlignedForecastFrame) -> f64 {
        let fleet_flow: f64 = batteries
            .iter()
            .map(|b| b.max_charge_kw().max(b.max_discharge_kw()))
            .sum();
        frame.max_abs_flow() + fleet_flow
    }

    /// Both the factor and a fixed value must be finite and positive.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        let (name, value) = match *self {
            Self::Auto { factor } => ("factor", factor),
            Self::Fixed { value } => ("value", value),
        };
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(OptimizerError::InvalidSettings(format!(
                "big_m {name} must be finite and positive, got {value}"
            )))
        }
    }

    pub fn resolve(
        &self,
        batteries: &[Battery],
        frame: &AlignedForecastFrame,
    ) -> Result<f64, OptimizerError> {
        self.validate()?;
        let m = match *self {
            Self::Auto { factor } => factor * Self::data_bound(batteries, frame).max(1.0),
            Self::Fixed { value } => {
                let bound = Self::data_bound(batteries, frame);
                if value < bound {
                    tracing::warn!(
                        big_m = value,
                        bound,
                        "fixed big-M is below the net excess bound, buy/sell limits may cut off feasible dispatch"
                    );
                }
                value
            }
        };
        Ok(m)
    }
}

/// Dispatch optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub big_m: BigM,
    /// How `round_trip_efficiency` enters the SOC recurrence of the model.
    pub efficiency_model: EfficiencyModel,
}

impl DispatchSettings {
    pub fn validate(&self) -> Result<(), OptimizerError> {
        self.big_m.validate()
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            big_m: BigM::default(),
            efficiency_model: EfficiencyModel::ChargeSide,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatterySpec, ForecastStep};
    use chrono::Utc;
    use rstest::rstest;

    fn frame(solar: f64, wind: f64, load: f64) -> AlignedForecastFrame {
        AlignedForecastFrame::new(vec![ForecastStep {
            time: Utc::now(),
            solar,
            wind,
            load,
            price: 1.0,
        }])
        .unwrap()
    }

    #[test]
    fn test_auto_big_m_scales_with_data() {
        let batteries = vec![
            Battery::new("a", BatterySpec { max_charge_kw: 3.0, max_discharge_kw: 1.0, ..Default::default() }).unwrap(),
            Battery::new("b", BatterySpec { max_charge_kw: 1.0, max_discharge_kw: 2.0, ..Default::default() }).unwrap(),
        ];
        let m = BigM::Auto { factor: 10.0 }.resolve(&batteries, &frame(100.0, 20.0, -30.0)).unwrap();
        // (100 + 20 + 30) + (3 + 2)
        assert_eq!(m, 1550.0);
    }

    #[test]
    fn test_auto_big_m_has_a_floor() {
        let m = BigM::default().resolve(&[], &frame(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(m, 10.0);
    }

    #[test]
    fn test_fixed_big_m_is_used_verbatim() {
        let m = BigM::Fixed { value: 1000.0 }.resolve(&[], &frame(5.0, 0.0, 8.0)).unwrap();
        assert_eq!(m, 1000.0);
    }

    #[rstest]
    #[case(BigM::Auto { factor: 0.0 })]
    #[case(BigM::Auto { factor: f64::NAN })]
    #[case(BigM::Fixed { value: -5.0 })]
    #[case(BigM::Fixed { value: f64::INFINITY })]
    fn test_non_positive_big_m_is_rejected(#[case] big_m: BigM) {
        let err = big_m.resolve(&[], &frame(5.0, 0.0, 8.0)).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidSettings(_)));
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: DispatchSettings =
            serde_json::from_str(r#"{"big_m": {"mode": "fixed", "value": 500.0}}"#).unwrap();
        assert_eq!(settings.big_m, BigM::Fixed { value: 500.0 });
        assert_eq!(settings.efficiency_model, EfficiencyModel::ChargeSide);
    }
}
