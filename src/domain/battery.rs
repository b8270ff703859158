use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Battery-specific errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatteryError {
    #[error("Invalid battery parameter: {0}")]
    InvalidParameter(String),
}

/// Identifier of a battery, unique within a fleet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatteryId(String);

impl BatteryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BatteryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatteryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How the round-trip efficiency is distributed over the charge and discharge legs.
///
/// Every variant reduces to a pair of leg factors `(eta_c, eta_d)`: charging
/// stores `p * h * eta_c`, discharging drains `delivered / eta_d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyModel {
    /// eta on both legs; a full round trip retains eta^2.
    #[default]
    PerLeg,
    /// sqrt(eta) on each leg; a full round trip retains eta.
    Split,
    /// eta on the charge leg only; discharging is lossless.
    ChargeSide,
}

impl EfficiencyModel {
    pub fn charge_factor(&self, eta: f64) -> f64 {
        match self {
            Self::PerLeg | Self::ChargeSide => eta,
            Self::Split => eta.sqrt(),
        }
    }

    pub fn discharge_factor(&self, eta: f64) -> f64 {
        match self {
            Self::PerLeg => eta,
            Self::Split => eta.sqrt(),
            Self::ChargeSide => 1.0,
        }
    }
}

/// Construction parameters of a battery (config files and API requests)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BatterySpec {
    #[validate(range(min = 0.0))]
    pub capacity_kwh: f64,
    #[serde(default)]
    pub current_soc_kwh: f64,
    #[validate(range(min = 0.0))]
    pub max_charge_kw: f64,
    #[validate(range(min = 0.0))]
    pub max_discharge_kw: f64,
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub round_trip_efficiency: f64,
    #[serde(default)]
    pub efficiency_model: EfficiencyModel,
}

impl Default for BatterySpec {
    fn default() -> Self {
        Self {
            capacity_kwh: 10.0,
            current_soc_kwh: 5.0,
            max_charge_kw: 2.0,
            max_discharge_kw: 2.0,
            round_trip_efficiency: 1.0,
            efficiency_model: EfficiencyModel::PerLeg,
        }
    }
}

/// A stationary battery: capacity, state of charge, power limits and efficiency.
///
/// The SOC is kept within `[0, capacity_kwh]` by every mutating operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    id: BatteryId,
    capacity_kwh: f64,
    current_soc_kwh: f64,
    max_charge_kw: f64,
    max_discharge_kw: f64,
    round_trip_efficiency: f64,
    efficiency_model: EfficiencyModel,
}

impl Battery {
    /// Create a battery, clamping the initial SOC into `[0, capacity]`.
    ///
    /// Fails when the capacity or a power limit is negative (or not finite), or when
    /// the efficiency is outside `(0, 1]`.
    pub fn new(id: impl Into<BatteryId>, spec: BatterySpec) -> Result<Self, BatteryError> {
        let mut battery = Self {
            id: id.into(),
            capacity_kwh: spec.capacity_kwh,
            current_soc_kwh: spec.current_soc_kwh,
            max_charge_kw: spec.max_charge_kw,
            max_discharge_kw: spec.max_discharge_kw,
            round_trip_efficiency: spec.round_trip_efficiency,
            efficiency_model: spec.efficiency_model,
        };
        battery.validate()?;
        if !battery.current_soc_kwh.is_finite() {
            return Err(BatteryError::InvalidParameter(format!(
                "{}: initial soc must be finite",
                battery.id
            )));
        }
        battery.current_soc_kwh = battery.current_soc_kwh.clamp(0.0, battery.capacity_kwh);
        Ok(battery)
    }

    /// Check the physical parameters; SOC bounds are enforced separately by clamping.
    pub fn validate(&self) -> Result<(), BatteryError> {
        let invalid = |what: &str, value: f64| -> Result<(), BatteryError> {
            Err(BatteryError::InvalidParameter(format!("{}: {what} = {value}", self.id)))
        };

        if !self.capacity_kwh.is_finite() || self.capacity_kwh < 0.0 {
            return invalid("capacity_kwh", self.capacity_kwh);
        }
        if !self.max_charge_kw.is_finite() || self.max_charge_kw < 0.0 {
            return invalid("max_charge_kw", self.max_charge_kw);
        }
        if !self.max_discharge_kw.is_finite() || self.max_discharge_kw < 0.0 {
            return invalid("max_discharge_kw", self.max_discharge_kw);
        }
        if !(self.round_trip_efficiency > 0.0 && self.round_trip_efficiency <= 1.0) {
            return invalid("round_trip_efficiency", self.round_trip_efficiency);
        }
        Ok(())
    }

    pub fn id(&self) -> &BatteryId {
        &self.id
    }

    pub fn capacity_kwh(&self) -> f64 {
        self.capacity_kwh
    }

    pub fn current_soc_kwh(&self) -> f64 {
        self.current_soc_kwh
    }

    pub fn max_charge_kw(&self) -> f64 {
        self.max_charge_kw
    }

    pub fn max_discharge_kw(&self) -> f64 {
        self.max_discharge_kw
    }

    pub fn round_trip_efficiency(&self) -> f64 {
        self.round_trip_efficiency
    }

    pub fn efficiency_model(&self) -> EfficiencyModel {
        self.efficiency_model
    }

    /// Overwrite the SOC, clamped into `[0, capacity]`.
    ///
    /// This is how an optimization result is written back onto the battery.
    pub fn set_soc(&mut self, soc_kwh: f64) {
        self.current_soc_kwh = soc_kwh.clamp(0.0, self.capacity_kwh);
    }

    /// Charge at `power_kw` for `duration_h` hours.
    ///
    /// Returns the power actually drawn, which is below the request when the battery
    /// is near full or the request exceeds `max_charge_kw`.
    pub fn charge(&mut self, power_kw: f64, duration_h: f64) -> Result<f64, BatteryError> {
        check_step(power_kw, duration_h)?;
        let eta_c = self.efficiency_model.charge_factor(self.round_trip_efficiency);

        let power_kw = power_kw.min(self.max_charge_kw).max(0.0);
        let energy_kwh = power_kw * duration_h * eta_c;
        let headroom_kwh = (self.capacity_kwh - self.current_soc_kwh).max(0.0);
        let stored_kwh = energy_kwh.min(headroom_kwh);

        self.current_soc_kwh = (self.current_soc_kwh + stored_kwh).min(self.capacity_kwh);

        Ok(stored_kwh / duration_h / eta_c)
    }

    /// Discharge at `power_kw` for `duration_h` hours.
    ///
    /// Returns the power actually delivered. The SOC drops by the delivered energy
    /// divided by the discharge efficiency.
    pub fn discharge(&mut self, power_kw: f64, duration_h: f64) -> Result<f64, BatteryError> {
        check_step(power_kw, duration_h)?;
        let eta_d = self.efficiency_model.discharge_factor(self.round_trip_efficiency);

        let power_kw = power_kw.min(self.max_discharge_kw).max(0.0);
        let requested_kwh = power_kw * duration_h;
        let delivered_kwh = requested_kwh.min(self.current_soc_kwh * eta_d);

        self.current_soc_kwh = (self.current_soc_kwh - delivered_kwh / eta_d).max(0.0);

        Ok(delivered_kwh / duration_h)
    }
}

fn check_step(power_kw: f64, duration_h: f64) -> Result<(), BatteryError> {
    if !power_kw.is_finite() {
        return Err(BatteryError::InvalidParameter(format!(
            "power_kw must be finite, got {power_kw}"
        )));
    }
    if !(duration_h.is_finite() && duration_h > 0.0) {
        return Err(BatteryError::InvalidParameter(format!(
            "duration_h must be positive, got {duration_h}"
        )));
    }
    Ok(())
}

impl std::fmt::Display for Battery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Battery({}: SOC={:.2} kWh / {} kWh, max_charge={} kW, max_discharge={} kW, eta={})",
            self.id,
            self.current_soc_kwh,
            self.capacity_kwh,
            self.max_charge_kw,
            self.max_discharge_kw,
            self.round_trip_efficiency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn spec(eta: f64) -> BatterySpec {
        BatterySpec {
            capacity_kwh: 10.0,
            current_soc_kwh: 5.0,
            max_charge_kw: 2.0,
            max_discharge_kw: 2.0,
            round_trip_efficiency: eta,
            efficiency_model: EfficiencyModel::PerLeg,
        }
    }

    #[test]
    fn test_initial_soc_is_clamped() {
        let high = Battery::new("b", BatterySpec { current_soc_kwh: 42.0, ..spec(1.0) }).unwrap();
        assert_eq!(high.current_soc_kwh(), 10.0);

        let low = Battery::new("b", BatterySpec { current_soc_kwh: -3.0, ..spec(1.0) }).unwrap();
        assert_eq!(low.current_soc_kwh(), 0.0);
    }

    #[rstest]
    #[case(BatterySpec { capacity_kwh: -1.0, ..spec(1.0) })]
    #[case(BatterySpec { max_charge_kw: -1.0, ..spec(1.0) })]
    #[case(BatterySpec { max_discharge_kw: f64::NAN, ..spec(1.0) })]
    #[case(spec(0.0))]
    #[case(spec(1.2))]
    fn test_invalid_parameters_are_rejected(#[case] spec: BatterySpec) {
        assert!(matches!(
            Battery::new("bad", spec),
            Err(BatteryError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_zero_capacity_is_valid() {
        let mut battery = Battery::new("empty", BatterySpec { capacity_kwh: 0.0, ..spec(0.9) }).unwrap();
        assert_eq!(battery.current_soc_kwh(), 0.0);
        assert_eq!(battery.charge(2.0, 1.0).unwrap(), 0.0);
        assert_eq!(battery.discharge(2.0, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_charge_applies_efficiency_and_power_limit() {
        let mut battery = Battery::new("b", spec(0.95)).unwrap();
        // 3 kW requested, clamped to 2 kW; 2 h * 2 kW * 0.95 = 3.8 kWh stored
        let actual = battery.charge(3.0, 2.0).unwrap();
        assert!((actual - 2.0).abs() < 1e-9);
        assert!((battery.current_soc_kwh() - 8.8).abs() < 1e-9);
    }

    #[test]
    fn test_charge_is_capped_by_headroom() {
        let mut battery = Battery::new("b", BatterySpec { current_soc_kwh: 9.5, ..spec(1.0) }).unwrap();
        let actual = battery.charge(2.0, 1.0).unwrap();
        assert!((actual - 0.5).abs() < 1e-9);
        assert_eq!(battery.current_soc_kwh(), 10.0);
    }

    #[test]
    fn test_discharge_is_capped_by_available_energy() {
        let mut battery = Battery::new("b", BatterySpec { current_soc_kwh: 1.0, ..spec(0.9) }).unwrap();
        // only 1.0 * 0.9 kWh can be delivered
        let actual = battery.discharge(2.0, 1.0).unwrap();
        assert!((actual - 0.9).abs() < 1e-9);
        assert!(battery.current_soc_kwh().abs() < 1e-9);
    }

    #[test]
    fn test_negative_power_is_treated_as_zero() {
        let mut battery = Battery::new("b", spec(0.95)).unwrap();
        assert_eq!(battery.charge(-5.0, 1.0).unwrap(), 0.0);
        assert_eq!(battery.discharge(-5.0, 1.0).unwrap(), 0.0);
        assert_eq!(battery.current_soc_kwh(), 5.0);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    fn test_non_positive_duration_fails_fast(#[case] duration_h: f64) {
        let mut battery = Battery::new("b", spec(0.95)).unwrap();
        assert!(battery.charge(1.0, duration_h).is_err());
        assert!(battery.discharge(1.0, duration_h).is_err());
        assert_eq!(battery.current_soc_kwh(), 5.0);
    }

    #[test]
    fn test_per_leg_round_trip_loses_eta_squared() {
        let mut battery = Battery::new("b", BatterySpec { current_soc_kwh: 0.0, ..spec(0.9) }).unwrap();
        battery.charge(2.0, 1.0).unwrap();
        let stored = battery.current_soc_kwh();
        let delivered = battery.discharge(2.0, 1.0).unwrap();
        assert!((stored - 1.8).abs() < 1e-9);
        // 2 kWh in, 2 * 0.81 kWh back out
        assert!((delivered - 1.62).abs() < 1e-9);
    }

    #[test]
    fn test_split_round_trip_loses_eta() {
        let mut battery = Battery::new(
            "b",
            BatterySpec {
                current_soc_kwh: 0.0,
                efficiency_model: EfficiencyModel::Split,
                ..spec(0.81)
            },
        )
        .unwrap();
        battery.charge(2.0, 1.0).unwrap();
        let delivered = battery.discharge(2.0, 1.0).unwrap();
        assert!((delivered - 1.62).abs() < 1e-9);
    }

    #[test]
    fn test_set_soc_clamps() {
        let mut battery = Battery::new("b", spec(1.0)).unwrap();
        battery.set_soc(11.0);
        assert_eq!(battery.current_soc_kwh(), 10.0);
        battery.set_soc(-1e-12);
        assert_eq!(battery.current_soc_kwh(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_lossless_round_trip_restores_soc(
            soc in 2.0f64..8.0,
            power in 0.0f64..2.0,
            hours in 0.1f64..1.0,
        ) {
            let mut battery = Battery::new("b", BatterySpec { current_soc_kwh: soc, ..spec(1.0) }).unwrap();
            battery.charge(power, hours).unwrap();
            battery.discharge(power, hours).unwrap();
            prop_assert!((battery.current_soc_kwh() - soc).abs() < 1e-9);
        }

        #[test]
        fn prop_soc_stays_within_bounds(
            steps in proptest::collection::vec((-3.0f64..3.0, 0.1f64..4.0), 1..40),
            eta in 0.5f64..=1.0,
        ) {
            let mut battery = Battery::new("b", spec(eta)).unwrap();
            for (power, hours) in steps {
                if power >= 0.0 {
                    battery.charge(power, hours).unwrap();
                } else {
                    battery.discharge(-power, hours).unwrap();
                }
                prop_assert!(battery.current_soc_kwh() >= 0.0);
                prop_assert!(battery.current_soc_kwh() <= battery.capacity_kwh());
            }
        }
    }
}
