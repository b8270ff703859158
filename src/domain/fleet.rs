use serde::Serialize;

use super::battery::{Battery, BatteryError, BatteryId, BatterySpec};

/// Ordered registry of batteries owned by the caller.
///
/// Ids handed out by [`BatteryFleet::add`] come from a monotonic counter and are
/// never reused, even after removal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatteryFleet {
    batteries: Vec<Battery>,
    #[serde(skip)]
    next_seq: u64,
}

impl BatteryFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fleet from specs, assigning generated ids in order.
    pub fn from_specs<'a>(
        specs: impl IntoIterator<Item = &'a BatterySpec>,
    ) -> Result<Self, BatteryError> {
        let mut fleet = Self::new();
        for spec in specs {
            fleet.add(spec.clone())?;
        }
        Ok(fleet)
    }

    /// Create a battery from `spec` under a freshly generated id.
    pub fn add(&mut self, spec: BatterySpec) -> Result<BatteryId, BatteryError> {
        let id = loop {
            self.next_seq += 1;
            let candidate = BatteryId::new(format!("battery_{}", self.next_seq));
            if !self.contains(&candidate) {
                break candidate;
            }
        };
        let battery = Battery::new(id.clone(), spec)?;
        self.batteries.push(battery);
        Ok(id)
    }

    /// Insert a battery that already carries an id.
    pub fn insert(&mut self, battery: Battery) -> Result<(), BatteryError> {
        if self.contains(battery.id()) {
            return Err(BatteryError::InvalidParameter(format!(
                "duplicate battery id {}",
                battery.id()
            )));
        }
        self.batteries.push(battery);
        Ok(())
    }

    pub fn contains(&self, id: &BatteryId) -> bool {
        self.batteries.iter().any(|b| b.id() == id)
    }

    pub fn get(&self, id: &BatteryId) -> Option<&Battery> {
        self.batteries.iter().find(|b| b.id() == id)
    }

    pub fn get_mut(&mut self, id: &BatteryId) -> Option<&mut Battery> {
        self.batteries.iter_mut().find(|b| b.id() == id)
    }

    pub fn remove(&mut self, id: &BatteryId) -> Option<Battery> {
        let idx = self.batteries.iter().position(|b| b.id() == id)?;
        Some(self.batteries.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Battery> {
        self.batteries.iter()
    }

    pub fn as_slice(&self) -> &[Battery] {
        &self.batteries
    }

    pub fn len(&self) -> usize {
        self.batteries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batteries.is_empty()
    }

    /// Owned copy of the batteries in registry order.
    pub fn snapshot(&self) -> Vec<Battery> {
        self.batteries.clone()
    }
}
