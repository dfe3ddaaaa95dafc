//! Reminds the driver to refuel when the tank runs low.

use std::time::Duration;

use codriver_types::{CoDriverError, TelemetrySnapshot};

use crate::gate::{Emitter, GateConfig};
use crate::rules::ReactionRule;

#[derive(Debug, Clone)]
pub struct FuelReminder {
    /// Fraction of the tank below which the reminder fires.
    pub threshold: f64,
}

impl Default for FuelReminder {
    fn default() -> Self {
        Self { threshold: 0.25 }
    }
}

impl ReactionRule for FuelReminder {
    fn name(&self) -> &str {
        "fuel_reminder"
    }

    fn subscriptions(&self) -> &[&'static str] {
        &["truck.fuel"]
    }

    fn default_gate(&self) -> GateConfig {
        GateConfig::default().with_cooldown(Duration::from_secs(7200))
    }

    fn handle(&self, snapshot: &TelemetrySnapshot, emitter: &Emitter<'_>) -> Result<bool, CoDriverError> {
        let (Some(fuel), Some(capacity)) = (
            snapshot.f64_at("truck.fuel"),
            snapshot.f64_at("truck.fuel_capacity"),
        ) else {
            return Ok(false);
        };
        if capacity <= 0.0 || fuel >= capacity * self.threshold {
            return Ok(false);
        }
        let percent = fuel / capacity * 100.0;
        emitter.request_dialogue(format!(
            "Generate a message about low fuel level. Current fuel: {fuel:.0} l. \
             Capacity: {capacity:.0} l. Percentage: {percent:.0}%"
        ))?;
        Ok(true)
    }
}
