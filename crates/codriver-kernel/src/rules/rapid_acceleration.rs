//! Occasionally remarks on hard acceleration.  Off unless enabled in
//! configuration.

use std::time::Duration;

use codriver_types::{CoDriverError, TelemetrySnapshot};

use crate::gate::{Emitter, GateConfig};
use crate::rules::ReactionRule;

#[derive(Debug, Clone)]
pub struct RapidAcceleration {
    /// m/s² along the truck's longitudinal axis.
    pub threshold: f64,
}

impl Default for RapidAcceleration {
    fn default() -> Self {
        Self { threshold: 2.5 }
    }
}

impl ReactionRule for RapidAcceleration {
    fn name(&self) -> &str {
        "rapid_acceleration"
    }

    fn subscriptions(&self) -> &[&'static str] {
        &["truck.acceleration_x"]
    }

    fn default_gate(&self) -> GateConfig {
        GateConfig::default()
            .with_cooldown(Duration::from_secs(1800))
            .with_chance(0.4)
    }

    fn enabled_by_default(&self) -> bool {
        false
    }

    fn handle(&self, snapshot: &TelemetrySnapshot, emitter: &Emitter<'_>) -> Result<bool, CoDriverError> {
        match snapshot.f64_at("truck.acceleration_x") {
            Some(accel) if accel > self.threshold => {
                emitter.request_dialogue("Generate a comment on rapid acceleration.")?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use codriver_types::Value;

    use super::*;
    use crate::gate::Outcome;
    use crate::rules::testing::{run, snapshot};

    #[test]
    fn flooring_it_is_noticed() {
        let snap = snapshot(&[("truck.acceleration_x", Value::F32(3.0))]);
        let (outcome, said) = run(Box::new(RapidAcceleration::default()), &snap);
        assert_eq!(outcome, Outcome::Spoke);
        assert_eq!(said, vec!["Generate a comment on rapid acceleration."]);
    }

    #[test]
    fn normal_pull_away_is_not() {
        let snap = snapshot(&[("truck.acceleration_x", Value::F32(1.2))]);
        let (outcome, _) = run(Box::new(RapidAcceleration::default()), &snap);
        assert_eq!(outcome, Outcome::Declined);
    }
}
