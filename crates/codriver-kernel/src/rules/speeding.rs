//! Comments when the truck goes faster than the motorway limit.

use std::time::Duration;

use codriver_types::{CoDriverError, TelemetrySnapshot};

use crate::gate::{Emitter, GateConfig};
use crate::rules::ReactionRule;

/// The plugin reports speed in m/s.
const KMH_PER_MS: f64 = 3.6;

#[derive(Debug, Clone)]
pub struct Speeding {
    /// km/h
    pub limit_kmh: f64,
}

impl Default for Speeding {
    fn default() -> Self {
        Self { limit_kmh: 90.0 }
    }
}

impl ReactionRule for Speeding {
    fn name(&self) -> &str {
        "speeding"
    }

    fn subscriptions(&self) -> &[&'static str] {
        &["truck.speed"]
    }

    fn default_gate(&self) -> GateConfig {
        GateConfig::default().with_cooldown(Duration::from_secs(1800))
    }

    fn handle(&self, snapshot: &TelemetrySnapshot, emitter: &Emitter<'_>) -> Result<bool, CoDriverError> {
        let Some(speed) = snapshot.f64_at("truck.speed") else {
            return Ok(false);
        };
        let kmh = speed * KMH_PER_MS;
        if kmh <= self.limit_kmh {
            return Ok(false);
        }
        emitter.request_dialogue(format!(
            "Comment about the user speeding. Current speed: {kmh:.0} km/h, limit: {:.0} km/h.",
            self.limit_kmh
        ))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use codriver_types::Value;

    use super::*;
    use crate::gate::Outcome;
    use crate::rules::testing::{run, snapshot};

    #[test]
    fn over_the_limit_speaks() {
        // 30 m/s = 108 km/h
        let snap = snapshot(&[("truck.speed", Value::F32(30.0))]);
        let (outcome, said) = run(Box::new(Speeding::default()), &snap);
        assert_eq!(outcome, Outcome::Spoke);
        assert!(said[0].contains("108 km/h"));
    }

    #[test]
    fn at_the_limit_stays_quiet() {
        // 25 m/s = 90 km/h
        let snap = snapshot(&[("truck.speed", Value::F32(25.0))]);
        let (outcome, said) = run(Box::new(Speeding::default()), &snap);
        assert_eq!(outcome, Outcome::Declined);
        assert!(said.is_empty());
    }

    #[test]
    fn defaults_to_a_half_hour_cooldown() {
        assert_eq!(Speeding::default().default_gate().cooldown, Duration::from_secs(1800));
    }
}
