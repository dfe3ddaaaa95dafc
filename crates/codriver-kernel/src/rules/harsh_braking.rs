//! Occasionally remarks on hard braking.

use std::time::Duration;

use codriver_types::{CoDriverError, TelemetrySnapshot};

use crate::gate::{Emitter, GateConfig};
use crate::rules::ReactionRule;

#[derive(Debug, Clone)]
pub struct HarshBraking {
    /// Brake input in `[0, 1]` above which braking counts as harsh.
    pub threshold: f64,
}

impl Default for HarshBraking {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl ReactionRule for HarshBraking {
    fn name(&self) -> &str {
        "harsh_braking"
    }

    fn subscriptions(&self) -> &[&'static str] {
        &["truck.user_brake"]
    }

    fn default_gate(&self) -> GateConfig {
        GateConfig::default()
            .with_cooldown(Duration::from_secs(1800))
            .with_chance(0.3)
    }

    fn handle(&self, snapshot: &TelemetrySnapshot, emitter: &Emitter<'_>) -> Result<bool, CoDriverError> {
        match snapshot.f64_at("truck.user_brake") {
            Some(brake) if brake > self.threshold => {
                emitter.request_dialogue("Generate a comment on harsh braking.")?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
