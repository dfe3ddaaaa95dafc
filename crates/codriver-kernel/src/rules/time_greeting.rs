//! Greets the driver once, according to the in-game time of day.

use codriver_types::{CoDriverError, TelemetrySnapshot};

use crate::gate::{Emitter, GateConfig};
use crate::rules::ReactionRule;

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeGreeting;

/// Part of the day for an in-game clock given in minutes.
pub fn part_of_day(time_abs: u64) -> &'static str {
    match (time_abs / 60) % 24 {
        6..=11 => "morning",
        12..=17 => "afternoon",
        _ => "evening",
    }
}

impl ReactionRule for TimeGreeting {
    fn name(&self) -> &str {
        "time_greeting"
    }

    fn subscriptions(&self) -> &[&'static str] {
        &["game.time_abs"]
    }

    fn default_gate(&self) -> GateConfig {
        GateConfig::default().once_only()
    }

    fn handle(&self, snapshot: &TelemetrySnapshot, emitter: &Emitter<'_>) -> Result<bool, CoDriverError> {
        let time_abs = snapshot
            .get("game.time_abs")
            .and_then(|v| v.to_u64())
            .unwrap_or_default();
        emitter.request_dialogue(format!(
            "Generate a good {} greeting.\n IMPORTANT: Generate BASED on YOUR co-driver profile.",
            part_of_day(time_abs)
        ))?;
        Ok(true)
    }
}
