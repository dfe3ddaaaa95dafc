//! Remarks on the weather when the driver switches the wipers or fog lights
//! on.  Off unless enabled in configuration.

use std::time::Duration;

use codriver_types::{CoDriverError, TelemetrySnapshot};
use parking_lot::Mutex;

use crate::gate::{Emitter, GateConfig};
use crate::rules::ReactionRule;

/// Layouts without fog-light telemetry simply never report fog.
const FOG_LIGHTS: &str = "truck.lights_fog";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weather {
    Clear,
    Rainy,
    Foggy,
}

impl Weather {
    fn observe(snapshot: &TelemetrySnapshot) -> Self {
        if snapshot.bool_at("truck.wipers").unwrap_or(false) {
            Weather::Rainy
        } else if snapshot.bool_at(FOG_LIGHTS).unwrap_or(false) {
            Weather::Foggy
        } else {
            Weather::Clear
        }
    }
}

#[derive(Debug, Default)]
pub struct WeatherChange {
    last: Mutex<Option<Weather>>,
}

impl ReactionRule for WeatherChange {
    fn name(&self) -> &str {
        "weather_change"
    }

    fn subscriptions(&self) -> &[&'static str] {
        &["truck.wipers", FOG_LIGHTS]
    }

    fn default_gate(&self) -> GateConfig {
        GateConfig::default()
            .with_cooldown(Duration::from_secs(3600))
            .with_chance(0.5)
    }

    fn enabled_by_default(&self) -> bool {
        false
    }

    fn handle(&self, snapshot: &TelemetrySnapshot, emitter: &Emitter<'_>) -> Result<bool, CoDriverError> {
        let now = Weather::observe(snapshot);
        if self.last.lock().replace(now) == Some(now) {
            return Ok(false);
        }
        let label = match now {
            Weather::Clear => return Ok(false),
            Weather::Rainy => "rainy",
            Weather::Foggy => "foggy",
        };
        emitter.request_dialogue(format!(
            "Generate a comment on the changing weather conditions: now it's {label}."
        ))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use codriver_middleware::EventBus;
    use codriver_types::Value;

    use super::*;
    use crate::gate::{HandlerGate, Outcome};
    use crate::rules::testing::{run, snapshot};

    fn wipers(on: bool) -> TelemetrySnapshot {
        snapshot(&[("truck.wipers", Value::Bool(on))])
    }

    /// One gate kept across several snapshots, floor released after each.
    fn outcomes(snaps: &[TelemetrySnapshot]) -> Vec<Outcome> {
        let bus = EventBus::new();
        let gate = HandlerGate::new(Box::new(WeatherChange::default()), GateConfig::default(), bus.clone())
            .with_seed(1);
        let outcomes = snaps
            .iter()
            .map(|snap| {
                let outcome = gate.evaluate(snap);
                bus.unblock_telemetry_handlers();
                outcome
            })
            .collect();
        bus.shutdown();
        outcomes
    }

    #[test]
    fn rain_is_mentioned() {
        let (outcome, said) = run(Box::new(WeatherChange::default()), &wipers(true));
        assert_eq!(outcome, Outcome::Spoke);
        assert_eq!(
            said,
            vec!["Generate a comment on the changing weather conditions: now it's rainy."]
        );
    }

    #[test]
    fn unchanged_weather_is_not_repeated() {
        assert_eq!(
            outcomes(&[wipers(true), wipers(true)]),
            vec![Outcome::Spoke, Outcome::Declined]
        );
    }

    #[test]
    fn clearing_up_is_silent_but_rearms() {
        assert_eq!(
            outcomes(&[wipers(true), wipers(false), wipers(true)]),
            vec![Outcome::Spoke, Outcome::Declined, Outcome::Spoke]
        );
    }

    #[test]
    fn fog_lights_mean_fog() {
        let snap = snapshot(&[
            ("truck.wipers", Value::Bool(false)),
            (FOG_LIGHTS, Value::Bool(true)),
        ]);
        let (_, said) = run(Box::new(WeatherChange::default()), &snap);
        assert!(said[0].ends_with("now it's foggy."));
    }

    #[test]
    fn off_by_default() {
        assert!(!WeatherChange::default().enabled_by_default());
    }
}
