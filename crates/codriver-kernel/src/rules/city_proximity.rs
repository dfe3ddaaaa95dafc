//! Announces the nearest reference location once the truck is close to it.

use codriver_types::{CoDriverError, TelemetrySnapshot};
use tracing::debug;

use crate::gate::Emitter;
use crate::rules::ReactionRule;

/// Fires while the nearest location is within `threshold` metres.
#[derive(Debug, Clone)]
pub struct CityProximity {
    pub threshold: f64,
}

impl Default for CityProximity {
    fn default() -> Self {
        Self { threshold: 5000.0 }
    }
}

impl ReactionRule for CityProximity {
    fn name(&self) -> &str {
        "city_proximity"
    }

    fn subscriptions(&self) -> &[&'static str] {
        &["truck.speed"]
    }

    fn handle(&self, snapshot: &TelemetrySnapshot, emitter: &Emitter<'_>) -> Result<bool, CoDriverError> {
        let nearest = snapshot
            .nearest_locations()
            .into_iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance));
        let Some(city) = nearest else {
            debug!("no reference locations attached to the snapshot");
            return Ok(false);
        };
        if city.distance > self.threshold {
            return Ok(false);
        }
        emitter.request_dialogue(format!(
            "Generate a CONVERSATIONAL message that we are approaching {}",
            city.name
        ))?;
        debug!(city = %city.name, distance = city.distance, "approaching city");
        Ok(true)
    }
}
