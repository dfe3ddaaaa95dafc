//! Reaction rules and the explicit registry that wires them to gates.
//!
//! A [`ReactionRule`] holds only domain logic: which telemetry paths wake it
//! and what to say.  Cooldown, probability and floor handling live in the
//! [`HandlerGate`] each rule is wrapped in.
//!
//! Rules are registered by hand through [`RuleRegistry::builder`]; there is
//! no discovery.  Per-rule [`GateOverride`]s from configuration can enable or
//! disable a rule or change its gate parameters.
//!
//! # Example
//!
//! ```
//! use codriver_kernel::rules::RuleRegistry;
//! use codriver_middleware::{EventBus, SubscriptionManager};
//!
//! let bus = EventBus::new();
//! let registry = RuleRegistry::builder(bus.clone()).with_builtin_rules().build();
//! let mut manager = SubscriptionManager::new();
//! registry.attach(&mut manager).unwrap();
//! assert!(manager.patterns().any(|p| p == "truck.speed"));
//! bus.shutdown();
//! ```

pub mod city_proximity;
pub mod fuel_reminder;
pub mod harsh_braking;
pub mod rapid_acceleration;
pub mod speeding;
pub mod time_greeting;
pub mod weather_change;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use codriver_middleware::{EventBus, HandlerRef, SubscriptionManager};
use codriver_types::{CoDriverError, TelemetrySnapshot};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::gate::{Emitter, GateConfig, HandlerGate};

/// Domain half of a telemetry reaction.
pub trait ReactionRule: Send + Sync {
    /// Stable identifier, also the key of the rule's configuration table.
    fn name(&self) -> &str;

    /// Glob patterns of the paths that wake the rule.
    fn subscriptions(&self) -> &[&'static str];

    /// Gate parameters used when configuration does not override them.
    fn default_gate(&self) -> GateConfig {
        GateConfig::default()
    }

    /// Whether the rule runs when configuration says nothing about it.
    fn enabled_by_default(&self) -> bool {
        true
    }

    /// Inspect `snapshot` and optionally speak through `emitter`.
    ///
    /// Return `Ok(true)` when a dialogue turn was requested (the floor stays
    /// held until it completes) and `Ok(false)` otherwise.
    fn handle(&self, snapshot: &TelemetrySnapshot, emitter: &Emitter<'_>) -> Result<bool, CoDriverError>;
}

/// Configuration overrides for one rule.  Unset fields keep the rule's
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_wait_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub once_only: Option<bool>,
}

impl GateOverride {
    /// `enabled` when set, otherwise `default`.
    pub fn is_enabled(&self, default: bool) -> bool {
        self.enabled.unwrap_or(default)
    }

    /// Layer the set fields over `base`.  Negative or non-finite durations
    /// are ignored; `chance` is clamped to `[0, 1]`.
    pub fn apply(&self, base: GateConfig) -> GateConfig {
        let secs = |value: Option<f64>| value.and_then(|s| Duration::try_from_secs_f64(s).ok());
        GateConfig {
            cooldown: secs(self.cooldown_secs).unwrap_or(base.cooldown),
            chance: self
                .chance
                .filter(|c| c.is_finite())
                .map_or(base.chance, |c| c.clamp(0.0, 1.0)),
            minimum_wait: secs(self.minimum_wait_secs).unwrap_or(base.minimum_wait),
            once_only: self.once_only.unwrap_or(base.once_only),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

/// The gated rules of one run.
pub struct RuleRegistry {
    gates: Vec<Arc<HandlerGate>>,
}

impl RuleRegistry {
    pub fn builder(bus: EventBus) -> RuleRegistryBuilder {
        RuleRegistryBuilder {
            bus,
            rules: Vec::new(),
            overrides: HashMap::new(),
            clock: None,
            seed: None,
        }
    }

    pub fn gates(&self) -> &[Arc<HandlerGate>] {
        &self.gates
    }

    pub fn names(&self) -> Vec<&str> {
        self.gates.iter().map(|gate| gate.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Subscribe every gate to its rule's patterns.
    pub fn attach(&self, manager: &mut SubscriptionManager) -> Result<(), CoDriverError> {
        for gate in &self.gates {
            let handler: HandlerRef = gate.clone();
            manager.subscribe(gate.subscriptions(), handler)?;
        }
        Ok(())
    }

    /// Undo [`attach`](Self::attach).  Every gate is reset, so a later
    /// attach starts from fresh state.
    pub fn detach(&self, manager: &mut SubscriptionManager) {
        for gate in &self.gates {
            let handler: HandlerRef = gate.clone();
            manager.unsubscribe(gate.subscriptions(), &handler);
            gate.reset();
        }
    }
}

/// Builder for [`RuleRegistry`].
pub struct RuleRegistryBuilder {
    bus: EventBus,
    rules: Vec<Box<dyn ReactionRule>>,
    overrides: HashMap<String, GateOverride>,
    clock: Option<Arc<dyn Clock>>,
    seed: Option<u64>,
}

impl RuleRegistryBuilder {
    /// Register every rule shipped with this crate.  Weather and
    /// acceleration remarks stay off unless an override enables them.
    pub fn with_builtin_rules(self) -> Self {
        self.rule(Box::new(city_proximity::CityProximity::default()))
            .rule(Box::new(speeding::Speeding::default()))
            .rule(Box::new(fuel_reminder::FuelReminder::default()))
            .rule(Box::new(harsh_braking::HarshBraking::default()))
            .rule(Box::new(time_greeting::TimeGreeting))
            .rule(Box::new(weather_change::WeatherChange::default()))
            .rule(Box::new(rapid_acceleration::RapidAcceleration::default()))
    }

    pub fn rule(mut self, rule: Box<dyn ReactionRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn overrides(mut self, overrides: HashMap<String, GateOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Seed the gates' RNGs (gate `i` gets `seed + i`) for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> RuleRegistry {
        let mut gates = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.into_iter().enumerate() {
            let name = rule.name().to_string();
            let overrides = self.overrides.get(&name).cloned().unwrap_or_default();
            if !overrides.is_enabled(rule.enabled_by_default()) {
                info!(rule = %name, "rule disabled");
                continue;
            }
            let config = overrides.apply(rule.default_gate());
            let mut gate = HandlerGate::new(rule, config, self.bus.clone());
            if let Some(clock) = &self.clock {
                gate = gate.with_clock(Arc::clone(clock));
            }
            if let Some(seed) = self.seed {
                gate = gate.with_seed(seed.wrapping_add(index as u64));
            }
            info!(
                rule = %name,
                cooldown_secs = config.cooldown.as_secs_f64(),
                chance = config.chance,
                once_only = config.once_only,
                "rule registered"
            );
            gates.push(Arc::new(gate));
        }
        RuleRegistry { gates }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_layer_over_defaults() {
        let base = GateConfig::default().with_cooldown(Duration::from_secs(1800));
        let tweak = GateOverride {
            chance: Some(1.7),
            minimum_wait_secs: Some(30.0),
            cooldown_secs: Some(-4.0),
            ..GateOverride::default()
        };
        let config = tweak.apply(base);
        assert_eq!(config.cooldown, Duration::from_secs(1800));
        assert_eq!(config.chance, 1.0);
        assert_eq!(config.minimum_wait, Duration::from_secs(30));
        assert!(!config.once_only);
    }

    #[test]
    fn builtin_rules_register_in_order() {
        let bus = EventBus::new();
        let registry = RuleRegistry::builder(bus.clone()).with_builtin_rules().build();
        assert_eq!(
            registry.names(),
            vec!["city_proximity", "speeding", "fuel_reminder", "harsh_braking", "time_greeting"]
        );
        bus.shutdown();
    }

    #[test]
    fn disabled_rules_are_skipped_and_overrides_reach_the_gate() {
        let bus = EventBus::new();
        let mut overrides = HashMap::new();
        overrides.insert(
            "speeding".to_string(),
            GateOverride {
                enabled: Some(false),
                ..GateOverride::default()
            },
        );
        overrides.insert(
            "harsh_braking".to_string(),
            GateOverride {
                chance: Some(0.9),
                ..GateOverride::default()
            },
        );
        let registry = RuleRegistry::builder(bus.clone())
            .with_builtin_rules()
            .overrides(overrides)
            .build();
        assert!(!registry.names().contains(&"speeding"));
        let braking = registry
            .gates()
            .iter()
            .find(|g| g.name() == "harsh_braking")
            .unwrap();
        assert_eq!(braking.config().chance, 0.9);
        assert_eq!(braking.config().cooldown, Duration::from_secs(1800));
        bus.shutdown();
    }

    #[test]
    fn off_by_default_rules_can_be_switched_on() {
        let bus = EventBus::new();
        let on = GateOverride {
            enabled: Some(true),
            ..GateOverride::default()
        };
        let overrides = HashMap::from([
            ("weather_change".to_string(), on.clone()),
            ("rapid_acceleration".to_string(), on),
        ]);
        let registry = RuleRegistry::builder(bus.clone())
            .with_builtin_rules()
            .overrides(overrides)
            .build();
        assert_eq!(&registry.names()[5..], ["weather_change", "rapid_acceleration"]);
        let acceleration = &registry.gates()[6];
        assert_eq!(acceleration.config().cooldown, Duration::from_secs(1800));
        assert_eq!(acceleration.config().chance, 0.4);
        bus.shutdown();
    }

    #[test]
    fn attach_then_detach_leaves_no_patterns() {
        let bus = EventBus::new();
        let registry = RuleRegistry::builder(bus.clone()).with_builtin_rules().build();
        let mut manager = SubscriptionManager::new();
        registry.attach(&mut manager).unwrap();
        let mut patterns: Vec<&str> = manager.patterns().collect();
        patterns.sort_unstable();
        assert_eq!(
            patterns,
            vec!["game.time_abs", "truck.fuel", "truck.speed", "truck.user_brake"]
        );
        registry.detach(&mut manager);
        assert_eq!(manager.patterns().count(), 0);
        bus.shutdown();
    }

    #[test]
    fn reattached_rules_start_from_fresh_state() {
        use codriver_types::Value;

        use crate::gate::Outcome;

        let bus = EventBus::new();
        let registry = RuleRegistry::builder(bus.clone())
            .rule(Box::new(time_greeting::TimeGreeting))
            .seed(3)
            .build();
        let greeting = &registry.gates()[0];
        let snap = testing::snapshot(&[("game.time_abs", Value::U32(8 * 60))]);
        let mut manager = SubscriptionManager::new();

        registry.attach(&mut manager).unwrap();
        assert_eq!(greeting.evaluate(&snap), Outcome::Spoke);
        bus.unblock_telemetry_handlers();
        assert!(greeting.has_fired());

        registry.detach(&mut manager);
        registry.attach(&mut manager).unwrap();
        assert!(!greeting.has_fired());
        assert_eq!(greeting.evaluate(&snap), Outcome::Spoke);
        bus.shutdown();
    }

    #[test]
    fn override_table_parses_from_toml_shaped_json() {
        let json = r#"{"cooldown_secs": 60, "once_only": true}"#;
        let parsed: GateOverride = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.cooldown_secs, Some(60.0));
        assert_eq!(parsed.once_only, Some(true));
        assert!(parsed.is_enabled(true));
        assert!(!parsed.is_enabled(false));
    }
}
