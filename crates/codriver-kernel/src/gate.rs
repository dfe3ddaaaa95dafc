//! [`HandlerGate`] – the cooldown / probability / floor wrapper every
//! reaction rule runs behind.
//!
//! On each change notification the gate evaluates, in this order, stopping
//! at the first check that fails:
//!
//! | # | Check | Skips when |
//! |---|---|---|
//! | 1 | once only | the rule is one-shot and has fired |
//! | 2 | floor | another rule or the user holds the [`Floor`] |
//! | 3 | minimum wait | less than `minimum_wait` since the gate was created |
//! | 4 | cooldown | no more than `cooldown` since the rule last fired |
//! | 5 | chance | a uniform sample in `[0, 1)` is `>= chance` |
//!
//! When every check passes the gate takes the floor, commits its fired state
//! and runs the rule.  A rule that returns `Ok(false)` said nothing, so the
//! floor is handed back at once.  A rule that returns `Ok(true)` keeps the
//! floor until the dialogue pipeline reports the turn complete.
//!
//! Fired state is committed before the rule runs: a rule that fails or
//! panics still starts its cooldown.

use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use codriver_middleware::subscription::panic_message;
use codriver_middleware::{EventBus, Floor, TelemetryHandler};
use codriver_types::{CoDriverError, Event, EventCategory, EventKind, EventPayload, TelemetrySnapshot};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::rules::ReactionRule;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Gate parameters of one rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Quiet period after a fire.  Zero disables the check.
    pub cooldown: Duration,
    /// Probability of firing once every other check passed.
    pub chance: f64,
    /// Grace period after the gate is created.
    pub minimum_wait: Duration,
    /// Fire at most once for the lifetime of the gate.
    pub once_only: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::ZERO,
            chance: 1.0,
            minimum_wait: Duration::ZERO,
            once_only: false,
        }
    }
}

impl GateConfig {
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_chance(mut self, chance: f64) -> Self {
        self.chance = chance;
        self
    }

    pub fn with_minimum_wait(mut self, minimum_wait: Duration) -> Self {
        self.minimum_wait = minimum_wait;
        self
    }

    pub fn once_only(mut self) -> Self {
        self.once_only = true;
        self
    }
}

/// Why an evaluation did not run the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyFired,
    FloorHeld,
    MinimumWait,
    CoolingDown,
    Chance,
}

/// Result of one [`HandlerGate::evaluate`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Skipped(SkipReason),
    /// The rule ran and produced nothing; the floor was released.
    Declined,
    /// The rule ran and handed a turn to the dialogue pipeline; the floor
    /// stays held.
    Spoke,
    /// The rule returned an error or panicked.
    Failed(CoDriverError),
}

#[derive(Debug)]
struct GateState {
    last_fire: Option<Instant>,
    fired_once: bool,
    created_at: Instant,
}

// ────────────────────────────────────────────────────────────────────────────
// Emitter
// ────────────────────────────────────────────────────────────────────────────

/// The only way a rule may publish.  Every emission goes out on
/// [`EventCategory::Telemetry`] and restarts the rule's cooldown.
pub struct Emitter<'a> {
    source: &'a str,
    bus: &'a EventBus,
    state: &'a Mutex<GateState>,
    clock: &'a dyn Clock,
    emitted: Cell<bool>,
}

impl Emitter<'_> {
    pub fn emit_event(&self, kind: EventKind, message: impl Into<String>) -> Result<(), CoDriverError> {
        let message = message.into();
        self.state.lock().last_fire = Some(self.clock.now());
        self.emitted.set(true);
        info!(rule = self.source, kind = ?kind, %message, "rule emitting");
        self.bus.publish(
            Event::new(self.source, kind, EventPayload::Message(message)),
            EventCategory::Telemetry,
        )
    }

    /// Shorthand for a [`EventKind::DialogueResponseRequest`].
    pub fn request_dialogue(&self, message: impl Into<String>) -> Result<(), CoDriverError> {
        self.emit_event(EventKind::DialogueResponseRequest, message)
    }

    pub fn has_emitted(&self) -> bool {
        self.emitted.get()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HandlerGate
// ────────────────────────────────────────────────────────────────────────────

/// One rule plus its gate state.
pub struct HandlerGate {
    rule: Box<dyn ReactionRule>,
    config: GateConfig,
    state: Mutex<GateState>,
    bus: EventBus,
    floor: Arc<Floor>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl HandlerGate {
    /// Gate `rule` on `bus`'s floor using the system clock and an
    /// entropy-seeded RNG.
    pub fn new(rule: Box<dyn ReactionRule>, config: GateConfig, bus: EventBus) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            rule,
            config,
            state: Mutex::new(GateState {
                last_fire: None,
                fired_once: false,
                created_at: clock.now(),
            }),
            floor: bus.floor(),
            bus,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the clock.  The creation instant is re-read from it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state.get_mut().created_at = clock.now();
        self.clock = clock;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn name(&self) -> &str {
        self.rule.name()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn subscriptions(&self) -> &[&'static str] {
        self.rule.subscriptions()
    }

    pub fn has_fired(&self) -> bool {
        self.state.lock().fired_once
    }

    /// Forget every fire and restart the minimum-wait period, as if the gate
    /// had just been created.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.last_fire = None;
        state.fired_once = false;
        state.created_at = self.clock.now();
    }

    /// Run the checks and, if they pass, the rule.
    pub fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Outcome {
        let name = self.rule.name();
        let previous_fire = match self.check() {
            Ok(previous) => previous,
            Err(reason) => {
                debug!(rule = name, ?reason, "gate skipped");
                return Outcome::Skipped(reason);
            }
        };

        let emitter = Emitter {
            source: name,
            bus: &self.bus,
            state: &self.state,
            clock: self.clock.as_ref(),
            emitted: Cell::new(false),
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| self.rule.handle(snapshot, &emitter)));

        match outcome {
            Ok(Ok(true)) => {
                info!(rule = name, "rule fired; floor held until the turn completes");
                Outcome::Spoke
            }
            Ok(Ok(false)) => {
                if !emitter.has_emitted() {
                    // Nothing was said, so the attempt does not count
                    // towards the cooldown.
                    self.state.lock().last_fire = previous_fire;
                }
                self.floor.release();
                debug!(rule = name, "rule declined; floor released");
                Outcome::Declined
            }
            Ok(Err(err)) => self.fail(name, err.to_string(), &emitter),
            Err(panic) => self.fail(name, panic_message(panic.as_ref()), &emitter),
        }
    }

    /// Checks 1–5, then take the floor and commit the fired state.  Returns
    /// the previous fire instant.
    fn check(&self) -> Result<Option<Instant>, SkipReason> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if self.config.once_only && state.fired_once {
            return Err(SkipReason::AlreadyFired);
        }
        if self.floor.is_held() {
            return Err(SkipReason::FloorHeld);
        }
        if now.saturating_duration_since(state.created_at) < self.config.minimum_wait {
            return Err(SkipReason::MinimumWait);
        }
        if let Some(last) = state.last_fire {
            if !self.config.cooldown.is_zero()
                && now.saturating_duration_since(last) <= self.config.cooldown
            {
                return Err(SkipReason::CoolingDown);
            }
        }
        let sample: f64 = self.rng.lock().r#gen();
        if sample >= self.config.chance {
            return Err(SkipReason::Chance);
        }
        if !self.floor.try_acquire() {
            return Err(SkipReason::FloorHeld);
        }

        let previous = state.last_fire.replace(now);
        state.fired_once = true;
        Ok(previous)
    }

    fn fail(&self, name: &str, details: String, emitter: &Emitter<'_>) -> Outcome {
        if !emitter.has_emitted() {
            self.floor.release();
        }
        let err = CoDriverError::HandlerFailure {
            handler: name.to_string(),
            details,
        };
        error!(rule = name, error = %err, "rule failed; cooldown still applies");
        Outcome::Failed(err)
    }
}

impl TelemetryHandler for HandlerGate {
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn on_change(&self, snapshot: &TelemetrySnapshot) -> Result<(), CoDriverError> {
        match self.evaluate(snapshot) {
            Outcome::Failed(err) => Err(err),
            _ => Ok(()),
        }
    }
}
