//! `codriver-kernel` – decides whether, and when, a reaction rule may speak.
//!
//! # Modules
//!
//! - [`gate`] – [`HandlerGate`]: once-only, floor, minimum-wait, cooldown
//!   and chance checks wrapped around every rule.
//! - [`rules`] – the [`ReactionRule`] trait, the explicit [`RuleRegistry`]
//!   and the built-in rules.
//! - [`clock`] – injectable time source for deterministic tests.

pub mod clock;
pub mod gate;
pub mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{Emitter, GateConfig, HandlerGate, Outcome, SkipReason};
pub use rules::{GateOverride, ReactionRule, RuleRegistry};
