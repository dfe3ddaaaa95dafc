//! `codriver-middleware` – routes changes and events without caring what
//! they mean.
//!
//! # Modules
//!
//! - [`bus`] – categorised publish/subscribe bus with one FIFO worker per
//!   category, shared state flags and the telemetry floor.
//! - [`floor`] – the single permit that serialises dialogue turns.
//! - [`subscription`] – snapshot diffing and glob-pattern fan-out to
//!   telemetry handlers.

pub mod bus;
pub mod floor;
pub mod subscription;

pub use bus::{EventBus, EventHandler, handler};
pub use floor::Floor;
pub use subscription::{GlobPattern, HandlerRef, SubscriptionManager, TelemetryHandler};
