//! `codriver-runtime` – wires the telemetry pipeline together and runs it.
//!
//! # Modules
//!
//! - [`pipeline`] – [`TelemetryPipeline`]: the polling loop that reads a
//!   snapshot every interval and fans it out to the gated rules.
//! - [`turn_relay`] – [`install_turn_relay`]: releases the floor when a
//!   dialogue turn completes and holds it while the user speaks.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.
//!   Set `OTEL_EXPORTER_OTLP_ENDPOINT` to export traces to any
//!   OTLP-compatible collector.

pub mod pipeline;
pub mod telemetry;
pub mod turn_relay;

pub use pipeline::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, TelemetryPipeline};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use turn_relay::{TurnRelay, install_turn_relay};
