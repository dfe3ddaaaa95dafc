//! [`TelemetryPipeline`] – the polling loop that drives decode → diff →
//! dispatch.
//!
//! Each [`tick`](TelemetryPipeline::tick) reads one snapshot from the
//! [`TelemetrySource`] and hands it to the [`SubscriptionManager`], which
//! wakes the gated rules whose paths changed.  Rules talk to the rest of the
//! system only through the [`EventBus`].
//!
//! # Example
//!
//! ```rust
//! use codriver_kernel::RuleRegistry;
//! use codriver_middleware::EventBus;
//! use codriver_runtime::TelemetryPipeline;
//! use codriver_telemetry::{LayoutRegistry, LocationIndex, SourceMode, TelemetrySource};
//!
//! let bus = EventBus::new();
//! let source = TelemetrySource::open(
//!     SourceMode::Synthetic { seed: 1 },
//!     &LayoutRegistry::builtin(),
//!     LocationIndex::bundled().unwrap(),
//! )
//! .unwrap();
//! let rules = RuleRegistry::builder(bus.clone()).with_builtin_rules().build();
//! let mut pipeline = TelemetryPipeline::new(source, rules, bus).unwrap();
//! let changed = pipeline.tick().unwrap();
//! assert!(!changed.is_empty());
//! pipeline.close();
//! ```

use std::time::Duration;

use codriver_kernel::RuleRegistry;
use codriver_middleware::{EventBus, SubscriptionManager};
use codriver_telemetry::TelemetrySource;
use codriver_types::CoDriverError;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

/// Default delay between two snapshots.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Shortest delay the loop accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct TelemetryPipeline {
    source: TelemetrySource,
    manager: SubscriptionManager,
    rules: RuleRegistry,
    bus: EventBus,
    poll_interval: Duration,
}

impl TelemetryPipeline {
    /// Attach every rule in `rules` to a fresh [`SubscriptionManager`].
    ///
    /// # Errors
    ///
    /// [`CoDriverError::InvalidPattern`] when a rule subscribes to a pattern
    /// that does not compile.
    pub fn new(source: TelemetrySource, rules: RuleRegistry, bus: EventBus) -> Result<Self, CoDriverError> {
        let mut manager = SubscriptionManager::new();
        rules.attach(&mut manager)?;
        info!(rules = rules.len(), version = source.version(), "telemetry pipeline ready");
        Ok(Self {
            source,
            manager,
            rules,
            bus,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Intervals shorter than [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Read one snapshot and dispatch it.  Returns the changed paths.
    ///
    /// # Errors
    ///
    /// Whatever [`TelemetrySource::get_snapshot`] returns.  Handler
    /// failures never surface here.
    pub fn tick(&mut self) -> Result<Vec<String>, CoDriverError> {
        let snapshot = self
            .source
            .get_snapshot()
            .inspect_err(|e| error!(error = %e, "telemetry read failed"))?;
        let changed = self.manager.notify(&snapshot);
        debug!(changed = changed.len(), "telemetry tick");
        Ok(changed)
    }

    /// Tick every poll interval until `shutdown` turns `true` or its sender
    /// is dropped.  Returns the number of ticks run.
    ///
    /// # Errors
    ///
    /// The first read error stops the loop and is returned.
    #[instrument(skip_all, fields(interval_ms = self.poll_interval.as_millis() as u64))]
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<u64, CoDriverError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick()?;
                    ticks += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(ticks, "telemetry pipeline stopped");
        Ok(ticks)
    }

    /// Detach the rules, close the source and shut the bus down.  Calling it
    /// again is a no-op.
    pub fn close(&mut self) {
        if self.source.is_closed() {
            return;
        }
        self.rules.detach(&mut self.manager);
        self.source.close();
        self.bus.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use codriver_kernel::ManualClock;
    use codriver_middleware::handler;
    use codriver_telemetry::{LayoutRegistry, LocationIndex, SourceMode};
    use codriver_types::{EventCategory, EventKind, EventPayload};
    use parking_lot::Mutex;

    use super::*;
    use crate::turn_relay::install_turn_relay;

    fn pipeline(bus: &EventBus) -> TelemetryPipeline {
        let source = TelemetrySource::open(
            SourceMode::Synthetic { seed: 11 },
            &LayoutRegistry::builtin(),
            LocationIndex::bundled().unwrap(),
        )
        .unwrap();
        let rules = RuleRegistry::builder(bus.clone())
            .with_builtin_rules()
            .clock(Arc::new(ManualClock::new()))
            .seed(11)
            .build();
        TelemetryPipeline::new(source, rules, bus.clone())
            .unwrap()
            .with_poll_interval(Duration::from_millis(5))
    }

    fn collect_requests(bus: &EventBus) -> Arc<Mutex<Vec<String>>> {
        let said = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&said);
        bus.subscribe(
            EventKind::DialogueResponseRequest,
            handler(move |event| {
                sink.lock()
                    .push(event.payload.message().unwrap_or_default().to_string());
                Ok(())
            }),
        );
        said
    }

    #[test]
    fn first_tick_sees_everything_and_one_rule_speaks() {
        let bus = EventBus::new();
        let said = collect_requests(&bus);
        let mut pipeline = pipeline(&bus);

        let changed = pipeline.tick().unwrap();
        assert!(changed.iter().any(|p| p == "truck.speed"));
        assert!(changed.iter().any(|p| p == "game.time_abs"));
        assert!(bus.telemetry_handlers_blocked());

        // Later ticks are starved while the turn is unfinished.
        for _ in 0..5 {
            pipeline.tick().unwrap();
        }
        pipeline.close();
        assert_eq!(said.lock().len(), 1);
    }

    #[test]
    fn completed_turns_let_the_next_rule_speak() {
        let bus = EventBus::new();
        let said = collect_requests(&bus);
        let _relay = install_turn_relay(&bus);
        let mut pipeline = pipeline(&bus);

        pipeline.tick().unwrap();
        assert!(bus.telemetry_handlers_blocked());

        // What the dialogue pipeline sends when it is done talking.
        bus.emit(EventKind::RequestComplete, EventPayload::None, EventCategory::Generic)
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while bus.telemetry_handlers_blocked() && Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert!(!bus.telemetry_handlers_blocked());

        // The truck is still near a city and its speed changed.
        pipeline.tick().unwrap();
        pipeline.close();
        assert_eq!(said.lock().len(), 2);
    }

    #[test]
    fn closed_pipeline_reports_the_source_closed() {
        let bus = EventBus::new();
        let mut pipeline = pipeline(&bus);
        pipeline.close();
        pipeline.close();
        assert_eq!(pipeline.tick(), Err(CoDriverError::SourceClosed));
    }

    #[tokio::test]
    async fn run_stops_on_the_shutdown_signal() {
        let bus = EventBus::new();
        let mut pipeline = pipeline(&bus);
        let (tx, rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            tx.send(true).unwrap();
        });
        let ticks = pipeline.run(rx).await.unwrap();
        stopper.await.unwrap();
        assert!(ticks >= 1);
        pipeline.close();
    }

    #[tokio::test]
    async fn zero_interval_is_raised_to_the_minimum() {
        let bus = EventBus::new();
        let mut pipeline = pipeline(&bus).with_poll_interval(Duration::ZERO);
        assert_eq!(pipeline.poll_interval(), MIN_POLL_INTERVAL);

        let (tx, rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        });
        assert!(pipeline.run(rx).await.unwrap() >= 1);
        stopper.await.unwrap();
        pipeline.close();
    }

    #[tokio::test]
    async fn run_surfaces_read_errors() {
        let bus = EventBus::new();
        let mut pipeline = pipeline(&bus);
        pipeline.close();
        let (_tx, rx) = watch::channel(false);
        assert_eq!(pipeline.run(rx).await, Err(CoDriverError::SourceClosed));
    }
}
