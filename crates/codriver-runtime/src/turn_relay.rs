//! Hands the floor back to the telemetry gates when a dialogue turn ends,
//! and keeps it while the user is talking.
//!
//! | Event | Effect |
//! |---|---|
//! | `RequestComplete` | release the floor |
//! | `UserSpeechStart` | mark the user speaking, hold the floor |
//! | `UserSpeechEnd` | clear the mark, release the floor |

use codriver_middleware::{EventBus, EventHandler, handler};
use codriver_types::EventKind;
use tracing::debug;

/// Handlers installed by [`install_turn_relay`], kept so they can be
/// removed again.
pub struct TurnRelay {
    bus: EventBus,
    handlers: Vec<(EventKind, EventHandler)>,
}

impl TurnRelay {
    /// Unsubscribe every relay handler.
    pub fn uninstall(self) {
        for (kind, handler) in &self.handlers {
            self.bus.unsubscribe(*kind, handler);
        }
    }
}

/// Subscribe the relay handlers on `bus`.
pub fn install_turn_relay(bus: &EventBus) -> TurnRelay {
    let complete = {
        let bus = bus.clone();
        handler(move |event| {
            debug!(source = %event.source, "turn complete; floor released");
            bus.unblock_telemetry_handlers();
            Ok(())
        })
    };
    let speech_start = {
        let bus = bus.clone();
        handler(move |_| {
            bus.set_state(EventKind::UserSpeechStart, true);
            bus.block_telemetry_handlers();
            debug!("user speaking; floor held");
            Ok(())
        })
    };
    let speech_end = {
        let bus = bus.clone();
        handler(move |_| {
            bus.set_state(EventKind::UserSpeechStart, false);
            bus.unblock_telemetry_handlers();
            debug!("user finished speaking; floor released");
            Ok(())
        })
    };

    let handlers = vec![
        (EventKind::RequestComplete, complete),
        (EventKind::UserSpeechStart, speech_start),
        (EventKind::UserSpeechEnd, speech_end),
    ];
    for (kind, handler) in &handlers {
        bus.subscribe(*kind, handler.clone());
    }
    TurnRelay {
        bus: bus.clone(),
        handlers,
    }
}
