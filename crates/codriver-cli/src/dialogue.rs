//! Console stand-in for the dialogue pipeline.
//!
//! Prints every dialogue request, then reports the turn finished so the
//! floor goes back to the rules.

use codriver_middleware::{EventBus, handler};
use codriver_types::{Event, EventCategory, EventKind, EventPayload};
use colored::Colorize;
use tracing::info;

const SOURCE: &str = "codriver-cli::dialogue";

/// Subscribe the console collaborator to `bus`.
pub fn install(bus: &EventBus) {
    let replies = bus.clone();
    bus.subscribe(
        EventKind::DialogueResponseRequest,
        handler(move |event| {
            let message = event.payload.message().unwrap_or_default();
            info!(rule = %event.source, %message, "dialogue requested");
            println!("  {} {}", format!("[{}]", event.source).bold().cyan(), message);

            replies.publish(
                Event::new(
                    SOURCE,
                    EventKind::DialogueResponseComplete,
                    EventPayload::Message(message.to_string()),
                ),
                EventCategory::Text,
            )?;
            replies.publish(
                Event::new(SOURCE, EventKind::RequestComplete, EventPayload::None),
                EventCategory::Generic,
            )
        }),
    );
}
