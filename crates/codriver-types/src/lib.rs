//! `codriver-types` – shared vocabulary of the co-driver stack.
//!
//! Every other crate speaks in these types: the decoded
//! [`TelemetrySnapshot`] tree, the [`Event`] envelope routed over the bus,
//! and the workspace-wide [`CoDriverError`].

pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use snapshot::{
    NEAREST_LOCATIONS, NearbyLocation, Record, SECTION_GAME, SECTION_JOB, SECTION_NAVIGATION,
    SECTION_TRAILERS, SECTION_TRUCK, TelemetrySnapshot, Value,
};

/// Independent FIFO lanes of the event bus.
///
/// Events in one category are delivered in emission order; categories make
/// progress independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventCategory {
    Audio,
    Text,
    Ui,
    #[default]
    Generic,
    Transcription,
    /// Lane used by every reaction rule when it publishes.
    Telemetry,
}

impl EventCategory {
    /// Every category, in the order bus workers are started.
    pub const ALL: [EventCategory; 6] = [
        EventCategory::Audio,
        EventCategory::Text,
        EventCategory::Ui,
        EventCategory::Generic,
        EventCategory::Transcription,
        EventCategory::Telemetry,
    ];
}

/// What happened. Handlers subscribe per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The user started talking; telemetry chatter must hold back.
    UserSpeechStart,
    UserSpeechEnd,
    CoDriverSpeechStart,
    CoDriverSpeechEnd,
    AudioInputPause,
    AudioInputResume,
    RequestInProgress,
    /// A conversational turn finished; releases the floor.
    RequestComplete,
    TranscriptionComplete,
    /// A reaction rule asks the dialogue pipeline to say something.
    DialogueResponseRequest,
    DialogueResponseComplete,
    TelemetryReceived,
}

/// Data carried by an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum EventPayload {
    #[default]
    None,
    /// Free-form text, e.g. the instruction of a dialogue request.
    Message(String),
}

impl EventPayload {
    /// The message text, if this payload carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            EventPayload::Message(text) => Some(text),
            EventPayload::None => None,
        }
    }
}

/// Unified event wrapper for the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "codriver-kernel::speeding"
    pub source: String,
    pub kind: EventKind,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a fresh event with a new id and the current time.
    pub fn new(source: impl Into<String>, kind: EventKind, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            kind,
            payload,
        }
    }
}

/// Global error type spanning decode failures, source lifecycle misuse and
/// isolated handler failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoDriverError {
    #[error("Malformed telemetry buffer: layout needs {required} bytes, got {actual}")]
    MalformedBuffer { required: usize, actual: usize },

    #[error("Unsupported telemetry version tag {tag}")]
    UnsupportedTelemetryVersion { tag: u32 },

    #[error("Telemetry source used after close")]
    SourceClosed,

    #[error("Handler {handler} failed: {details}")]
    HandlerFailure { handler: String, details: String },

    #[error("Shared memory error: {0}")]
    SharedMemory(String),

    #[error("Invalid subscription pattern: {0}")]
    InvalidPattern(String),

    #[error("Unknown layout field: {0}")]
    UnknownField(String),

    #[error("Type mismatch on {field}: expected {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("Event bus has been shut down")]
    BusShutdown,

    #[error("Location dataset error: {0}")]
    LocationData(String),
}
