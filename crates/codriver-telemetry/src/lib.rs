//! `codriver-telemetry` – turns the game plugin's raw shared memory into
//! [`TelemetrySnapshot`](codriver_types::TelemetrySnapshot)s.
//!
//! | Module | Role |
//! |---|---|
//! | [`layout`] | declarative binary layouts, decoder and encoder |
//! | [`versions`] | one layout per supported plugin revision |
//! | [`registry`] | picks the layout matching a buffer's version tag |
//! | [`shm`] | read-only mapping of the plugin segment |
//! | [`sim`] | seeded synthetic drive rendered into a real buffer |
//! | [`locations`] | reference locations and nearest-neighbour lookup |
//! | [`source`] | the [`TelemetrySource`] tying it all together |

pub mod layout;
pub mod locations;
pub mod registry;
pub mod shm;
pub mod sim;
pub mod source;
pub mod versions;

pub use layout::{FieldKind, Primitive, StructLayout};
pub use locations::{Location, LocationIndex};
pub use registry::LayoutRegistry;
pub use source::{SourceMode, TelemetrySource};
pub use versions::TelemetryLayout;
