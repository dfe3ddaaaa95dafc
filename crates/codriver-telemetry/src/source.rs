//! [`TelemetrySource`] – produces one decoded, location-enriched
//! [`TelemetrySnapshot`] per call.
//!
//! A source is opened in one of two modes:
//!
//! | Mode | Backend |
//! |---|---|
//! | [`SourceMode::SharedMemory`] | the plugin's live segment, layout chosen by version tag |
//! | [`SourceMode::Synthetic`] | a seeded [`SyntheticDrive`] rendered into the newest layout |
//!
//! After [`close`](TelemetrySource::close) every read fails with
//! [`CoDriverError::SourceClosed`].

use std::sync::Arc;

use codriver_types::{CoDriverError, TelemetrySnapshot};
use tracing::{debug, info};

use crate::locations::LocationIndex;
use crate::registry::LayoutRegistry;
use crate::shm::SharedMemory;
use crate::sim::SyntheticDrive;
use crate::versions::TelemetryLayout;

/// Number of reference locations attached to each snapshot by default.
pub const DEFAULT_NEAREST_LOCATIONS: usize = 5;

/// Where telemetry comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceMode {
    /// Map the named segment (a path on Unix, a mapping name on Windows).
    SharedMemory { name: String },
    /// Generate a reproducible drive from `seed`.
    Synthetic { seed: u64 },
}

enum Backend {
    Mapped(SharedMemory),
    Synthetic(SyntheticDrive),
}

/// Decoding front end over shared memory or synthetic data.
pub struct TelemetrySource {
    backend: Option<Backend>,
    layout: Arc<TelemetryLayout>,
    locations: LocationIndex,
    nearest: usize,
}

impl TelemetrySource {
    /// Open a source and select its layout.
    ///
    /// # Errors
    ///
    /// - [`CoDriverError::SharedMemory`] – the segment is missing.
    /// - [`CoDriverError::UnsupportedTelemetryVersion`] – no registered
    ///   layout matches the segment's tag (or the registry is empty).
    pub fn open(
        mode: SourceMode,
        registry: &LayoutRegistry,
        locations: LocationIndex,
    ) -> Result<Self, CoDriverError> {
        let (backend, layout) = match mode {
            SourceMode::SharedMemory { name } => {
                let shm = SharedMemory::open(&name)?;
                let layout = registry.select(shm.as_bytes())?;
                (Backend::Mapped(shm), layout)
            }
            SourceMode::Synthetic { seed } => {
                let newest = registry
                    .newest()
                    .ok_or(CoDriverError::UnsupportedTelemetryVersion { tag: 0 })?;
                let drive = SyntheticDrive::new(&newest, seed)?;
                (Backend::Synthetic(drive), newest)
            }
        };
        info!(
            version = layout.version(),
            layout = layout.name(),
            synthetic = matches!(backend, Backend::Synthetic(_)),
            "telemetry source opened"
        );
        Ok(Self {
            backend: Some(backend),
            layout,
            locations,
            nearest: DEFAULT_NEAREST_LOCATIONS,
        })
    }

    /// Attach `count` nearest locations to each snapshot instead of the
    /// default five.
    pub fn with_nearest_locations(mut self, count: usize) -> Self {
        self.nearest = count;
        self
    }

    /// Version tag of the selected layout.
    pub fn version(&self) -> u32 {
        self.layout.version()
    }

    pub fn layout(&self) -> &TelemetryLayout {
        &self.layout
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    /// Read, decode and enrich one snapshot.
    ///
    /// # Errors
    ///
    /// - [`CoDriverError::SourceClosed`] – called after [`close`](Self::close).
    /// - [`CoDriverError::MalformedBuffer`] – the segment is shorter than
    ///   the layout.
    pub fn get_snapshot(&mut self) -> Result<TelemetrySnapshot, CoDriverError> {
        let layout = &self.layout;
        let snapshot = match self.backend.as_mut().ok_or(CoDriverError::SourceClosed)? {
            Backend::Mapped(shm) => layout.decode(shm.as_bytes())?,
            Backend::Synthetic(drive) => layout.decode(drive.advance(layout)?)?,
        };

        let nearest = match (
            snapshot.f64_at("truck.coordinate_x"),
            snapshot.f64_at("truck.coordinate_y"),
        ) {
            (Some(x), Some(y)) => self.locations.nearest(x, y, self.nearest),
            _ => Vec::new(),
        };
        debug!(nearest = nearest.len(), "telemetry snapshot decoded");
        Ok(snapshot.with_nearest_locations(&nearest))
    }

    /// Release the backend.  Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.backend.take().is_some() {
            info!("telemetry source closed");
        }
    }
}
