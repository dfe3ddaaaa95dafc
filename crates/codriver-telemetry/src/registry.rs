//! [`LayoutRegistry`] – the set of telemetry layouts the source can decode,
//! and the selection step that matches a raw buffer to one of them.
//!
//! Layouts are kept newest first.  Selection reads the version tag and
//! returns the first layout whose tag matches; a buffer that matches none is
//! reported as [`CoDriverError::UnsupportedTelemetryVersion`] so the caller
//! can surface it instead of decoding garbage.

use std::sync::Arc;

use codriver_types::CoDriverError;
use tracing::debug;

use crate::versions::{self, TAG_OFFSET, TelemetryLayout};

/// Ordered registry of known telemetry layouts.
///
/// Construct with [`LayoutRegistry::builtin`] for the layouts shipped with
/// this crate, or start from [`LayoutRegistry::new`] and
/// [`register`](LayoutRegistry::register) custom ones.
#[derive(Default)]
pub struct LayoutRegistry {
    layouts: Vec<Arc<TelemetryLayout>>,
}

impl LayoutRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in layout.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(versions::scs_v1_12::layout());
        registry
    }

    /// Add a layout.  A layout already registered under the same version is
    /// replaced.
    pub fn register(&mut self, layout: TelemetryLayout) {
        self.layouts.retain(|known| known.version() != layout.version());
        let at = self
            .layouts
            .iter()
            .position(|known| known.version() < layout.version())
            .unwrap_or(self.layouts.len());
        self.layouts.insert(at, Arc::new(layout));
    }

    /// Layouts, newest first.
    pub fn layouts(&self) -> &[Arc<TelemetryLayout>] {
        &self.layouts
    }

    /// The newest registered layout.
    pub fn newest(&self) -> Option<Arc<TelemetryLayout>> {
        self.layouts.first().cloned()
    }

    pub fn get(&self, version: u32) -> Option<Arc<TelemetryLayout>> {
        self.layouts
            .iter()
            .find(|layout| layout.version() == version)
            .cloned()
    }

    /// Pick the layout whose version tag matches `buf`.
    ///
    /// # Errors
    ///
    /// [`CoDriverError::UnsupportedTelemetryVersion`] carrying the tag that
    /// was found (0 when the buffer is too short to hold one).
    pub fn select(&self, buf: &[u8]) -> Result<Arc<TelemetryLayout>, CoDriverError> {
        match self.layouts.iter().find(|layout| layout.matches(buf)) {
            Some(layout) => {
                debug!(version = layout.version(), name = layout.name(), "telemetry layout selected");
                Ok(Arc::clone(layout))
            }
            None => Err(CoDriverError::UnsupportedTelemetryVersion {
                tag: versions::read_tag(buf, TAG_OFFSET).unwrap_or(0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::StructLayout;

    fn tagged(version: u32) -> TelemetryLayout {
        let structure = StructLayout::builder()
            .skip(TAG_OFFSET)
            .u32("game.plugin_revision")
            .build();
        TelemetryLayout::new("test", version, TAG_OFFSET, structure)
    }

    #[test]
    fn builtin_selects_revision_12() {
        let registry = LayoutRegistry::builtin();
        let buf = versions::scs_v1_12::layout().blank_buffer();
        let layout = registry.select(&buf).unwrap();
        assert_eq!(layout.version(), 12);
    }

    #[test]
    fn unknown_tag_is_reported() {
        let registry = LayoutRegistry::builtin();
        let mut buf = vec![0u8; 21_600];
        buf[40..44].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(
            registry.select(&buf).map(|l| l.version()),
            Err(CoDriverError::UnsupportedTelemetryVersion { tag: 9 })
        );
    }

    #[test]
    fn register_keeps_newest_first_and_replaces() {
        let mut registry = LayoutRegistry::new();
        registry.register(tagged(10));
        registry.register(tagged(14));
        registry.register(tagged(12));
        registry.register(tagged(12));
        let versions: Vec<u32> = registry.layouts().iter().map(|l| l.version()).collect();
        assert_eq!(versions, vec![14, 12, 10]);
        assert_eq!(registry.newest().map(|l| l.version()), Some(14));
        assert!(registry.get(11).is_none());
    }

    #[test]
    fn empty_registry_rejects_everything() {
        let registry = LayoutRegistry::new();
        assert_eq!(
            registry.select(&[]).map(|l| l.version()),
            Err(CoDriverError::UnsupportedTelemetryVersion { tag: 0 })
        );
    }
}
