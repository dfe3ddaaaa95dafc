//! Versioned telemetry layouts.
//!
//! Each supported plugin revision lives in its own module and exposes a
//! `layout()` constructor returning a [`TelemetryLayout`].  The version tag
//! sits at the same offset in every revision, which is what lets the
//! [`LayoutRegistry`](crate::registry::LayoutRegistry) pick a layout before
//! it knows which one applies.

pub mod scs_v1_12;

use codriver_types::{CoDriverError, SECTION_TRAILERS, TelemetrySnapshot, Value};

use crate::layout::StructLayout;

/// Byte offset of the little-endian `u32` version tag.
pub const TAG_OFFSET: usize = 40;

/// A [`StructLayout`] bound to the version tag that identifies it.
#[derive(Debug)]
pub struct TelemetryLayout {
    name: &'static str,
    version: u32,
    tag_offset: usize,
    structure: StructLayout,
}

impl TelemetryLayout {
    pub fn new(name: &'static str, version: u32, tag_offset: usize, structure: StructLayout) -> Self {
        Self {
            name,
            version,
            tag_offset,
            structure,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn structure(&self) -> &StructLayout {
        &self.structure
    }

    /// Bytes a buffer must span for [`TelemetryLayout::decode`] to succeed.
    pub fn required_length(&self) -> usize {
        self.structure.size()
    }

    /// Whether `buf` carries this layout's version tag.
    pub fn matches(&self, buf: &[u8]) -> bool {
        read_tag(buf, self.tag_offset) == Some(self.version)
    }

    /// Decode `buf` into a snapshot stamped with this layout's version.
    ///
    /// The `trailers` section is always present, empty when the layout has
    /// no trailer slots or none is populated.
    pub fn decode(&self, buf: &[u8]) -> Result<TelemetrySnapshot, CoDriverError> {
        let mut root = self.structure.decode(buf)?;
        if root.get(SECTION_TRAILERS).is_none() {
            root.insert(SECTION_TRAILERS, Value::Array(Vec::new()));
        }
        Ok(TelemetrySnapshot::new(self.version, root))
    }

    /// A zeroed buffer of the right size with the version tag filled in.
    pub fn blank_buffer(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.required_length()];
        if let Some(slot) = buf.get_mut(self.tag_offset..self.tag_offset + 4) {
            slot.copy_from_slice(&self.version.to_le_bytes());
        }
        buf
    }
}

/// Read the `u32` tag at `offset`, if the buffer reaches that far.
pub fn read_tag(buf: &[u8], offset: usize) -> Option<u32> {
    let raw = buf.get(offset..offset + 4)?;
    let mut tag = [0u8; 4];
    tag.copy_from_slice(raw);
    Some(u32::from_le_bytes(tag))
}
