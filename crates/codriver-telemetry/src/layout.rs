//! [`StructLayout`] – declarative description of a fixed-layout binary
//! record and the decoder/encoder that walks it.
//!
//! A layout is an ordered list of entries, each either a named field or an
//! unnamed run of padding.  Byte offsets are implicit: every entry starts
//! where the previous one ended, and the offsets are computed once when the
//! layout is built.  All multi-byte values are little-endian.
//!
//! Field names are dotted paths.  Decoding inserts each value into the
//! output [`Record`] tree at its path, which lets a flat binary record fill
//! several logical sections (`truck.*`, `game.*`, …).
//!
//! # Example
//!
//! ```
//! use codriver_telemetry::layout::{Primitive, StructLayout};
//!
//! let layout = StructLayout::builder()
//!     .boolean("truck.engine_enabled")
//!     .skip(3)
//!     .f32("truck.speed")
//!     .text("truck.name", 8)
//!     .build();
//! assert_eq!(layout.size(), 16);
//!
//! let mut buf = vec![0u8; layout.size()];
//! buf[0] = 1;
//! buf[4..8].copy_from_slice(&22.5f32.to_le_bytes());
//! buf[8..13].copy_from_slice(b"Volvo");
//!
//! let record = layout.decode(&buf).unwrap();
//! assert_eq!(record.get_path("truck.speed").and_then(|v| v.to_f64()), Some(22.5));
//! assert_eq!(record.get_path("truck.name").and_then(|v| v.as_text()), Some("Volvo"));
//! ```

use std::sync::Arc;

use codriver_types::{CoDriverError, Record, Value};

// ────────────────────────────────────────────────────────────────────────────
// Field kinds
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-width scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// One byte; any non-zero value decodes as `true`.
    Bool,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl Primitive {
    /// Width in bytes.
    pub const fn size(self) -> usize {
        match self {
            Primitive::Bool => 1,
            Primitive::I32 | Primitive::U32 | Primitive::F32 => 4,
            Primitive::I64 | Primitive::U64 | Primitive::F64 => 8,
        }
    }
}

/// What lives at one entry of a layout.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Primitive(Primitive),
    /// NUL-padded text of exactly `len` bytes.
    Text { len: usize },
    /// `count` consecutive elements of the same kind.
    Array { element: Box<FieldKind>, count: usize },
    /// `count` repeated sub-records laid out at a fixed stride.  Slots whose
    /// `present_if` field is empty text or `false` are dropped from the
    /// output, so index `N` of the decoded array is the N-th present slot,
    /// not slot `N`.
    Records {
        layout: Arc<StructLayout>,
        count: usize,
        present_if: Option<&'static str>,
    },
    /// Unnamed bytes that are skipped.
    Padding(usize),
}

impl FieldKind {
    /// Width in bytes.
    pub fn size(&self) -> usize {
        match self {
            FieldKind::Primitive(p) => p.size(),
            FieldKind::Text { len } => *len,
            FieldKind::Array { element, count } => element.size() * count,
            FieldKind::Records { layout, count, .. } => layout.size() * count,
            FieldKind::Padding(len) => *len,
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldKind::Primitive(p) => format!("{p:?}"),
            FieldKind::Text { len } => format!("Text[{len}]"),
            FieldKind::Array { element, count } => format!("[{}; {count}]", element.describe()),
            FieldKind::Records { count, .. } => format!("Records[{count}]"),
            FieldKind::Padding(len) => format!("Padding[{len}]"),
        }
    }
}

struct Entry {
    name: Option<&'static str>,
    kind: FieldKind,
}

// ────────────────────────────────────────────────────────────────────────────
// StructLayout
// ────────────────────────────────────────────────────────────────────────────

/// An immutable, fully-offset description of one binary record.
pub struct StructLayout {
    entries: Vec<Entry>,
    offsets: Vec<usize>,
    size: usize,
}

impl std::fmt::Debug for StructLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructLayout")
            .field("entries", &self.entries.len())
            .field("size", &self.size)
            .finish()
    }
}

impl StructLayout {
    pub fn builder() -> LayoutBuilder {
        LayoutBuilder::default()
    }

    /// Total number of bytes the layout spans.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Offset and kind of the named field, if the layout has one.
    pub fn field(&self, name: &str) -> Option<(usize, &FieldKind)> {
        self.entries
            .iter()
            .zip(&self.offsets)
            .find(|(entry, _)| entry.name == Some(name))
            .map(|(entry, offset)| (*offset, &entry.kind))
    }

    /// Names of every field in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().filter_map(|entry| entry.name)
    }

    /// Decode a record starting at byte 0 of `buf`.
    ///
    /// # Errors
    ///
    /// [`CoDriverError::MalformedBuffer`] when `buf` is shorter than
    /// [`StructLayout::size`].
    pub fn decode(&self, buf: &[u8]) -> Result<Record, CoDriverError> {
        self.decode_at(buf, 0)
    }

    /// Decode a record starting at `offset`.
    pub fn decode_at(&self, buf: &[u8], offset: usize) -> Result<Record, CoDriverError> {
        self.check_len(buf, offset)?;
        Ok(self.decode_unchecked(buf, offset))
    }

    /// Encode `value` into the named field of a buffer holding this layout.
    ///
    /// Text longer than the field is truncated; shorter text is NUL-padded.
    /// Arrays may be shorter than the declared count, the remaining slots are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// - [`CoDriverError::MalformedBuffer`] – `buf` is too short.
    /// - [`CoDriverError::UnknownField`] – no field is named `name`.
    /// - [`CoDriverError::TypeMismatch`] – `value` does not fit the field.
    pub fn write(&self, buf: &mut [u8], name: &str, value: &Value) -> Result<(), CoDriverError> {
        self.check_len(buf, 0)?;
        let (offset, kind) = self
            .field(name)
            .ok_or_else(|| CoDriverError::UnknownField(name.to_string()))?;
        encode(kind, buf, offset, value, name)
    }

    fn check_len(&self, buf: &[u8], offset: usize) -> Result<(), CoDriverError> {
        let required = offset.checked_add(self.size).unwrap_or(usize::MAX);
        if buf.len() < required {
            return Err(CoDriverError::MalformedBuffer {
                required,
                actual: buf.len(),
            });
        }
        Ok(())
    }

    // Callers have checked that `buf` spans `offset + self.size` bytes.
    fn decode_unchecked(&self, buf: &[u8], offset: usize) -> Record {
        let mut record = Record::new();
        for (entry, rel) in self.entries.iter().zip(&self.offsets) {
            if let Some(name) = entry.name {
                record.insert_path(name, decode(&entry.kind, buf, offset + rel));
            }
        }
        record
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Accumulates entries in declaration order; [`LayoutBuilder::build`]
/// computes the offsets.
#[derive(Default)]
pub struct LayoutBuilder {
    entries: Vec<Entry>,
}

impl LayoutBuilder {
    pub fn field(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.entries.push(Entry {
            name: Some(name),
            kind,
        });
        self
    }

    /// Skip `len` bytes of padding.
    pub fn skip(mut self, len: usize) -> Self {
        self.entries.push(Entry {
            name: None,
            kind: FieldKind::Padding(len),
        });
        self
    }

    pub fn boolean(self, name: &'static str) -> Self {
        self.field(name, FieldKind::Primitive(Primitive::Bool))
    }

    pub fn i32(self, name: &'static str) -> Self {
        self.field(name, FieldKind::Primitive(Primitive::I32))
    }

    pub fn u32(self, name: &'static str) -> Self {
        self.field(name, FieldKind::Primitive(Primitive::U32))
    }

    pub fn i64(self, name: &'static str) -> Self {
        self.field(name, FieldKind::Primitive(Primitive::I64))
    }

    pub fn u64(self, name: &'static str) -> Self {
        self.field(name, FieldKind::Primitive(Primitive::U64))
    }

    pub fn f32(self, name: &'static str) -> Self {
        self.field(name, FieldKind::Primitive(Primitive::F32))
    }

    pub fn f64(self, name: &'static str) -> Self {
        self.field(name, FieldKind::Primitive(Primitive::F64))
    }

    pub fn text(self, name: &'static str, len: usize) -> Self {
        self.field(name, FieldKind::Text { len })
    }

    pub fn array(self, name: &'static str, element: Primitive, count: usize) -> Self {
        self.field(
            name,
            FieldKind::Array {
                element: Box::new(FieldKind::Primitive(element)),
                count,
            },
        )
    }

    pub fn text_array(self, name: &'static str, len: usize, count: usize) -> Self {
        self.field(
            name,
            FieldKind::Array {
                element: Box::new(FieldKind::Text { len }),
                count,
            },
        )
    }

    pub fn records(
        self,
        name: &'static str,
        layout: StructLayout,
        count: usize,
        present_if: Option<&'static str>,
    ) -> Self {
        self.field(
            name,
            FieldKind::Records {
                layout: Arc::new(layout),
                count,
                present_if,
            },
        )
    }

    pub fn build(self) -> StructLayout {
        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut size = 0;
        for entry in &self.entries {
            offsets.push(size);
            size += entry.kind.size();
        }
        StructLayout {
            entries: self.entries,
            offsets,
            size,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Decode / encode helpers
// ────────────────────────────────────────────────────────────────────────────

fn bytes<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

fn decode(kind: &FieldKind, buf: &[u8], at: usize) -> Value {
    match kind {
        FieldKind::Primitive(p) => decode_primitive(*p, buf, at),
        FieldKind::Text { len } => {
            let raw = &buf[at..at + len];
            let end = raw.iter().position(|&b| b == 0).unwrap_or(*len);
            Value::Text(String::from_utf8_lossy(&raw[..end]).into_owned())
        }
        FieldKind::Array { element, count } => {
            let stride = element.size();
            Value::Array(
                (0..*count)
                    .map(|i| decode(element, buf, at + i * stride))
                    .collect(),
            )
        }
        FieldKind::Records {
            layout,
            count,
            present_if,
        } => {
            let slots = (0..*count)
                .map(|i| layout.decode_unchecked(buf, at + i * layout.size()))
                .filter(|slot| present_if.is_none_or(|field| is_present(slot, field)))
                .map(Value::Record)
                .collect();
            Value::Array(slots)
        }
        FieldKind::Padding(_) => Value::Array(Vec::new()),
    }
}

fn decode_primitive(p: Primitive, buf: &[u8], at: usize) -> Value {
    match p {
        Primitive::Bool => Value::Bool(buf[at] != 0),
        Primitive::I32 => Value::I32(i32::from_le_bytes(bytes(buf, at))),
        Primitive::U32 => Value::U32(u32::from_le_bytes(bytes(buf, at))),
        Primitive::I64 => Value::I64(i64::from_le_bytes(bytes(buf, at))),
        Primitive::U64 => Value::U64(u64::from_le_bytes(bytes(buf, at))),
        Primitive::F32 => Value::F32(f32::from_le_bytes(bytes(buf, at))),
        Primitive::F64 => Value::F64(f64::from_le_bytes(bytes(buf, at))),
    }
}

fn is_present(slot: &Record, field: &str) -> bool {
    match slot.get_path(field) {
        Some(Value::Text(text)) => !text.is_empty(),
        Some(Value::Bool(flag)) => *flag,
        _ => false,
    }
}

fn encode(
    kind: &FieldKind,
    buf: &mut [u8],
    at: usize,
    value: &Value,
    name: &str,
) -> Result<(), CoDriverError> {
    let mismatch = || CoDriverError::TypeMismatch {
        field: name.to_string(),
        expected: kind.describe(),
    };
    match (kind, value) {
        (FieldKind::Primitive(p), value) => {
            let raw: Vec<u8> = match (p, value) {
                (Primitive::Bool, Value::Bool(b)) => vec![u8::from(*b)],
                (Primitive::I32, Value::I32(v)) => v.to_le_bytes().to_vec(),
                (Primitive::U32, Value::U32(v)) => v.to_le_bytes().to_vec(),
                (Primitive::I64, Value::I64(v)) => v.to_le_bytes().to_vec(),
                (Primitive::U64, Value::U64(v)) => v.to_le_bytes().to_vec(),
                (Primitive::F32, Value::F32(v)) => v.to_le_bytes().to_vec(),
                (Primitive::F64, Value::F64(v)) => v.to_le_bytes().to_vec(),
                _ => return Err(mismatch()),
            };
            buf[at..at + raw.len()].copy_from_slice(&raw);
            Ok(())
        }
        (FieldKind::Text { len }, Value::Text(text)) => {
            let src = text.as_bytes();
            let n = src.len().min(*len);
            let slot = &mut buf[at..at + len];
            slot.fill(0);
            slot[..n].copy_from_slice(&src[..n]);
            Ok(())
        }
        (FieldKind::Array { element, count }, Value::Array(items)) if items.len() <= *count => {
            let stride = element.size();
            for (i, item) in items.iter().enumerate() {
                encode(element, buf, at + i * stride, item, name)?;
            }
            Ok(())
        }
        (FieldKind::Records { layout, count, .. }, Value::Array(items))
            if items.len() <= *count =>
        {
            for (i, item) in items.iter().enumerate() {
                let record = item.as_record().ok_or_else(mismatch)?;
                let base = at + i * layout.size();
                for (field, field_value) in record.fields() {
                    let (offset, field_kind) = layout
                        .field(field)
                        .ok_or_else(|| CoDriverError::UnknownField(format!("{name}.{field}")))?;
                    encode(field_kind, buf, base + offset, field_value, field)?;
                }
            }
            Ok(())
        }
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_kind() -> StructLayout {
        StructLayout::builder()
            .boolean("flag")
            .skip(3)
            .i32("signed")
            .u32("unsigned")
            .i64("signed_wide")
            .u64("unsigned_wide")
            .f32("single")
            .f64("double")
            .text("name", 8)
            .array("wheels", Primitive::F32, 4)
            .build()
    }

    #[test]
    fn offsets_are_contiguous() {
        let layout = every_kind();
        assert_eq!(layout.field("flag").map(|(o, _)| o), Some(0));
        assert_eq!(layout.field("signed").map(|(o, _)| o), Some(4));
        assert_eq!(layout.field("unsigned").map(|(o, _)| o), Some(8));
        assert_eq!(layout.field("signed_wide").map(|(o, _)| o), Some(12));
        assert_eq!(layout.field("unsigned_wide").map(|(o, _)| o), Some(20));
        assert_eq!(layout.field("single").map(|(o, _)| o), Some(28));
        assert_eq!(layout.field("double").map(|(o, _)| o), Some(32));
        assert_eq!(layout.field("name").map(|(o, _)| o), Some(40));
        assert_eq!(layout.field("wheels").map(|(o, _)| o), Some(48));
        assert_eq!(layout.size(), 64);
    }

    #[test]
    fn exact_length_decodes_and_one_short_fails() {
        let layout = every_kind();
        let buf = vec![0u8; layout.size()];
        assert!(layout.decode(&buf).is_ok());
        assert_eq!(
            layout.decode(&buf[..layout.size() - 1]),
            Err(CoDriverError::MalformedBuffer {
                required: 64,
                actual: 63
            })
        );
    }

    #[test]
    fn huge_offset_is_malformed_not_a_panic() {
        let layout = every_kind();
        let buf = vec![0u8; layout.size()];
        assert_eq!(
            layout.decode_at(&buf, usize::MAX - 8),
            Err(CoDriverError::MalformedBuffer {
                required: usize::MAX,
                actual: 64
            })
        );
        assert!(layout.decode_at(&buf, 1).is_err());
    }

    #[test]
    fn boundary_values_survive_write_then_decode() {
        let layout = every_kind();
        let mut buf = vec![0u8; layout.size()];
        let cases = [
            ("flag", Value::Bool(true)),
            ("signed", Value::I32(i32::MIN)),
            ("unsigned", Value::U32(u32::MAX)),
            ("signed_wide", Value::I64(-1)),
            ("unsigned_wide", Value::U64(u64::MAX)),
            ("single", Value::F32(-0.0)),
            ("double", Value::F64(f64::MIN_POSITIVE)),
            ("name", Value::Text("ABCDEFGH".to_string())),
        ];
        for (name, value) in &cases {
            layout.write(&mut buf, name, value).unwrap();
        }
        let record = layout.decode(&buf).unwrap();
        for (name, value) in &cases {
            let decoded = record.get(name).unwrap();
            assert!(decoded.bit_eq(value), "{name}: {decoded:?} != {value:?}");
        }
    }

    #[test]
    fn zero_values_decode_as_zero() {
        let layout = every_kind();
        let record = layout.decode(&vec![0u8; layout.size()]).unwrap();
        assert_eq!(record.get("flag"), Some(&Value::Bool(false)));
        assert_eq!(record.get("unsigned"), Some(&Value::U32(0)));
        assert_eq!(record.get("name"), Some(&Value::Text(String::new())));
    }

    #[test]
    fn text_stops_at_first_nul() {
        let layout = StructLayout::builder().text("city", 8).build();
        let buf = *b"Kiel\0xyz";
        let record = layout.decode(&buf).unwrap();
        assert_eq!(record.get("city"), Some(&Value::Text("Kiel".to_string())));
    }

    #[test]
    fn overlong_text_is_truncated_on_write() {
        let layout = StructLayout::builder().text("city", 4).build();
        let mut buf = vec![0xFFu8; 4];
        layout
            .write(&mut buf, "city", &Value::Text("Hamburg".to_string()))
            .unwrap();
        assert_eq!(&buf, b"Hamb");
    }

    #[test]
    fn dotted_names_build_nested_sections() {
        let layout = StructLayout::builder()
            .f32("truck.speed")
            .u32("game.time_abs")
            .f32("truck.fuel")
            .build();
        let record = layout.decode(&vec![0u8; layout.size()]).unwrap();
        let truck = record.get("truck").and_then(Value::as_record).unwrap();
        assert_eq!(truck.len(), 2);
        assert!(record.get_path("game.time_abs").is_some());
    }

    #[test]
    fn records_drop_absent_slots() {
        let trailer = StructLayout::builder().text("id", 4).f32("mass").build();
        let layout = StructLayout::builder()
            .records("trailers", trailer, 3, Some("id"))
            .build();
        assert_eq!(layout.size(), 24);

        let mut buf = vec![0u8; layout.size()];
        // Only the middle slot is populated.
        buf[8..10].copy_from_slice(b"t1");
        buf[12..16].copy_from_slice(&7.0f32.to_le_bytes());

        let record = layout.decode(&buf).unwrap();
        let trailers = record.get("trailers").and_then(Value::as_array).unwrap();
        assert_eq!(trailers.len(), 1);
        assert_eq!(
            trailers[0].as_record().and_then(|r| r.get("mass")),
            Some(&Value::F32(7.0))
        );

        let empty = layout.decode(&vec![0u8; layout.size()]).unwrap();
        assert_eq!(empty.get("trailers"), Some(&Value::Array(Vec::new())));
    }

    #[test]
    fn later_records_shift_down_when_an_earlier_slot_empties() {
        let trailer = StructLayout::builder().text("id", 4).f32("mass").build();
        let layout = StructLayout::builder()
            .records("trailers", trailer, 3, Some("id"))
            .build();
        let mut buf = vec![0u8; layout.size()];
        buf[0..2].copy_from_slice(b"t0");
        buf[16..18].copy_from_slice(b"t2");

        let record = layout.decode(&buf).unwrap();
        assert_eq!(
            record.get_path("trailers.1.id").and_then(Value::as_text),
            Some("t2")
        );

        // The first trailer detaches: the third one is now at index 0.
        buf[0..4].fill(0);
        let record = layout.decode(&buf).unwrap();
        assert_eq!(
            record.get_path("trailers.0.id").and_then(Value::as_text),
            Some("t2")
        );
        assert_eq!(record.get_path("trailers.1.id"), None);
    }

    #[test]
    fn write_rejects_unknown_fields_and_wrong_types() {
        let layout = every_kind();
        let mut buf = vec![0u8; layout.size()];
        assert!(matches!(
            layout.write(&mut buf, "missing", &Value::U32(1)),
            Err(CoDriverError::UnknownField(_))
        ));
        assert!(matches!(
            layout.write(&mut buf, "single", &Value::F64(1.0)),
            Err(CoDriverError::TypeMismatch { .. })
        ));
        assert!(matches!(
            layout.write(
                &mut buf,
                "wheels",
                &Value::Array(vec![Value::F32(0.0); 5])
            ),
            Err(CoDriverError::TypeMismatch { .. })
        ));
    }
}
