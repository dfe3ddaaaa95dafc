//! Decoded telemetry: a tree of [`Record`]s whose leaves are [`Value`]s.
//!
//! A [`TelemetrySnapshot`] is built once per decode and never mutated
//! afterwards.  Its shape (field set, array lengths) is fixed by the layout
//! version that produced it.
//!
//! # Paths
//!
//! Leaves are addressed by dotted paths.  Nested records contribute their
//! field name, arrays contribute the element index:
//!
//! | Path | Leaf |
//! |---|---|
//! | `truck.speed` | scalar field of the `truck` section |
//! | `truck.wheel_velocity.3` | fourth element of an array |
//! | `trailers.0.id` | field of the first present trailer |

use serde::{Deserialize, Serialize};

/// Section holding vehicle state.
pub const SECTION_TRUCK: &str = "truck";
/// Section holding game/environment state.
pub const SECTION_GAME: &str = "game";
/// Section holding route state; enriched with `nearest_locations`.
pub const SECTION_NAVIGATION: &str = "navigation";
/// Section holding the active job.
pub const SECTION_JOB: &str = "job";
/// Array of present trailer records.
pub const SECTION_TRAILERS: &str = "trailers";
/// Field of the navigation section filled by the source.
pub const NEAREST_LOCATIONS: &str = "nearest_locations";

/// One decoded telemetry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Array(Vec<Value>),
    Record(Record),
}

impl Value {
    /// Exact comparison: floats are equal only when their bit patterns are.
    ///
    /// Unlike `==`, `NaN` equals an identical `NaN` and `0.0` differs from
    /// `-0.0`.  Change detection relies on this, so a field that jitters in
    /// its last bit counts as changed.
    pub fn bit_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.bit_eq(y))
            }
            (Value::Record(a), Value::Record(b)) => a.bit_eq(b),
            _ => false,
        }
    }

    /// `true` for scalars and text; `false` for arrays and records.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Record(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Widen any numeric variant to `f64`.
    pub fn to_f64(&self) -> Option<f64> {
        match *self {
            Value::I32(v) => Some(f64::from(v)),
            Value::U32(v) => Some(f64::from(v)),
            Value::I64(v) => Some(v as f64),
            Value::U64(v) => Some(v as f64),
            Value::F32(v) => Some(f64::from(v)),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Any non-negative integer variant as `u64`.
    pub fn to_u64(&self) -> Option<u64> {
        match *self {
            Value::U32(v) => Some(u64::from(v)),
            Value::U64(v) => Some(v),
            Value::I32(v) => u64::try_from(v).ok(),
            Value::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }
}

/// Ordered set of named fields.  Field order follows the layout that
/// produced the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a direct child field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Walk a dotted path.  Numeric segments index into arrays.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Record(record) => record.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set `name` to `value`, replacing an existing field in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Set a dotted path, creating intermediate records as needed.
    pub fn insert_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => self.insert(path, value),
            Some((head, rest)) => {
                if !matches!(self.get(head), Some(Value::Record(_))) {
                    self.insert(head, Value::Record(Record::new()));
                }
                if let Some((_, Value::Record(child))) =
                    self.fields.iter_mut().find(|(field, _)| field == head)
                {
                    child.insert_path(rest, value);
                }
            }
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Flatten into `(path, leaf)` pairs in field order.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for (name, value) in &self.fields {
            flatten_into(name, value, &mut out);
        }
        out
    }

    fn bit_eq(&self, other: &Record) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|((na, va), (nb, vb))| na == nb && va.bit_eq(vb))
    }
}

fn flatten_into(path: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Record(record) => {
            for (name, child) in &record.fields {
                flatten_into(&format!("{path}.{name}"), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(&format!("{path}.{index}"), child, out);
            }
        }
        leaf => out.push((path.to_string(), leaf.clone())),
    }
}

/// A reference location near the truck, as attached to the navigation
/// section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyLocation {
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Straight-line distance from the truck, in world units (metres).
    pub distance: f64,
}

impl NearbyLocation {
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("name", Value::Text(self.name.clone()));
        record.insert("x", Value::F64(self.x));
        record.insert("y", Value::F64(self.y));
        record.insert("distance", Value::F64(self.distance));
        record
    }

    pub fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            name: record.get("name")?.as_text()?.to_string(),
            x: record.get("x")?.to_f64()?,
            y: record.get("y")?.to_f64()?,
            distance: record.get("distance")?.to_f64()?,
        })
    }
}

/// One fully decoded telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    layout_version: u32,
    root: Record,
}

impl TelemetrySnapshot {
    pub fn new(layout_version: u32, root: Record) -> Self {
        Self {
            layout_version,
            root,
        }
    }

    /// Version tag of the layout that decoded this snapshot.
    pub fn layout_version(&self) -> u32 {
        self.layout_version
    }

    pub fn root(&self) -> &Record {
        &self.root
    }

    /// Look up a leaf or sub-tree by dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.root.get_path(path)
    }

    /// Numeric field widened to `f64`.
    pub fn f64_at(&self, path: &str) -> Option<f64> {
        self.get(path)?.to_f64()
    }

    pub fn bool_at(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_text()
    }

    pub fn section(&self, name: &str) -> Option<&Record> {
        self.root.get(name)?.as_record()
    }

    pub fn truck(&self) -> Option<&Record> {
        self.section(SECTION_TRUCK)
    }

    pub fn game(&self) -> Option<&Record> {
        self.section(SECTION_GAME)
    }

    pub fn navigation(&self) -> Option<&Record> {
        self.section(SECTION_NAVIGATION)
    }

    pub fn job(&self) -> Option<&Record> {
        self.section(SECTION_JOB)
    }

    /// Present trailers only.  Empty when nothing is hitched.
    pub fn trailers(&self) -> impl Iterator<Item = &Record> {
        self.root
            .get(SECTION_TRAILERS)
            .and_then(Value::as_array)
            .unwrap_or(&[])
            .iter()
            .filter_map(Value::as_record)
    }

    /// Locations attached by the source, nearest first.
    pub fn nearest_locations(&self) -> Vec<NearbyLocation> {
        self.navigation()
            .and_then(|nav| nav.get(NEAREST_LOCATIONS))
            .and_then(Value::as_array)
            .unwrap_or(&[])
            .iter()
            .filter_map(Value::as_record)
            .filter_map(NearbyLocation::from_record)
            .collect()
    }

    /// Consume the snapshot and return it with `navigation.nearest_locations`
    /// set.
    pub fn with_nearest_locations(mut self, locations: &[NearbyLocation]) -> Self {
        let list = locations
            .iter()
            .map(|loc| Value::Record(loc.to_record()))
            .collect();
        self.root.insert_path(
            &format!("{SECTION_NAVIGATION}.{NEAREST_LOCATIONS}"),
            Value::Array(list),
        );
        self
    }

    /// Flatten every leaf into `(path, value)` pairs.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        self.root.flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySnapshot {
        let mut root = Record::new();
        root.insert_path("truck.speed", Value::F32(22.5));
        root.insert_path(
            "truck.wheel_velocity",
            Value::Array(vec![Value::F32(1.0), Value::F32(2.0)]),
        );
        root.insert_path("navigation.route_distance", Value::F32(1200.0));
        root.insert(SECTION_TRAILERS, Value::Array(Vec::new()));
        TelemetrySnapshot::new(12, root)
    }

    #[test]
    fn get_path_walks_records_and_arrays() {
        let snap = sample();
        assert_eq!(snap.f64_at("truck.speed"), Some(22.5));
        assert_eq!(snap.get("truck.wheel_velocity.1"), Some(&Value::F32(2.0)));
        assert!(snap.get("truck.wheel_velocity.9").is_none());
        assert!(snap.get("truck.speed.0").is_none());
    }

    #[test]
    fn flatten_produces_dotted_and_indexed_paths() {
        let paths: Vec<String> = sample().flatten().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                "truck.speed",
                "truck.wheel_velocity.0",
                "truck.wheel_velocity.1",
                "navigation.route_distance",
            ]
        );
    }

    #[test]
    fn bit_eq_is_exact_for_floats() {
        assert!(Value::F32(f32::NAN).bit_eq(&Value::F32(f32::NAN)));
        assert!(!Value::F32(0.0).bit_eq(&Value::F32(-0.0)));
        assert!(!Value::F64(1.0).bit_eq(&Value::F64(1.0 + f64::EPSILON)));
        assert!(!Value::U32(1).bit_eq(&Value::I32(1)));
    }

    #[test]
    fn nearest_locations_roundtrip_through_navigation() {
        let locs = vec![NearbyLocation {
            name: "Berlin".to_string(),
            x: 10.0,
            y: 20.0,
            distance: 3.5,
        }];
        let snap = sample().with_nearest_locations(&locs);
        assert_eq!(snap.nearest_locations(), locs);
        assert_eq!(snap.text_at("navigation.nearest_locations.0.name"), Some("Berlin"));
        // Existing navigation fields are preserved.
        assert_eq!(snap.f64_at("navigation.route_distance"), Some(1200.0));
    }

    #[test]
    fn empty_trailers_iterate_to_nothing() {
        assert_eq!(sample().trailers().count(), 0);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut record = Record::new();
        record.insert("a", Value::U32(1));
        record.insert("b", Value::U32(2));
        record.insert("a", Value::U32(3));
        let names: Vec<&str> = record.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&Value::U32(3)));
    }
}
