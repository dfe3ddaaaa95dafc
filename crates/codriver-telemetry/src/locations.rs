//! Reference locations and nearest-neighbour lookup.
//!
//! The dataset is a JSON array of `{ "Name", "X", "Y" }` objects in game
//! world coordinates.  A small sample ships with the crate; a full map
//! export can be loaded from disk instead.

use std::path::Path;

use codriver_types::{CoDriverError, NearbyLocation};
use serde::Deserialize;

const BUNDLED: &str = include_str!("../data/cities.json");

/// A named point on the map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Location {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

/// Immutable set of [`Location`]s.
#[derive(Debug, Clone, Default)]
pub struct LocationIndex {
    locations: Vec<Location>,
}

impl LocationIndex {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    /// The sample dataset compiled into the crate.
    pub fn bundled() -> Result<Self, CoDriverError> {
        Self::from_json(BUNDLED)
    }

    pub fn from_json(json: &str) -> Result<Self, CoDriverError> {
        let locations: Vec<Location> =
            serde_json::from_str(json).map_err(|e| CoDriverError::LocationData(e.to_string()))?;
        Ok(Self::new(locations))
    }

    pub fn load(path: &Path) -> Result<Self, CoDriverError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CoDriverError::LocationData(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Up to `limit` locations ordered by straight-line distance from
    /// `(x, y)`, nearest first.
    pub fn nearest(&self, x: f64, y: f64, limit: usize) -> Vec<NearbyLocation> {
        let mut ranked: Vec<NearbyLocation> = self
            .locations
            .iter()
            .map(|loc| NearbyLocation {
                name: loc.name.clone(),
                x: loc.x,
                y: loc.y,
                distance: (loc.x - x).hypot(loc.y - y),
            })
            .collect();
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> LocationIndex {
        LocationIndex::from_json(
            r#"[
                {"Name": "A", "X": 0.0, "Y": 0.0},
                {"Name": "B", "X": 10.0, "Y": 0.0},
                {"Name": "C", "X": 3.0, "Y": 4.0},
                {"Name": "D", "X": -100.0, "Y": 0.0}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn nearest_is_sorted_and_limited() {
        let found = grid().nearest(0.0, 0.0, 3);
        let names: Vec<&str> = found.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "B"]);
        assert_eq!(found[1].distance, 5.0);
    }

    #[test]
    fn limit_above_len_returns_everything() {
        assert_eq!(grid().nearest(0.0, 0.0, 50).len(), 4);
    }

    #[test]
    fn bundled_dataset_parses() {
        let index = LocationIndex::bundled().unwrap();
        assert!(index.len() >= 5);
    }

    #[test]
    fn bad_json_is_reported() {
        assert!(matches!(
            LocationIndex::from_json("{"),
            Err(CoDriverError::LocationData(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cities.json");
        std::fs::write(&path, r#"[{"Name": "Only", "X": 1.0, "Y": 2.0}]"#).unwrap();
        let index = LocationIndex::load(&path).unwrap();
        assert_eq!(index.nearest(0.0, 0.0, 5)[0].name, "Only");
    }
}
