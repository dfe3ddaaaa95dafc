//! Synthetic telemetry for running the pipeline without the game.
//!
//! [`SyntheticDrive`] models a truck cruising down a motorway and writes its
//! state into a real revision-12 buffer, so the synthetic path exercises the
//! same layout selection and decoding as live shared memory.  The random
//! walk is driven by a seeded [`StdRng`], which makes runs reproducible.
//!
//! # Example
//!
//! ```rust
//! use codriver_telemetry::sim::SyntheticDrive;
//! use codriver_telemetry::versions::scs_v1_12;
//!
//! let layout = scs_v1_12::layout();
//! let mut drive = SyntheticDrive::new(&layout, 7).unwrap();
//! let buf = drive.advance(&layout).unwrap();
//! let snapshot = layout.decode(buf).unwrap();
//! assert!(snapshot.f64_at("truck.speed").is_some());
//! ```

use codriver_types::{CoDriverError, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::versions::TelemetryLayout;

const KMH_PER_MS: f64 = 3.6;
const UPDATES_PER_TOGGLE: u64 = 10;

/// Mutable state of the simulated drive.
#[derive(Debug, Clone)]
pub struct DriveState {
    pub speed_kmh: f64,
    pub acceleration: f64,
    pub brake: f64,
    pub engine_rpm: f64,
    pub fuel: f64,
    pub fuel_rate: f64,
    pub fuel_capacity: f64,
    pub wear_engine: f64,
    pub wear_transmission: f64,
    pub blinker_left: bool,
    pub blinker_right: bool,
    pub wipers: bool,
    pub coordinate_x: f64,
    pub coordinate_y: f64,
    pub route_distance: f64,
    pub route_time: f64,
    /// In-game clock, minutes since the start of the save.
    pub time_abs: u32,
}

impl Default for DriveState {
    fn default() -> Self {
        Self {
            speed_kmh: 80.0,
            acceleration: 0.2,
            brake: 0.0,
            engine_rpm: 1500.0,
            fuel: 800.0,
            fuel_rate: 30.0,
            fuel_capacity: 1000.0,
            wear_engine: 0.0,
            wear_transmission: 0.0,
            blinker_left: false,
            blinker_right: false,
            wipers: false,
            coordinate_x: 2028.0,
            coordinate_y: 5855.0,
            route_distance: 5000.0,
            route_time: 3600.0,
            time_abs: 12 * 60,
        }
    }
}

/// Seeded random walk that renders into a telemetry buffer.
pub struct SyntheticDrive {
    state: DriveState,
    rng: StdRng,
    updates: u64,
    buf: Vec<u8>,
}

impl SyntheticDrive {
    /// Prepare a buffer for `layout` holding the static job and vehicle
    /// details.
    ///
    /// # Errors
    ///
    /// [`CoDriverError::UnknownField`] when `layout` lacks a field the drive
    /// writes.
    pub fn new(layout: &TelemetryLayout, seed: u64) -> Result<Self, CoDriverError> {
        let mut buf = layout.blank_buffer();
        let structure = layout.structure();
        let text = |s: &str| Value::Text(s.to_string());
        let statics = [
            ("game.sdk_active", Value::Bool(true)),
            ("game.version_major", Value::U32(1)),
            ("game.version_minor", Value::U32(49)),
            ("truck.brand", text("Scania")),
            ("truck.name", text("S 730")),
            ("truck.fuel_capacity", Value::F32(1000.0)),
            ("truck.fuel_warning_factor", Value::F32(0.15)),
            ("truck.engine_enabled", Value::Bool(true)),
            ("truck.electric_enabled", Value::Bool(true)),
            ("job.cargo", text("Electronics")),
            ("job.city_src", text("Hamburg")),
            ("job.comp_src", text("Tradeaux")),
            ("job.city_dst", text("Berlin")),
            ("job.comp_dst", text("Acme Corp")),
            ("job.income", Value::U64(2000)),
            ("job.on_job", Value::Bool(true)),
            ("job.cargo_loaded", Value::Bool(true)),
            ("navigation.speed_limit", Value::F32((90.0 / KMH_PER_MS) as f32)),
        ];
        for (name, value) in &statics {
            structure.write(&mut buf, name, value)?;
        }
        let trailer = {
            let mut record = codriver_types::Record::new();
            record.insert("id", text("trailer.scs_box"));
            record.insert("name", text("Box trailer"));
            record.insert("attached", Value::Bool(true));
            record
        };
        structure.write(
            &mut buf,
            codriver_types::SECTION_TRAILERS,
            &Value::Array(vec![Value::Record(trailer)]),
        )?;

        Ok(Self {
            state: DriveState::default(),
            rng: StdRng::seed_from_u64(seed),
            updates: 0,
            buf,
        })
    }

    pub fn state(&self) -> &DriveState {
        &self.state
    }

    /// Step the drive once and return the refreshed buffer.
    pub fn advance(&mut self, layout: &TelemetryLayout) -> Result<&[u8], CoDriverError> {
        self.step();
        self.render(layout)?;
        Ok(&self.buf)
    }

    fn step(&mut self) {
        let s = &mut self.state;
        let rng = &mut self.rng;

        s.speed_kmh = (s.speed_kmh + rng.gen_range(-5.0..=5.0)).clamp(0.0, 100.0);
        s.acceleration = rng.gen_range(0.3..=0.7);
        s.engine_rpm = (s.engine_rpm + f64::from(rng.gen_range(-100i32..=100))).clamp(800.0, 3000.0);
        s.brake = if rng.gen_bool(0.05) { rng.gen_range(0.5..=1.0) } else { 0.0 };

        s.coordinate_x += s.speed_kmh * 0.1;
        s.coordinate_y += s.speed_kmh * 0.1;

        s.fuel = (s.fuel - s.fuel_rate * (s.speed_kmh / 100.0) * 0.1).max(0.0);
        if s.fuel < 50.0 {
            s.fuel = s.fuel_capacity;
        }

        let wear = 0.001 * s.speed_kmh / 100.0;
        s.wear_engine = (s.wear_engine + wear).min(1.0);
        s.wear_transmission = (s.wear_transmission + wear).min(1.0);

        self.updates += 1;
        if self.updates % UPDATES_PER_TOGGLE == 0 {
            s.blinker_left = !s.blinker_left;
            s.blinker_right = !s.blinker_left;
            s.wipers = !s.wipers;
        }

        s.route_distance = (s.route_distance - s.speed_kmh * 0.1).max(0.0);
        if s.route_distance == 0.0 {
            s.route_distance = f64::from(rng.gen_range(1000u32..=5000));
            s.route_time = f64::from(rng.gen_range(3000u32..=7200));
        }

        s.time_abs += 1;
    }

    fn render(&mut self, layout: &TelemetryLayout) -> Result<(), CoDriverError> {
        let s = &self.state;
        let f32v = |v: f64| Value::F32(v as f32);
        let fields = [
            ("truck.speed", f32v(s.speed_kmh / KMH_PER_MS)),
            ("truck.acceleration_x", f32v(s.acceleration)),
            ("truck.user_brake", f32v(s.brake)),
            ("truck.engine_rpm", f32v(s.engine_rpm)),
            ("truck.fuel", f32v(s.fuel)),
            ("truck.fuel_avg_consumption", f32v(s.fuel_rate / 100.0)),
            ("truck.wear_engine", f32v(s.wear_engine)),
            ("truck.wear_transmission", f32v(s.wear_transmission)),
            ("truck.blinker_left_active", Value::Bool(s.blinker_left)),
            ("truck.blinker_right_active", Value::Bool(s.blinker_right)),
            ("truck.wipers", Value::Bool(s.wipers)),
            ("truck.coordinate_x", Value::F64(s.coordinate_x)),
            ("truck.coordinate_y", Value::F64(s.coordinate_y)),
            ("navigation.route_distance", f32v(s.route_distance)),
            ("navigation.route_time", f32v(s.route_time)),
            ("game.time_abs", Value::U32(s.time_abs)),
        ];
        let structure = layout.structure();
        for (name, value) in &fields {
            structure.write(&mut self.buf, name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::scs_v1_12;

    #[test]
    fn same_seed_same_drive() {
        let layout = scs_v1_12::layout();
        let mut a = SyntheticDrive::new(&layout, 42).unwrap();
        let mut b = SyntheticDrive::new(&layout, 42).unwrap();
        for _ in 0..25 {
            let left = a.advance(&layout).unwrap().to_vec();
            let right = b.advance(&layout).unwrap();
            assert_eq!(left.as_slice(), right);
        }
    }

    #[test]
    fn values_stay_within_bounds() {
        let layout = scs_v1_12::layout();
        let mut drive = SyntheticDrive::new(&layout, 1).unwrap();
        for _ in 0..500 {
            drive.advance(&layout).unwrap();
            let s = drive.state();
            assert!((0.0..=100.0).contains(&s.speed_kmh));
            assert!((800.0..=3000.0).contains(&s.engine_rpm));
            assert!(s.fuel >= 50.0 && s.fuel <= s.fuel_capacity);
        }
    }

    #[test]
    fn blinkers_and_wipers_toggle_every_ten_updates() {
        let layout = scs_v1_12::layout();
        let mut drive = SyntheticDrive::new(&layout, 3).unwrap();
        for _ in 0..9 {
            drive.advance(&layout).unwrap();
        }
        assert!(!drive.state().wipers);
        drive.advance(&layout).unwrap();
        assert!(drive.state().wipers);
        assert!(drive.state().blinker_left);
        assert!(!drive.state().blinker_right);
    }

    #[test]
    fn buffer_decodes_with_the_drive_state() {
        let layout = scs_v1_12::layout();
        let mut drive = SyntheticDrive::new(&layout, 9).unwrap();
        let snapshot = layout.decode(drive.advance(&layout).unwrap()).unwrap();
        let speed_kmh = snapshot.f64_at("truck.speed").unwrap() * KMH_PER_MS;
        assert!((speed_kmh - drive.state().speed_kmh).abs() < 1e-3);
        assert_eq!(snapshot.text_at("job.city_dst"), Some("Berlin"));
        assert_eq!(snapshot.trailers().count(), 1);
        assert_eq!(snapshot.get("game.time_abs"), Some(&Value::U32(12 * 60 + 1)));
    }
}
