//! SCS telemetry plugin, shared-memory revision 12.
//!
//! The plugin writes one 21 600-byte block.  It is split into fixed zones
//! that each hold a single value type; every zone is padded out to its
//! boundary so later plugin revisions can append fields without moving
//! anything.
//!
//! | Zone | Bytes | Contents |
//! |---|---|---|
//! | 1 | 0–40 | bool flags, u64 clocks |
//! | 2 | 40–500 | u32 (the revision tag lives at 40) |
//! | 3 | 500–700 | i32 |
//! | 4 | 700–1500 | f32 |
//! | 5 | 1500–1640 | bool |
//! | 6 | 1640–2000 | f32 vectors |
//! | 7 | 2000–2200 | f32 offsets |
//! | 8 | 2200–2300 | f64 placement |
//! | 9 | 2300–4000 | text |
//! | 10 | 4000–4200 | u64 |
//! | 11 | 4200–4300 | i64 |
//! | 12 | 4300–4400 | bool events |
//! | 13 | 4400–6000 | substance names |
//! | 14 | 6000–21600 | 10 trailer slots of 1560 bytes |

use crate::layout::{Primitive, StructLayout};
use crate::versions::{TelemetryLayout, TAG_OFFSET};

/// Plugin revision carried in the version tag.
pub const VERSION: u32 = 12;
/// Bytes the revision-12 block spans.
pub const BLOCK_SIZE: usize = 21_600;
/// Trailer slots in the block.
pub const TRAILER_SLOTS: usize = 10;

const WHEELS: usize = 16;
const TEXT: usize = 64;

pub fn layout() -> TelemetryLayout {
    TelemetryLayout::new("scs-sdk-plugin rev 12", VERSION, TAG_OFFSET, block())
}

fn block() -> StructLayout {
    let b = StructLayout::builder();

    // Zone 1
    let b = b
        .boolean("game.sdk_active")
        .skip(3)
        .boolean("game.paused")
        .skip(3)
        .u64("game.time")
        .u64("game.simulated_time")
        .u64("game.render_time")
        .i64("game.multiplayer_time_offset");

    // Zone 2
    let b = b
        .u32("game.plugin_revision")
        .u32("game.version_major")
        .u32("game.version_minor")
        .u32("game.game_id")
        .u32("game.telemetry_version_major")
        .u32("game.telemetry_version_minor")
        .u32("game.time_abs")
        .u32("truck.gears")
        .u32("truck.gears_reverse")
        .u32("truck.retarder_step_count")
        .u32("truck.wheel_count")
        .u32("truck.selector_count")
        .u32("job.delivery_time_abs")
        .u32("game.max_trailer_count")
        .u32("game.unit_count")
        .u32("navigation.planned_distance_km")
        .u32("truck.shifter_slot")
        .u32("truck.retarder_brake")
        .u32("truck.lights_aux_front")
        .u32("truck.lights_aux_roof")
        .array("truck.wheel_substance", Primitive::U32, WHEELS)
        .array("truck.hshifter_position", Primitive::U32, 32)
        .array("truck.hshifter_bitmask", Primitive::U32, 32)
        .u32("job.delivered_delivery_time")
        .u32("job.starting_time")
        .u32("job.finished_time")
        .skip(48);

    // Zone 3
    let b = b
        .i32("game.rest_stop")
        .i32("truck.gear")
        .i32("truck.gear_dashboard")
        .array("truck.hshifter_resulting", Primitive::I32, 32)
        .i32("job.delivered_earned_xp")
        .skip(56);

    // Zone 4
    let b = b
        .f32("game.scale")
        .f32("truck.fuel_capacity")
        .f32("truck.fuel_warning_factor")
        .f32("truck.adblue_capacity")
        .f32("truck.adblue_warning_factor")
        .f32("truck.air_pressure_warning_threshold")
        .f32("truck.air_pressure_emergency_threshold")
        .f32("truck.oil_pressure_warning_threshold")
        .f32("truck.water_temperature_warning_threshold")
        .f32("truck.battery_voltage_warning_threshold")
        .f32("truck.engine_rpm_max")
        .f32("truck.gear_differential")
        .f32("job.cargo_mass")
        .array("truck.wheel_radius", Primitive::F32, WHEELS)
        .array("truck.gear_ratios_forward", Primitive::F32, 24)
        .array("truck.gear_ratios_reverse", Primitive::F32, 8)
        .f32("job.unit_mass")
        .f32("truck.speed")
        .f32("truck.engine_rpm")
        .f32("truck.user_steer")
        .f32("truck.user_throttle")
        .f32("truck.user_brake")
        .f32("truck.user_clutch")
        .f32("truck.game_steer")
        .f32("truck.game_throttle")
        .f32("truck.game_brake")
        .f32("truck.game_clutch")
        .f32("truck.cruise_control_speed")
        .f32("truck.air_pressure")
        .f32("truck.brake_temperature")
        .f32("truck.fuel")
        .f32("truck.fuel_avg_consumption")
        .f32("truck.fuel_range")
        .f32("truck.adblue")
        .f32("truck.oil_pressure")
        .f32("truck.oil_temperature")
        .f32("truck.water_temperature")
        .f32("truck.battery_voltage")
        .f32("truck.lights_dashboard")
        .f32("truck.wear_engine")
        .f32("truck.wear_transmission")
        .f32("truck.wear_cabin")
        .f32("truck.wear_chassis")
        .f32("truck.wear_wheels")
        .f32("truck.odometer")
        .f32("navigation.route_distance")
        .f32("navigation.route_time")
        .f32("navigation.speed_limit")
        .array("truck.wheel_susp_deflection", Primitive::F32, WHEELS)
        .array("truck.wheel_velocity", Primitive::F32, WHEELS)
        .array("truck.wheel_steering", Primitive::F32, WHEELS)
        .array("truck.wheel_rotation", Primitive::F32, WHEELS)
        .array("truck.wheel_lift", Primitive::F32, WHEELS)
        .array("truck.wheel_lift_offset", Primitive::F32, WHEELS)
        .f32("job.delivered_cargo_damage")
        .f32("job.delivered_distance_km")
        .f32("game.refuel_amount")
        .f32("job.cargo_damage")
        .skip(28);

    // Zone 5
    let b = b
        .array("truck.wheel_steerable", Primitive::Bool, WHEELS)
        .array("truck.wheel_simulated", Primitive::Bool, WHEELS)
        .array("truck.wheel_powered", Primitive::Bool, WHEELS)
        .array("truck.wheel_liftable", Primitive::Bool, WHEELS)
        .boolean("job.cargo_loaded")
        .boolean("job.special_job")
        .boolean("truck.park_brake")
        .boolean("truck.motor_brake")
        .boolean("truck.air_pressure_warning")
        .boolean("truck.air_pressure_emergency")
        .boolean("truck.fuel_warning")
        .boolean("truck.adblue_warning")
        .boolean("truck.oil_pressure_warning")
        .boolean("truck.water_temperature_warning")
        .boolean("truck.battery_voltage_warning")
        .boolean("truck.electric_enabled")
        .boolean("truck.engine_enabled")
        .boolean("truck.wipers")
        .boolean("truck.blinker_left_active")
        .boolean("truck.blinker_right_active")
        .boolean("truck.blinker_left_on")
        .boolean("truck.blinker_right_on")
        .boolean("truck.lights_parking")
        .boolean("truck.lights_beam_low")
        .boolean("truck.lights_beam_high")
        .boolean("truck.lights_beacon")
        .boolean("truck.lights_brake")
        .boolean("truck.lights_reverse")
        .boolean("truck.lights_hazards")
        .boolean("truck.cruise_control")
        .array("truck.wheel_on_ground", Primitive::Bool, WHEELS)
        .array("truck.shifter_toggle", Primitive::Bool, 2)
        .boolean("truck.differential_lock")
        .boolean("truck.lift_axle")
        .boolean("truck.lift_axle_indicator")
        .boolean("truck.trailer_lift_axle")
        .boolean("truck.trailer_lift_axle_indicator")
        .boolean("job.delivered_autopark_used")
        .boolean("job.delivered_autoload_used")
        .skip(25);

    // Zone 6
    let b = b
        .f32("truck.cabin_position_x")
        .f32("truck.cabin_position_y")
        .f32("truck.cabin_position_z")
        .f32("truck.head_position_x")
        .f32("truck.head_position_y")
        .f32("truck.head_position_z")
        .f32("truck.hook_position_x")
        .f32("truck.hook_position_y")
        .f32("truck.hook_position_z")
        .array("truck.wheel_position_x", Primitive::F32, WHEELS)
        .array("truck.wheel_position_y", Primitive::F32, WHEELS)
        .array("truck.wheel_position_z", Primitive::F32, WHEELS)
        .f32("truck.linear_velocity_x")
        .f32("truck.linear_velocity_y")
        .f32("truck.linear_velocity_z")
        .f32("truck.angular_velocity_x")
        .f32("truck.angular_velocity_y")
        .f32("truck.angular_velocity_z")
        .f32("truck.acceleration_x")
        .f32("truck.acceleration_y")
        .f32("truck.acceleration_z")
        .f32("truck.angular_acceleration_x")
        .f32("truck.angular_acceleration_y")
        .f32("truck.angular_acceleration_z")
        .f32("truck.cabin_angular_velocity_x")
        .f32("truck.cabin_angular_velocity_y")
        .f32("truck.cabin_angular_velocity_z")
        .f32("truck.cabin_angular_acceleration_x")
        .f32("truck.cabin_angular_acceleration_y")
        .f32("truck.cabin_angular_acceleration_z")
        .skip(60);

    // Zone 7
    let b = b
        .f32("truck.cabin_offset_x")
        .f32("truck.cabin_offset_y")
        .f32("truck.cabin_offset_z")
        .f32("truck.cabin_offset_rotation_x")
        .f32("truck.cabin_offset_rotation_y")
        .f32("truck.cabin_offset_rotation_z")
        .f32("truck.head_offset_x")
        .f32("truck.head_offset_y")
        .f32("truck.head_offset_z")
        .f32("truck.head_offset_rotation_x")
        .f32("truck.head_offset_rotation_y")
        .f32("truck.head_offset_rotation_z")
        .skip(152);

    // Zone 8
    let b = b
        .f64("truck.coordinate_x")
        .f64("truck.coordinate_y")
        .f64("truck.coordinate_z")
        .f64("truck.rotation_x")
        .f64("truck.rotation_y")
        .f64("truck.rotation_z")
        .skip(52);

    // Zone 9
    let b = b
        .text("truck.brand_id", TEXT)
        .text("truck.brand", TEXT)
        .text("truck.id", TEXT)
        .text("truck.name", TEXT)
        .text("job.cargo_id", TEXT)
        .text("job.cargo", TEXT)
        .text("job.city_dst_id", TEXT)
        .text("job.city_dst", TEXT)
        .text("job.comp_dst_id", TEXT)
        .text("job.comp_dst", TEXT)
        .text("job.city_src_id", TEXT)
        .text("job.city_src", TEXT)
        .text("job.comp_src_id", TEXT)
        .text("job.comp_src", TEXT)
        .text("truck.shifter_type", 16)
        .text("truck.license_plate", TEXT)
        .text("truck.license_plate_country_id", TEXT)
        .text("truck.license_plate_country", TEXT)
        .text("job.market", 32)
        .text("game.fine_offence", 32)
        .text("game.ferry_source_name", TEXT)
        .text("game.ferry_target_name", TEXT)
        .text("game.ferry_source_id", TEXT)
        .text("game.ferry_target_id", TEXT)
        .text("game.train_source_name", TEXT)
        .text("game.train_target_name", TEXT)
        .text("game.train_source_id", TEXT)
        .text("game.train_target_id", TEXT)
        .skip(20);

    // Zone 10
    let b = b.u64("job.income").skip(192);

    // Zone 11
    let b = b
        .i64("job.cancelled_penalty")
        .i64("job.delivered_revenue")
        .i64("game.fine_amount")
        .i64("game.tollgate_pay_amount")
        .i64("game.ferry_pay_amount")
        .i64("game.train_pay_amount")
        .skip(52);

    // Zone 12
    let b = b
        .boolean("job.on_job")
        .boolean("job.finished")
        .boolean("job.cancelled")
        .boolean("job.delivered")
        .boolean("game.fined")
        .boolean("game.tollgate")
        .boolean("game.ferry")
        .boolean("game.train")
        .boolean("game.refuel")
        .boolean("game.refuel_paid")
        .skip(90);

    // Zone 13
    let b = b.text_array("game.substances", TEXT, 25);

    // Zone 14
    b.records("trailers", trailer(), TRAILER_SLOTS, Some("id"))
        .build()
}

/// One 1560-byte trailer slot.  A slot is present when its `id` is set.
fn trailer() -> StructLayout {
    StructLayout::builder()
        .array("wheel_steerable", Primitive::Bool, WHEELS)
        .array("wheel_simulated", Primitive::Bool, WHEELS)
        .array("wheel_powered", Primitive::Bool, WHEELS)
        .array("wheel_liftable", Primitive::Bool, WHEELS)
        .array("wheel_on_ground", Primitive::Bool, WHEELS)
        .boolean("attached")
        .skip(3)
        .array("wheel_substance", Primitive::U32, WHEELS)
        .u32("wheel_count")
        .f32("cargo_damage")
        .f32("wear_chassis")
        .f32("wear_wheels")
        .f32("wear_body")
        .array("wheel_susp_deflection", Primitive::F32, WHEELS)
        .array("wheel_velocity", Primitive::F32, WHEELS)
        .array("wheel_steering", Primitive::F32, WHEELS)
        .array("wheel_rotation", Primitive::F32, WHEELS)
        .array("wheel_lift", Primitive::F32, WHEELS)
        .array("wheel_lift_offset", Primitive::F32, WHEELS)
        .array("wheel_radius", Primitive::F32, WHEELS)
        .f32("linear_velocity_x")
        .f32("linear_velocity_y")
        .f32("linear_velocity_z")
        .f32("angular_velocity_x")
        .f32("angular_velocity_y")
        .f32("angular_velocity_z")
        .f32("linear_acceleration_x")
        .f32("linear_acceleration_y")
        .f32("linear_acceleration_z")
        .f32("angular_acceleration_x")
        .f32("angular_acceleration_y")
        .f32("angular_acceleration_z")
        .f32("hook_position_x")
        .f32("hook_position_y")
        .f32("hook_position_z")
        .array("wheel_position_x", Primitive::F32, WHEELS)
        .array("wheel_position_y", Primitive::F32, WHEELS)
        .array("wheel_position_z", Primitive::F32, WHEELS)
        .skip(4)
        .f64("world_x")
        .f64("world_y")
        .f64("world_z")
        .f64("rotation_x")
        .f64("rotation_y")
        .f64("rotation_z")
        .text("id", TEXT)
        .text("cargo_accessory_id", TEXT)
        .text("body_type", TEXT)
        .text("brand_id", TEXT)
        .text("brand", TEXT)
        .text("name", TEXT)
        .text("chain_type", TEXT)
        .text("license_plate", TEXT)
        .text("license_plate_country", TEXT)
        .text("license_plate_country_id", TEXT)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codriver_types::Value;

    fn offset(layout: &StructLayout, name: &str) -> usize {
        layout.field(name).map(|(o, _)| o).unwrap()
    }

    #[test]
    fn block_spans_exactly_the_shared_segment() {
        let layout = block();
        assert_eq!(layout.size(), BLOCK_SIZE);
        assert_eq!(trailer().size(), 1560);
    }

    #[test]
    fn zones_start_on_their_boundaries() {
        let layout = block();
        assert_eq!(offset(&layout, "game.plugin_revision"), 40);
        assert_eq!(offset(&layout, "game.rest_stop"), 500);
        assert_eq!(offset(&layout, "game.scale"), 700);
        assert_eq!(offset(&layout, "truck.speed"), 948);
        assert_eq!(offset(&layout, "truck.wheel_steerable"), 1500);
        assert_eq!(offset(&layout, "truck.cabin_position_x"), 1640);
        assert_eq!(offset(&layout, "truck.cabin_offset_x"), 2000);
        assert_eq!(offset(&layout, "truck.coordinate_x"), 2200);
        assert_eq!(offset(&layout, "truck.brand_id"), 2300);
        assert_eq!(offset(&layout, "job.income"), 4000);
        assert_eq!(offset(&layout, "job.cancelled_penalty"), 4200);
        assert_eq!(offset(&layout, "job.on_job"), 4300);
        assert_eq!(offset(&layout, "game.substances"), 4400);
        assert_eq!(offset(&layout, "trailers"), 6000);
    }

    #[test]
    fn blank_block_decodes_into_sections() {
        let layout = layout();
        let snapshot = layout.decode(&layout.blank_buffer()).unwrap();
        assert_eq!(snapshot.layout_version(), VERSION);
        assert_eq!(snapshot.get("game.plugin_revision"), Some(&Value::U32(VERSION)));
        assert!(snapshot.truck().is_some());
        assert!(snapshot.navigation().is_some());
        assert!(snapshot.job().is_some());
        assert_eq!(snapshot.trailers().count(), 0);
        assert_eq!(
            snapshot.get("game.substances").and_then(Value::as_array).map(<[Value]>::len),
            Some(25)
        );
    }
}
