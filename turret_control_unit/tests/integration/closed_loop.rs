//! Integration test: closed-loop positioning on the simulated plant.

use turret_common::control_unit::config::TurretConfig;
use turret_common::control_unit::state::{Axis, DriveMode};
use turret_control_unit::sim::SimConfig;

use super::VirtualRig;

#[test]
fn both_axes_reach_their_references() {
    let mut rig = VirtualRig::without_acquisition(TurretConfig::default(), SimConfig::default());
    rig.set_reference(Axis::Elevation, 300);
    rig.set_reference(Axis::Azimuth, 700);

    let done = rig.run_until(20_000, |r| {
        r.reached(Axis::Elevation) && r.reached(Axis::Azimuth)
    });
    assert!(done.is_some(), "axes did not settle");
    // Let the last applied commands run out.
    rig.run_for(500);

    assert!((rig.position(Axis::Elevation) - 300).abs() <= 10);
    assert!((rig.position(Axis::Azimuth) - 700).abs() <= 30);
    // Decoded position follows the shaft exactly.
    assert_eq!(rig.position(Axis::Elevation), rig.plant.true_position(Axis::Elevation));
    assert_eq!(rig.position(Axis::Azimuth), rig.plant.true_position(Axis::Azimuth));
    assert_eq!(rig.shares.encoder_errors.get(&rig.ctx), 0);
}

#[test]
fn settled_axes_stay_braked() {
    let mut rig = VirtualRig::without_acquisition(TurretConfig::default(), SimConfig::default());
    rig.set_reference(Axis::Azimuth, -400);
    assert!(rig.run_until(20_000, |r| r.reached(Axis::Azimuth)).is_some());
    // The motor task applies the brake on its next cycle.
    assert!(rig
        .run_until(1_000, |r| r.rig.azimuth_motor.output().braking)
        .is_some());

    let parked = rig.position(Axis::Azimuth);
    rig.run_for(2_000);
    assert_eq!(rig.position(Axis::Azimuth), parked);
    assert_eq!(rig.shares.azimuth.command.get(&rig.ctx), DriveMode::Brake);
    assert!(rig.rig.azimuth_motor.output().braking);
}

#[test]
fn reference_is_echoed_and_telemetry_emitted() {
    let mut rig = VirtualRig::without_acquisition(TurretConfig::default(), SimConfig::default());
    rig.set_reference(Axis::Elevation, 120);
    rig.run_for(30);

    assert_eq!(rig.reference(Axis::Elevation), 120);
    let lines = rig.telemetry[Axis::Elevation.index()].take();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "A: 0");
    assert_eq!(lines[1], "R: 120");
    assert!(lines[2].starts_with("S: "));
}

#[test]
fn hinge_guard_stops_elevation_at_end_stop() {
    let mut rig = VirtualRig::without_acquisition(TurretConfig::default(), SimConfig::default());
    // Beyond the 1100-count hinge limit.
    rig.set_reference(Axis::Elevation, 1500);
    rig.run_for(20_000);

    let position = rig.position(Axis::Elevation);
    assert!(position >= 1100, "stopped early at {position}");
    assert!(position < 1200, "overran the hinge to {position}");
    assert!(!rig.reached(Axis::Elevation));
}
