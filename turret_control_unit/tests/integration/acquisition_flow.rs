//! Integration test: target acquisition driving the real controllers and
//! plant, from facing the field through the raster scan to the lock.

use turret_common::control_unit::config::{CenteringRule, TurretConfig};
use turret_common::control_unit::state::Axis;
use turret_control_unit::acquisition::{AcquisitionState, ScanDirection};
use turret_control_unit::sim::{LightTarget, SimConfig};

use super::VirtualRig;

fn state(rig: &VirtualRig) -> Option<AcquisitionState> {
    rig.acquisition.as_ref().map(|a| a.state())
}

fn dark_field() -> SimConfig {
    SimConfig {
        target: LightTarget {
            peak: 0.0,
            ..LightTarget::default()
        },
        ..SimConfig::default()
    }
}

#[test]
fn faces_the_field_then_searches() {
    let mut rig = VirtualRig::new(TurretConfig::default(), dark_field());
    assert_eq!(state(&rig), Some(AcquisitionState::FaceTarget));

    let at = rig.run_until(20_000, |r| state(r) == Some(AcquisitionState::Search));
    assert!(at.is_some(), "never left FaceTarget");
    assert!((rig.position(Axis::Azimuth) - 700).abs() <= 30);
    assert!(rig.position(Axis::Elevation).abs() <= 10);
}

#[test]
fn raster_reverses_at_both_limits_and_respects_hinge() {
    let mut rig = VirtualRig::new(TurretConfig::default(), dark_field());
    let mut max_azimuth = i32::MIN;
    let mut min_azimuth = i32::MAX;
    let mut max_elevation = i32::MIN;
    let mut reversed = false;

    let done = rig.run_until(120_000, |r| {
        if state(r) == Some(AcquisitionState::Search) {
            let azimuth = r.reference(Axis::Azimuth);
            max_azimuth = max_azimuth.max(azimuth);
            min_azimuth = min_azimuth.min(azimuth);
            max_elevation = max_elevation.max(r.reference(Axis::Elevation));
            if r.acquisition.as_ref().map(|a| a.direction()) == Some(ScanDirection::Reverse) {
                reversed = true;
            }
        }
        // Forward again after the right limit, and past the hinge limit once.
        reversed && min_azimuth <= 600 && max_elevation >= 500
    });
    assert!(done.is_some(), "scan did not cover the field");
    assert_eq!(max_azimuth, 1000);
    assert_eq!(min_azimuth, 600);
    assert!(max_elevation <= 540);
    assert_eq!(state(&rig), Some(AcquisitionState::Search));
}

#[test]
fn light_locks_and_fires_with_symmetric_centering() {
    let mut config = TurretConfig::default();
    config.acquisition.centering = CenteringRule::Symmetric;
    let mut rig = VirtualRig::new(config, SimConfig::default());

    let locked = rig.run_until(30_000, |r| state(r) == Some(AcquisitionState::Lock));
    assert!(locked.is_some(), "light was never detected");

    let fired = rig.run_until(30_000, |r| r.rig.servo.shots() > 0);
    assert!(fired.is_some(), "no shot fired");
    assert_eq!(state(&rig), Some(AcquisitionState::Lock));
}

#[test]
fn literal_centering_never_fires() {
    let mut rig = VirtualRig::new(TurretConfig::default(), SimConfig::default());

    let locked = rig.run_until(30_000, |r| state(r) == Some(AcquisitionState::Lock));
    assert!(locked.is_some(), "light was never detected");

    rig.run_for(20_000);
    assert_eq!(state(&rig), Some(AcquisitionState::Lock));
    assert_eq!(rig.rig.servo.shots(), 0);
    assert!(!rig.shares.fire_request.get(&rig.ctx));
}
