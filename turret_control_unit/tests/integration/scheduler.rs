//! Integration test: the threaded unit on the simulated plant.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use turret_common::control_unit::config::TurretConfig;
use turret_common::control_unit::state::Axis;
use turret_control_unit::cycle::TaskSpec;
use turret_control_unit::sim::{SimConfig, SimPlant, SimRig};
use turret_control_unit::telemetry::NullSink;
use turret_control_unit::unit::ControlUnit;
use turret_shared_state::TaskCtx;

#[test]
fn threaded_unit_runs_and_stops() {
    let config = TurretConfig::default();
    let rig = SimRig::new(&config);
    let mut unit = ControlUnit::build(&config, rig.peripherals(&config.encoders), |_| {
        Box::new(NullSink)
    });
    let shares = unit.shares();
    let plant = SimPlant::new(SimConfig::default(), &config, &rig, unit.interrupts());
    unit.add_task(Box::new(plant), TaskSpec::new(5, 5, 0));

    let shutdown = Arc::new(AtomicBool::new(false));
    let running = unit.spawn(Arc::clone(&shutdown)).unwrap();
    assert_eq!(running.task_count(), 8);

    thread::sleep(Duration::from_millis(600));
    running.stop();
    let stats = running.join().unwrap();

    assert_eq!(stats.len(), 8);
    // Spawned highest priority first.
    assert_eq!(stats[0].0, "plant");
    assert_eq!(stats[1].0, "acquisition");
    for (name, s) in &stats {
        assert!(s.cycle_count > 0, "{name} never ran");
    }

    // FaceTarget has set the azimuth reference and the turret is turning.
    let ctx = TaskCtx::new();
    assert_eq!(shares.axis(Axis::Azimuth).reference.get(&ctx), 700);
    assert!(shares.axis(Axis::Azimuth).position.get(&ctx) > 0);
    assert_eq!(shares.encoder_errors.get(&ctx), 0);
}
