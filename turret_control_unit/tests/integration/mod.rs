//! Shared fixtures: a control unit on the simulated plant, stepped on a
//! virtual clock so every run is deterministic.

mod acquisition_flow;
mod closed_loop;
mod config_files;
mod decoder_props;
mod scheduler;

use turret_common::control_unit::config::TurretConfig;
use turret_common::control_unit::state::{Axis, Counts};
use turret_control_unit::acquisition::TargetAcquisition;
use turret_control_unit::shares::Shares;
use turret_control_unit::sim::{SimConfig, SimPlant, SimRig};
use turret_control_unit::telemetry::MemorySink;
use turret_control_unit::unit::{ControlUnit, ScheduledTask};
use turret_shared_state::TaskCtx;

pub struct VirtualRig {
    pub ctx: TaskCtx,
    pub rig: SimRig,
    pub shares: Shares,
    pub plant: SimPlant,
    /// Stepped separately so tests can inspect its state.
    pub acquisition: Option<TargetAcquisition>,
    acquisition_period_ms: u64,
    pub telemetry: [MemorySink; 2],
    tasks: Vec<ScheduledTask>,
    tick_ms: u64,
    pub now_ms: u64,
}

impl VirtualRig {
    pub fn new(config: TurretConfig, sim: SimConfig) -> Self {
        let rig = SimRig::new(&config);
        let telemetry = [MemorySink::new(), MemorySink::new()];
        let sinks = telemetry.clone();
        let unit = ControlUnit::build(&config, rig.peripherals(&config.encoders), move |axis| {
            Box::new(sinks[axis.index()].clone())
        });
        let shares = unit.shares();
        let tick_ms = sim.plant_period_ms;
        let plant = SimPlant::new(sim, &config, &rig, unit.interrupts());

        let mut tasks = unit.into_tasks();
        tasks.retain(|t| t.name() != "acquisition");
        tasks.sort_by(|a, b| b.spec.priority.cmp(&a.spec.priority));

        let ctx = TaskCtx::new();
        let acquisition = TargetAcquisition::new(config.acquisition.clone(), shares);
        acquisition.prime(&ctx);
        for t in &mut tasks {
            t.task.start(&ctx);
        }

        Self {
            ctx,
            rig,
            shares,
            plant,
            acquisition: Some(acquisition),
            acquisition_period_ms: config.acquisition.period_ms,
            telemetry,
            tasks,
            tick_ms,
            now_ms: 0,
        }
    }

    /// Rig with references under test control.
    pub fn without_acquisition(config: TurretConfig, sim: SimConfig) -> Self {
        let mut rig = Self::new(config, sim);
        rig.acquisition = None;
        rig
    }

    /// Advance the virtual clock by one plant step. The plant moves first,
    /// then every due task runs, highest priority first.
    pub fn tick(&mut self) {
        self.plant.advance(self.tick_ms as f64 / 1000.0);
        self.now_ms += self.tick_ms;
        let now = self.now_ms;
        if let Some(acq) = self.acquisition.as_mut() {
            if now % self.acquisition_period_ms == 0 {
                acq.step(&self.ctx);
            }
        }
        for t in &mut self.tasks {
            let period = t.spec.period.as_millis() as u64;
            if now % period == 0 {
                t.task.cycle(&self.ctx);
            }
        }
    }

    pub fn run_for(&mut self, ms: u64) {
        let end = self.now_ms + ms;
        while self.now_ms < end {
            self.tick();
        }
    }

    /// Tick until `done` holds or `limit_ms` of virtual time passed.
    /// Returns the virtual time at which `done` first held.
    pub fn run_until(&mut self, limit_ms: u64, mut done: impl FnMut(&Self) -> bool) -> Option<u64> {
        let end = self.now_ms + limit_ms;
        while self.now_ms < end {
            self.tick();
            if done(self) {
                return Some(self.now_ms);
            }
        }
        None
    }

    pub fn set_reference(&self, axis: Axis, reference: Counts) {
        let shares = self.shares.axis(axis);
        self.ctx.critical(|cs| {
            shares.reached.store(cs, false);
            shares.reference.store(cs, reference);
        });
    }

    pub fn reached(&self, axis: Axis) -> bool {
        self.shares.axis(axis).reached.get(&self.ctx)
    }

    pub fn position(&self, axis: Axis) -> Counts {
        self.shares.axis(axis).position.get(&self.ctx)
    }

    pub fn reference(&self, axis: Axis) -> Counts {
        self.shares.axis(axis).reference.get(&self.ctx)
    }
}
