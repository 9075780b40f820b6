//! Control unit assembly.
//!
//! [`ControlUnit::build`] allocates the shared registers, binds one
//! decoder per axis to its encoder lines in the edge interrupt table, and
//! creates every periodic task with its period and priority from the
//! configuration. [`ControlUnit::spawn`] starts one thread per task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::{error, info};

use turret_common::control_unit::config::TurretConfig;
use turret_common::control_unit::state::Axis;

use crate::acquisition::TargetAcquisition;
use crate::actuation::{EncoderDiagnostics, MotorActuator, SensorSampler, TriggerActuator};
use crate::control::AxisController;
use crate::cycle::{CycleError, CycleStats, PeriodicTask, TaskSpec, spawn_periodic};
use crate::encoder::{EdgeInterrupts, QuadratureDecoder};
use crate::hal::Peripherals;
use crate::shares::Shares;
use crate::telemetry::TelemetrySink;
use turret_shared_state::TaskCtx;

/// A task together with its scheduling parameters.
pub struct ScheduledTask {
    pub task: Box<dyn PeriodicTask>,
    pub spec: TaskSpec,
}

impl ScheduledTask {
    pub fn name(&self) -> &str {
        self.task.name()
    }
}

/// Fully wired, not yet running control unit.
pub struct ControlUnit {
    shares: Shares,
    interrupts: Arc<EdgeInterrupts>,
    decoders: [Arc<QuadratureDecoder>; 2],
    tasks: Vec<ScheduledTask>,
}

impl ControlUnit {
    /// Wire the unit. `telemetry` builds the sink of each axis controller.
    pub fn build<F>(config: &TurretConfig, peripherals: Peripherals, telemetry: F) -> Self
    where
        F: Fn(Axis) -> Box<dyn TelemetrySink>,
    {
        let shares = Shares::allocate();
        let sched = &config.scheduling;
        let cpu = sched.cpu_core;

        let Peripherals {
            elevation_encoder,
            azimuth_encoder,
            elevation_motor,
            azimuth_motor,
            adc,
            trigger,
        } = peripherals;

        let decoders = [
            Arc::new(QuadratureDecoder::for_axis(
                Axis::Elevation,
                elevation_encoder,
                &shares,
            )),
            Arc::new(QuadratureDecoder::for_axis(
                Axis::Azimuth,
                azimuth_encoder,
                &shares,
            )),
        ];
        let mut interrupts = EdgeInterrupts::new();
        for axis in Axis::ALL {
            let pins = config.encoders.pins(axis);
            interrupts.attach(
                pins.line_a,
                pins.line_b,
                Arc::clone(&decoders[axis.index()]),
            );
        }

        let mut tasks: Vec<ScheduledTask> = Vec::with_capacity(8);
        let mut add = |task: Box<dyn PeriodicTask>, spec: TaskSpec| {
            tasks.push(ScheduledTask { task, spec });
        };

        let acquisition = TargetAcquisition::new(config.acquisition.clone(), shares);
        acquisition.prime(&TaskCtx::new());
        add(
            Box::new(acquisition),
            TaskSpec::new(config.acquisition.period_ms, sched.acquisition_priority, cpu),
        );
        for axis in Axis::ALL {
            add(
                Box::new(AxisController::new(
                    axis,
                    &config.control,
                    *shares.axis(axis),
                    telemetry(axis),
                )),
                TaskSpec::new(config.control.period_ms, sched.control_priority, cpu),
            );
        }
        add(
            Box::new(MotorActuator::new(elevation_motor, azimuth_motor, shares)),
            TaskSpec::new(config.motor.period_ms, sched.motor_priority, cpu),
        );
        add(
            Box::new(SensorSampler::new(adc, config.sensor.clone(), shares)),
            TaskSpec::new(config.sensor.period_ms, sched.sensor_priority, cpu),
        );
        add(
            Box::new(EncoderDiagnostics::new(shares)),
            TaskSpec::new(sched.diagnostics_period_ms, sched.diagnostics_priority, cpu),
        );
        add(
            Box::new(TriggerActuator::new(trigger, config.trigger.clone(), shares)),
            TaskSpec::new(config.trigger.period_ms, sched.trigger_priority, cpu),
        );

        info!(tasks = tasks.len(), cpu_core = cpu, "Control unit built");
        Self {
            shares,
            interrupts: Arc::new(interrupts),
            decoders,
            tasks,
        }
    }

    pub fn shares(&self) -> Shares {
        self.shares
    }

    /// Edge interrupt table the encoder lines are routed through.
    pub fn interrupts(&self) -> Arc<EdgeInterrupts> {
        Arc::clone(&self.interrupts)
    }

    pub fn decoder(&self, axis: Axis) -> &Arc<QuadratureDecoder> {
        &self.decoders[axis.index()]
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(ScheduledTask::name).collect()
    }

    /// Schedule an extra task alongside the control tasks.
    pub fn add_task(&mut self, task: Box<dyn PeriodicTask>, spec: TaskSpec) {
        self.tasks.push(ScheduledTask { task, spec });
    }

    pub fn into_tasks(self) -> Vec<ScheduledTask> {
        self.tasks
    }

    /// Start every task on its own thread, highest priority first.
    ///
    /// If a thread cannot be created, the tasks already started are
    /// stopped and joined before the error is returned.
    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<RunningUnit, CycleError> {
        let mut tasks = self.tasks;
        tasks.sort_by(|a, b| b.spec.priority.cmp(&a.spec.priority));

        let mut running = RunningUnit {
            handles: Vec::with_capacity(tasks.len()),
            shutdown: Arc::clone(&shutdown),
        };
        for ScheduledTask { task, spec } in tasks {
            let name = task.name().to_string();
            match spawn_periodic(task, spec, Arc::clone(&shutdown)) {
                Ok(handle) => running.handles.push((name, handle)),
                Err(e) => {
                    error!(task = %name, "Task spawn failed, stopping unit");
                    running.stop();
                    // The spawn error is the one reported.
                    let _ = running.join();
                    return Err(e);
                }
            }
        }
        info!(tasks = running.handles.len(), "Control unit running");
        Ok(running)
    }
}

/// Handles of a running control unit.
pub struct RunningUnit {
    handles: Vec<(String, JoinHandle<Result<CycleStats, CycleError>>)>,
    shutdown: Arc<AtomicBool>,
}

impl RunningUnit {
    /// Ask every task to stop after its current cycle.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every task. Returns the statistics per task name, or the
    /// first task failure.
    pub fn join(self) -> Result<Vec<(String, CycleStats)>, CycleError> {
        let mut stats = Vec::with_capacity(self.handles.len());
        let mut first_error = None;
        for (name, handle) in self.handles {
            match handle.join() {
                Ok(Ok(task_stats)) => stats.push((name, task_stats)),
                Ok(Err(e)) => {
                    error!(task = %name, error = %e, "Task failed");
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    error!(task = %name, "Task panicked");
                    first_error.get_or_insert(CycleError::Panicked(name));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}
