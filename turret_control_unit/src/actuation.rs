//! Collaborator tasks around the control core: photosensor sampling, motor
//! actuation, trigger actuation and encoder diagnostics.

use tracing::{debug, warn};

use turret_common::control_unit::config::{SensorConfig, TriggerConfig};
use turret_common::control_unit::state::{Axis, DriveMode, SensorSnapshot};
use turret_shared_state::TaskCtx;

use crate::cycle::PeriodicTask;
use crate::hal::{AnalogInput, MotorDriver, TriggerServo};
use crate::shares::Shares;

// ─── Sensor Sampler ─────────────────────────────────────────────────

/// Samples the five photosensor elements into one snapshot.
pub struct SensorSampler {
    adc: Box<dyn AnalogInput>,
    config: SensorConfig,
    shares: Shares,
}

impl SensorSampler {
    pub fn new(adc: Box<dyn AnalogInput>, config: SensorConfig, shares: Shares) -> Self {
        Self { adc, config, shares }
    }

    /// Read every element once (oversampled) and publish the snapshot.
    pub fn sample(&mut self, ctx: &TaskCtx) -> SensorSnapshot {
        let ch = &self.config.channels;
        let n = self.config.oversample;
        let snap = SensorSnapshot {
            center: self.adc.read_oversampled(ch.center, n),
            high_left: self.adc.read_oversampled(ch.high_left, n),
            high_right: self.adc.read_oversampled(ch.high_right, n),
            low_left: self.adc.read_oversampled(ch.low_left, n),
            low_right: self.adc.read_oversampled(ch.low_right, n),
        };
        self.shares.sensors.put(ctx, snap);
        snap
    }
}

impl PeriodicTask for SensorSampler {
    fn name(&self) -> &str {
        "sensor"
    }

    fn cycle(&mut self, ctx: &TaskCtx) {
        self.sample(ctx);
    }
}

// ─── Motor Actuation ────────────────────────────────────────────────

/// Applies the latest command of each axis to its motor driver.
pub struct MotorActuator {
    elevation: Box<dyn MotorDriver>,
    azimuth: Box<dyn MotorDriver>,
    shares: Shares,
}

/// Apply one command to a driver.
pub fn apply_command(driver: &mut dyn MotorDriver, mode: DriveMode) {
    match mode {
        DriveMode::Brake => driver.brake(),
        DriveMode::Freewheel => driver.freewheel(),
        DriveMode::Power(magnitude) => driver.set_power(magnitude),
    }
}

impl MotorActuator {
    pub fn new(
        elevation: Box<dyn MotorDriver>,
        azimuth: Box<dyn MotorDriver>,
        shares: Shares,
    ) -> Self {
        Self {
            elevation,
            azimuth,
            shares,
        }
    }

    /// Read both commands and apply them. Returns `[elevation, azimuth]`.
    pub fn actuate(&mut self, ctx: &TaskCtx) -> [DriveMode; 2] {
        let commands = ctx.critical(|cs| {
            [
                self.shares.elevation.command.load(cs),
                self.shares.azimuth.command.load(cs),
            ]
        });
        apply_command(self.elevation.as_mut(), commands[Axis::Elevation.index()]);
        apply_command(self.azimuth.as_mut(), commands[Axis::Azimuth.index()]);
        debug!(
            elevation = ?commands[Axis::Elevation.index()],
            azimuth = ?commands[Axis::Azimuth.index()],
            "Motor commands applied"
        );
        commands
    }
}

impl PeriodicTask for MotorActuator {
    fn name(&self) -> &str {
        "motor"
    }

    fn cycle(&mut self, ctx: &TaskCtx) {
        self.actuate(ctx);
    }
}

// ─── Trigger Actuation ──────────────────────────────────────────────

/// Trigger servo pulse sequencer.
///
/// A fire request pulls the trigger for `pull_cycles`, then the servo is
/// released and the request cleared until `sequence_cycles` have elapsed.
pub struct TriggerActuator {
    servo: Box<dyn TriggerServo>,
    config: TriggerConfig,
    shares: Shares,
    runs: u16,
}

impl TriggerActuator {
    pub fn new(servo: Box<dyn TriggerServo>, config: TriggerConfig, shares: Shares) -> Self {
        Self {
            servo,
            config,
            shares,
            runs: 0,
        }
    }

    pub fn runs(&self) -> u16 {
        self.runs
    }

    /// Advance the sequence by one cycle.
    pub fn tick(&mut self, ctx: &TaskCtx) {
        let fire = self.shares.fire_request.get(ctx);
        if fire && self.runs < self.config.pull_cycles {
            if self.runs == 0 {
                debug!("Trigger pulled");
            }
            self.servo.set_duty(self.config.fire_duty);
            self.runs += 1;
        } else if self.runs < self.config.sequence_cycles {
            self.servo.set_duty(0);
            self.runs += 1;
            self.shares.fire_request.put(ctx, false);
        } else {
            self.runs = 0;
        }
    }
}

impl PeriodicTask for TriggerActuator {
    fn name(&self) -> &str {
        "trigger"
    }

    fn cycle(&mut self, ctx: &TaskCtx) {
        self.tick(ctx);
    }
}

// ─── Encoder Diagnostics ────────────────────────────────────────────

/// Periodic report of both axis positions and the decode error counter.
pub struct EncoderDiagnostics {
    shares: Shares,
    last_errors: u32,
}

impl EncoderDiagnostics {
    pub fn new(shares: Shares) -> Self {
        Self {
            shares,
            last_errors: 0,
        }
    }

    /// Returns the number of new decode errors since the last report.
    pub fn report(&mut self, ctx: &TaskCtx) -> u32 {
        let (elevation, azimuth, errors) = ctx.critical(|cs| {
            (
                self.shares.elevation.position.load(cs),
                self.shares.azimuth.position.load(cs),
                self.shares.encoder_errors.load(cs),
            )
        });
        debug!(elevation, azimuth, errors, "Encoder positions");

        let new_errors = errors.wrapping_sub(self.last_errors);
        if new_errors > 0 {
            warn!(new_errors, total = errors, "Quadrature decode errors");
        }
        self.last_errors = errors;
        new_errors
    }
}

impl PeriodicTask for EncoderDiagnostics {
    fn name(&self) -> &str {
        "diagnostics"
    }

    fn cycle(&mut self, ctx: &TaskCtx) {
        self.report(ctx);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
