//! Host simulation of the turret mechanics.
//!
//! [`SimRig`] owns the simulated peripherals handed to the control unit.
//! [`SimPlant`] closes the loop: it integrates the bridge outputs into shaft
//! motion, walks each encoder's Gray code one count at a time while raising
//! the matching edge interrupt, and lights the photosensor elements from the
//! turret pose.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use turret_common::config::ConfigError;
use turret_common::consts::PERIOD_MS_MAX;
use turret_common::control_unit::config::{EncoderConfig, EncoderPins, SensorChannels, TurretConfig};
use turret_common::control_unit::state::{Axis, Counts, SensorSnapshot};
use turret_shared_state::TaskCtx;

use crate::cycle::PeriodicTask;
use crate::encoder::{EdgeInterrupts, QuadratureLines};
use crate::hal::sim::{SimAdc, SimMotor, SimPort, SimServo};
use crate::hal::{DigitalPort, Peripherals, PortLines};

/// Largest value the ADC reports.
pub const ADC_FULL_SCALE: u16 = 1023;

// ─── Configuration ──────────────────────────────────────────────────

/// Point light source in encoder coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightTarget {
    pub elevation: Counts,
    pub azimuth: Counts,
    /// Reading of an element aimed straight at the source.
    pub peak: f64,
    /// Distance at which the reading halves [counts].
    pub spread: f64,
}

impl Default for LightTarget {
    fn default() -> Self {
        Self {
            elevation: 200,
            azimuth: 900,
            peak: 400.0,
            spread: 30.0,
        }
    }
}

/// Simulated plant settings, read from the `[sim]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Plant integration step [ms].
    pub plant_period_ms: u64,
    /// Shaft speed per unit of PWM duty [counts/s].
    pub counts_per_second_per_duty: f64,
    /// Duties below this do not overcome static friction.
    pub stall_duty: u16,
    /// Angular offset of the peripheral photosensor elements [counts].
    pub sensor_offset: Counts,
    pub target: LightTarget,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            plant_period_ms: 5,
            counts_per_second_per_duty: 2.0,
            stall_duty: 15,
            sensor_offset: 40,
            target: LightTarget::default(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plant_period_ms == 0 || self.plant_period_ms > PERIOD_MS_MAX {
            return Err(ConfigError::ValidationError(format!(
                "sim.plant_period_ms {} out of range [1, {PERIOD_MS_MAX}]",
                self.plant_period_ms
            )));
        }
        if !self.counts_per_second_per_duty.is_finite() || self.counts_per_second_per_duty <= 0.0
        {
            return Err(ConfigError::ValidationError(
                "sim.counts_per_second_per_duty must be positive".to_string(),
            ));
        }
        if !self.target.spread.is_finite() || self.target.spread <= 0.0 {
            return Err(ConfigError::ValidationError(
                "sim.target.spread must be positive".to_string(),
            ));
        }
        if !self.target.peak.is_finite() || self.target.peak < 0.0 {
            return Err(ConfigError::ValidationError(
                "sim.target.peak must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Document shape holding only the `[sim]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimFile {
    pub sim: SimConfig,
}

// ─── Light Model ────────────────────────────────────────────────────

/// Photosensor readings for a turret aimed at `(elevation, azimuth)`.
///
/// High elements look `offset` counts up, left elements `offset` counts
/// toward increasing azimuth.
pub fn light_readings(
    target: &LightTarget,
    offset: Counts,
    elevation: Counts,
    azimuth: Counts,
) -> SensorSnapshot {
    let reading = |de: Counts, da: Counts| -> u16 {
        let e = f64::from(elevation.wrapping_add(de).wrapping_sub(target.elevation));
        let a = f64::from(azimuth.wrapping_add(da).wrapping_sub(target.azimuth));
        let d = e.hypot(a) / target.spread;
        let value = target.peak / (1.0 + d * d);
        // Clamped into the ADC range before the cast.
        value.clamp(0.0, f64::from(ADC_FULL_SCALE)) as u16
    };
    SensorSnapshot {
        center: reading(0, 0),
        high_left: reading(offset, offset),
        high_right: reading(offset, -offset),
        low_left: reading(-offset, offset),
        low_right: reading(-offset, -offset),
    }
}

// ─── Rig ────────────────────────────────────────────────────────────

/// Simulated peripherals. Every handle is a probe onto the state the
/// control unit drives.
#[derive(Debug, Clone)]
pub struct SimRig {
    pub port: Arc<SimPort>,
    pub elevation_motor: SimMotor,
    pub azimuth_motor: SimMotor,
    pub adc: SimAdc,
    pub servo: SimServo,
}

impl SimRig {
    pub fn new(config: &TurretConfig) -> Self {
        Self {
            port: Arc::new(SimPort::new()),
            elevation_motor: SimMotor::new(Axis::Elevation, config.motor.brake_duty),
            azimuth_motor: SimMotor::new(Axis::Azimuth, config.motor.brake_duty),
            adc: SimAdc::new(),
            servo: SimServo::new(),
        }
    }

    pub fn motor(&self, axis: Axis) -> &SimMotor {
        match axis {
            Axis::Elevation => &self.elevation_motor,
            Axis::Azimuth => &self.azimuth_motor,
        }
    }

    /// Peripheral set wired per `encoders`.
    pub fn peripherals(&self, encoders: &EncoderConfig) -> Peripherals {
        Peripherals {
            elevation_encoder: Box::new(PortLines::new(Arc::clone(&self.port), encoders.elevation)),
            azimuth_encoder: Box::new(PortLines::new(Arc::clone(&self.port), encoders.azimuth)),
            elevation_motor: Box::new(self.elevation_motor.clone()),
            azimuth_motor: Box::new(self.azimuth_motor.clone()),
            adc: Box::new(self.adc.clone()),
            trigger: Box::new(self.servo.clone()),
        }
    }
}

// ─── Plant ──────────────────────────────────────────────────────────

struct PlantAxis {
    motor: SimMotor,
    pins: EncoderPins,
    lines: QuadratureLines,
    position: Counts,
    /// Sub-count travel carried to the next step.
    residual: f64,
}

/// Two-axis first-order plant.
pub struct SimPlant {
    config: SimConfig,
    axes: [PlantAxis; 2],
    port: Arc<SimPort>,
    adc: SimAdc,
    channels: SensorChannels,
    interrupts: Arc<EdgeInterrupts>,
    edges: u64,
}

impl SimPlant {
    pub fn new(
        config: SimConfig,
        turret: &TurretConfig,
        rig: &SimRig,
        interrupts: Arc<EdgeInterrupts>,
    ) -> Self {
        let bind = |axis: Axis| {
            let pins = turret.encoders.pins(axis);
            PlantAxis {
                motor: rig.motor(axis).clone(),
                pins,
                lines: QuadratureLines::from_levels(
                    rig.port.level(pins.line_a),
                    rig.port.level(pins.line_b),
                ),
                position: 0,
                residual: 0.0,
            }
        };
        let plant = Self {
            axes: [bind(Axis::Elevation), bind(Axis::Azimuth)],
            port: Arc::clone(&rig.port),
            adc: rig.adc.clone(),
            channels: turret.sensor.channels.clone(),
            interrupts,
            edges: 0,
            config,
        };
        plant.publish_light();
        plant
    }

    /// Shaft position as the mechanism sees it.
    pub fn true_position(&self, axis: Axis) -> Counts {
        self.axes[axis.index()].position
    }

    /// Edge interrupts raised so far.
    pub fn edges(&self) -> u64 {
        self.edges
    }

    /// Integrate `dt_s` seconds of motion and refresh the photosensors.
    pub fn advance(&mut self, dt_s: f64) {
        for i in 0..self.axes.len() {
            let duty = self.axes[i].motor.output().signed_duty();
            if duty.unsigned_abs() < u32::from(self.config.stall_duty) {
                self.axes[i].residual = 0.0;
                continue;
            }
            let travel =
                self.axes[i].residual + f64::from(duty) * self.config.counts_per_second_per_duty * dt_s;
            let whole = travel.trunc();
            self.axes[i].residual = travel - whole;
            // Bounded by duty * rate * dt.
            let counts = whole as i64;
            for _ in 0..counts.unsigned_abs() {
                self.step_encoder(i, counts > 0);
            }
        }
        self.publish_light();
    }

    /// Move one count and raise the edge of the line that changed.
    fn step_encoder(&mut self, index: usize, forward: bool) {
        let axis = &mut self.axes[index];
        let next = if forward {
            axis.lines.advanced()
        } else {
            axis.lines.retreated()
        };
        let changed = axis.lines ^ next;
        let line = if changed.contains(QuadratureLines::LINE_A) {
            self.port.set(axis.pins.line_a, next.contains(QuadratureLines::LINE_A));
            axis.pins.line_a
        } else {
            self.port.set(axis.pins.line_b, next.contains(QuadratureLines::LINE_B));
            axis.pins.line_b
        };
        axis.lines = next;
        axis.position = axis.position.wrapping_add(if forward { 1 } else { -1 });
        self.edges += 1;
        self.interrupts.raise(line);
    }

    fn publish_light(&self) {
        let snap = light_readings(
            &self.config.target,
            self.config.sensor_offset,
            self.axes[Axis::Elevation.index()].position,
            self.axes[Axis::Azimuth.index()].position,
        );
        let ch = &self.channels;
        self.adc.set(ch.center, snap.center);
        self.adc.set(ch.high_left, snap.high_left);
        self.adc.set(ch.high_right, snap.high_right);
        self.adc.set(ch.low_left, snap.low_left);
        self.adc.set(ch.low_right, snap.low_right);
    }
}

impl PeriodicTask for SimPlant {
    fn name(&self) -> &str {
        "plant"
    }

    fn start(&mut self, _ctx: &TaskCtx) {
        info!(
            target_elevation = self.config.target.elevation,
            target_azimuth = self.config.target.azimuth,
            "Simulated plant running"
        );
    }

    fn cycle(&mut self, _ctx: &TaskCtx) {
        // Millisecond periods convert exactly.
        self.advance(self.config.plant_period_ms as f64 / 1000.0);
        debug!(
            elevation = self.true_position(Axis::Elevation),
            azimuth = self.true_position(Axis::Azimuth),
            "Plant pose"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::QuadratureDecoder;
    use crate::hal::MotorDriver;
    use crate::shares::Shares;

    struct Bench {
        ctx: TaskCtx,
        shares: Shares,
        rig: SimRig,
        plant: SimPlant,
    }

    fn bench(config: SimConfig) -> Bench {
        let turret = TurretConfig::default();
        let rig = SimRig::new(&turret);
        let shares = Shares::allocate();
        let peripherals = rig.peripherals(&turret.encoders);
        let mut interrupts = EdgeInterrupts::new();
        for (axis, inputs) in [
            (Axis::Elevation, peripherals.elevation_encoder),
            (Axis::Azimuth, peripherals.azimuth_encoder),
        ] {
            let pins = turret.encoders.pins(axis);
            let decoder = Arc::new(QuadratureDecoder::for_axis(axis, inputs, &shares));
            interrupts.attach(pins.line_a, pins.line_b, decoder);
        }
        let plant = SimPlant::new(config, &turret, &rig, Arc::new(interrupts));
        Bench {
            ctx: TaskCtx::new(),
            shares,
            rig,
            plant,
        }
    }

    #[test]
    fn powered_motor_moves_decoded_position() {
        let mut b = bench(SimConfig::default());
        let mut motor = b.rig.elevation_motor.clone();
        motor.set_power(128);
        // 128 duty * 2 counts/s/duty * 2^-7 s = 2 counts per step
        for _ in 0..50 {
            b.plant.advance(0.007_812_5);
        }
        assert_eq!(b.plant.true_position(Axis::Elevation), 100);
        assert_eq!(b.shares.elevation.position.get(&b.ctx), 100);
        assert_eq!(b.shares.azimuth.position.get(&b.ctx), 0);
        assert_eq!(b.shares.encoder_errors.get(&b.ctx), 0);
        assert_eq!(b.plant.edges(), 100);
    }

    #[test]
    fn reverse_power_counts_down() {
        let mut b = bench(SimConfig::default());
        let mut motor = b.rig.azimuth_motor.clone();
        motor.set_power(-50);
        b.plant.advance(0.25);
        assert_eq!(b.plant.true_position(Axis::Azimuth), -25);
        assert_eq!(b.shares.azimuth.position.get(&b.ctx), -25);
    }

    #[test]
    fn brake_and_stall_hold_position() {
        let mut b = bench(SimConfig::default());
        let mut motor = b.rig.elevation_motor.clone();
        motor.set_power(10);
        b.plant.advance(1.0);
        motor.brake();
        b.plant.advance(1.0);
        assert_eq!(b.plant.true_position(Axis::Elevation), 0);
        assert_eq!(b.plant.edges(), 0);
    }

    #[test]
    fn light_peaks_on_target() {
        let target = LightTarget::default();
        let on = light_readings(&target, 40, target.elevation, target.azimuth);
        assert_eq!(on.center, 400);
        assert!(on.high_left < on.center);
        assert_eq!(on.high_left, on.low_right);

        // Target up and to the left of the aim point.
        let off = light_readings(&target, 40, target.elevation - 40, target.azimuth - 40);
        assert_eq!(off.high_left, 400);
        assert!(off.high_left > off.center);
        assert!(off.center > off.low_right);
    }

    #[test]
    fn plant_publishes_adc_channels() {
        use crate::hal::AnalogInput;
        let b = bench(SimConfig {
            target: LightTarget {
                elevation: 0,
                azimuth: 0,
                ..LightTarget::default()
            },
            ..SimConfig::default()
        });
        let mut adc = b.rig.adc.clone();
        assert_eq!(adc.read_once(0), 400);
    }

    #[test]
    fn invalid_sim_config_is_rejected() {
        let mut config = SimConfig::default();
        assert!(config.validate().is_ok());
        config.target.spread = 0.0;
        assert!(config.validate().is_err());
        config = SimConfig {
            plant_period_ms: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
