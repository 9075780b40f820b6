//! Hardware collaborator interfaces.
//!
//! The control core never touches registers directly. Each peripheral is
//! reached through a small trait, resolved once at startup from logical
//! pin or channel numbers and injected into the task that owns it.

pub mod sim;

use turret_common::consts::SENSOR_OVERSAMPLE_MAX;
use turret_common::control_unit::config::EncoderPins;

use crate::encoder::QuadratureLines;

// ─── Digital Inputs ─────────────────────────────────────────────────

/// Eight-line digital input port.
pub trait DigitalPort: Send + Sync {
    /// Logic level of `line` (0..=7).
    fn level(&self, line: u8) -> bool;
}

/// The two input lines of one quadrature encoder.
pub trait QuadratureInputs: Send + Sync {
    fn sample(&self) -> QuadratureLines;
}

/// [`QuadratureInputs`] resolved from a port and a pin pair.
pub struct PortLines<P> {
    port: P,
    pins: EncoderPins,
}

impl<P: DigitalPort> PortLines<P> {
    pub fn new(port: P, pins: EncoderPins) -> Self {
        Self { port, pins }
    }

    pub fn pins(&self) -> EncoderPins {
        self.pins
    }
}

impl<P: DigitalPort> QuadratureInputs for PortLines<P> {
    #[inline]
    fn sample(&self) -> QuadratureLines {
        QuadratureLines::from_levels(
            self.port.level(self.pins.line_a),
            self.port.level(self.pins.line_b),
        )
    }
}

impl<P: DigitalPort + ?Sized> DigitalPort for std::sync::Arc<P> {
    #[inline]
    fn level(&self, line: u8) -> bool {
        (**self).level(line)
    }
}

// ─── Actuators ──────────────────────────────────────────────────────

/// H-bridge motor driver of one axis.
pub trait MotorDriver: Send {
    /// Drive with signed magnitude; sign selects direction.
    fn set_power(&mut self, magnitude: i16);
    /// Release the bridge.
    fn freewheel(&mut self);
    /// Short the motor terminals.
    fn brake(&mut self);
}

/// PWM-driven trigger servo.
pub trait TriggerServo: Send {
    fn set_duty(&mut self, duty: u16);
}

/// Every collaborator the control unit drives, resolved at startup.
pub struct Peripherals {
    pub elevation_encoder: Box<dyn QuadratureInputs>,
    pub azimuth_encoder: Box<dyn QuadratureInputs>,
    pub elevation_motor: Box<dyn MotorDriver>,
    pub azimuth_motor: Box<dyn MotorDriver>,
    pub adc: Box<dyn AnalogInput>,
    pub trigger: Box<dyn TriggerServo>,
}

// ─── Analog Inputs ──────────────────────────────────────────────────

/// Multiplexed ADC. Conversions are synchronous and bounded.
pub trait AnalogInput: Send {
    /// One conversion on `channel`.
    fn read_once(&mut self, channel: u8) -> u16;

    /// Average of `samples + 1` conversions, integer division.
    /// `samples` is capped at [`SENSOR_OVERSAMPLE_MAX`].
    fn read_oversampled(&mut self, channel: u8, samples: u8) -> u16 {
        let samples = samples.min(SENSOR_OVERSAMPLE_MAX);
        let count = u32::from(samples) + 1;
        let sum: u32 = (0..count).map(|_| u32::from(self.read_once(channel))).sum();
        // Average of u16 values fits in u16.
        (sum / count) as u16
    }
}
