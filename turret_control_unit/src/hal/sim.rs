//! In-process peripherals for host runs and tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use turret_common::control_unit::state::Axis;

use super::{AnalogInput, DigitalPort, MotorDriver, TriggerServo};

// ─── Digital Port ───────────────────────────────────────────────────

/// Eight input lines held in one byte.
#[derive(Debug, Default)]
pub struct SimPort {
    levels: AtomicU8,
}

impl SimPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, line: u8, high: bool) {
        let mask = 1u8 << (line & 7);
        if high {
            self.levels.fetch_or(mask, Ordering::SeqCst);
        } else {
            self.levels.fetch_and(!mask, Ordering::SeqCst);
        }
    }

    pub fn levels(&self) -> u8 {
        self.levels.load(Ordering::SeqCst)
    }
}

impl DigitalPort for SimPort {
    fn level(&self, line: u8) -> bool {
        self.levels() & (1u8 << (line & 7)) != 0
    }
}

// ─── Motor Bridge ───────────────────────────────────────────────────

/// Which bridge input is driven high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeDirection {
    /// Both inputs low.
    #[default]
    Off,
    A,
    B,
}

/// Pin-level state of one H-bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeOutput {
    pub direction: BridgeDirection,
    pub duty: u16,
    pub braking: bool,
}

impl BridgeOutput {
    /// Effective drive: positive toward A, zero when braking or off.
    pub fn signed_duty(&self) -> i32 {
        match (self.braking, self.direction) {
            (true, _) | (_, BridgeDirection::Off) => 0,
            (false, BridgeDirection::A) => i32::from(self.duty),
            (false, BridgeDirection::B) => -i32::from(self.duty),
        }
    }
}

/// Simulated H-bridge. Clones observe the same output.
#[derive(Debug, Clone)]
pub struct SimMotor {
    axis: Axis,
    output: Arc<Mutex<BridgeOutput>>,
    brake_duty: u16,
}

impl SimMotor {
    pub fn new(axis: Axis, brake_duty: u16) -> Self {
        Self {
            axis,
            output: Arc::new(Mutex::new(BridgeOutput::default())),
            brake_duty,
        }
    }

    pub fn output(&self) -> BridgeOutput {
        *self.output.lock()
    }
}

impl MotorDriver for SimMotor {
    fn set_power(&mut self, magnitude: i16) {
        let direction = if magnitude > 0 {
            BridgeDirection::A
        } else {
            BridgeDirection::B
        };
        *self.output.lock() = BridgeOutput {
            direction,
            duty: magnitude.unsigned_abs(),
            braking: false,
        };
    }

    fn freewheel(&mut self) {
        *self.output.lock() = BridgeOutput::default();
    }

    fn brake(&mut self) {
        *self.output.lock() = BridgeOutput {
            direction: BridgeDirection::Off,
            duty: self.brake_duty,
            braking: true,
        };
        debug!(axis = %self.axis, "Motor braked");
    }
}

// ─── Analog Input ───────────────────────────────────────────────────

/// ADC with eight channels whose values are set by the simulation.
#[derive(Debug, Clone, Default)]
pub struct SimAdc {
    channels: Arc<[AtomicU16; 8]>,
}

impl SimAdc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, channel: u8, value: u16) {
        self.channels[usize::from(channel & 7)].store(value, Ordering::Relaxed);
    }
}

impl AnalogInput for SimAdc {
    fn read_once(&mut self, channel: u8) -> u16 {
        self.channels[usize::from(channel & 7)].load(Ordering::Relaxed)
    }
}

// ─── Trigger Servo ──────────────────────────────────────────────────

/// Servo that counts trigger pulls. Clones share the counters.
#[derive(Debug, Clone)]
pub struct SimServo {
    duty: Arc<AtomicU16>,
    shots: Arc<AtomicU32>,
}

impl SimServo {
    pub fn new() -> Self {
        Self {
            duty: Arc::new(AtomicU16::new(0)),
            shots: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::SeqCst)
    }

    /// Released-to-pulled transitions seen so far.
    pub fn shots(&self) -> u32 {
        self.shots.load(Ordering::SeqCst)
    }
}

impl Default for SimServo {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerServo for SimServo {
    fn set_duty(&mut self, duty: u16) {
        let previous = self.duty.swap(duty, Ordering::SeqCst);
        if previous == 0 && duty > 0 {
            let shots = self.shots.fetch_add(1, Ordering::SeqCst) + 1;
            info!(shots, "Shot fired");
        }
    }
}
