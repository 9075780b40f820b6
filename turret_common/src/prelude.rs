//! Common re-exports for convenience.
//!
//! ```rust
//! use turret_common::prelude::*;
//! ```

pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::consts::*;
pub use crate::control_unit::{
    AcquisitionConfig, Axis, AxisControlConfig, CenteringRule, ControlConfig, Counts, DriveMode,
    EncoderConfig, EncoderPins, MotorConfig, SchedulingConfig, SensorChannels, SensorConfig,
    SensorSnapshot, TriggerConfig, TurretConfig,
};
