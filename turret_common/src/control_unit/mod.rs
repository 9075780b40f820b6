//! Control unit value types and configuration sections.

pub mod config;
pub mod state;

pub use config::{
    AcquisitionConfig, AxisControlConfig, CenteringRule, ControlConfig, EncoderConfig,
    EncoderPins, MotorConfig, SchedulingConfig, SensorChannels, SensorConfig, TriggerConfig,
    TurretConfig,
};
pub use state::{Axis, Counts, DriveMode, SensorSnapshot};
