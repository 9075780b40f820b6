//! Configuration structures for the turret control unit.
//!
//! All config types use `serde::Deserialize` for TOML loading. Every field
//! has a default taken from [`crate::consts`], so partial files only override
//! what they name. Bounds are enforced by [`TurretConfig::validate`].

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::*;

use super::state::{Axis, Counts};

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level turret configuration.
///
/// Loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    pub shared: SharedConfig,
    pub control: ControlConfig,
    pub acquisition: AcquisitionConfig,
    pub sensor: SensorConfig,
    pub motor: MotorConfig,
    pub trigger: TriggerConfig,
    pub encoders: EncoderConfig,
    pub scheduling: SchedulingConfig,
}

impl TurretConfig {
    /// Validate parameter bounds across all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.control.validate().map_err(ConfigError::ValidationError)?;
        self.acquisition
            .validate()
            .map_err(ConfigError::ValidationError)?;
        self.sensor.validate().map_err(ConfigError::ValidationError)?;
        self.trigger.validate().map_err(ConfigError::ValidationError)?;
        self.encoders.validate().map_err(ConfigError::ValidationError)?;

        for (name, period) in [
            ("control.period_ms", self.control.period_ms),
            ("acquisition.period_ms", self.acquisition.period_ms),
            ("sensor.period_ms", self.sensor.period_ms),
            ("motor.period_ms", self.motor.period_ms),
            ("trigger.period_ms", self.trigger.period_ms),
            ("scheduling.diagnostics_period_ms", self.scheduling.diagnostics_period_ms),
        ] {
            if period == 0 || period > PERIOD_MS_MAX {
                return Err(ConfigError::ValidationError(format!(
                    "{name} {period} out of range [1, {PERIOD_MS_MAX}]"
                )));
            }
        }
        Ok(())
    }
}

// ─── Axis Control ───────────────────────────────────────────────────

/// Closed-loop position control settings shared by both axis controllers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Controller period per axis [ms].
    pub period_ms: u64,
    /// Output saturation [PWM units].
    pub max_magnitude: i16,
    /// Smallest magnitude that moves a motor [PWM units].
    pub dead_zone_floor: i16,
    pub elevation: AxisControlConfig,
    pub azimuth: AxisControlConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            period_ms: CONTROL_PERIOD_MS,
            max_magnitude: MAX_MAGNITUDE,
            dead_zone_floor: DEAD_ZONE_FLOOR,
            elevation: AxisControlConfig::elevation(),
            azimuth: AxisControlConfig::azimuth(),
        }
    }
}

impl ControlConfig {
    /// Per-axis section.
    pub fn axis(&self, axis: Axis) -> &AxisControlConfig {
        match axis {
            Axis::Elevation => &self.elevation,
            Axis::Azimuth => &self.azimuth,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_magnitude <= 0 {
            return Err(format!(
                "control.max_magnitude {} must be positive",
                self.max_magnitude
            ));
        }
        if self.dead_zone_floor < 0 || self.dead_zone_floor > self.max_magnitude {
            return Err(format!(
                "control.dead_zone_floor {} out of range [0, {}]",
                self.dead_zone_floor, self.max_magnitude
            ));
        }
        for axis in Axis::ALL {
            self.axis(axis)
                .validate()
                .map_err(|e| format!("control.{axis}: {e}"))?;
        }
        Ok(())
    }
}

/// Gains and limits of one axis controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisControlConfig {
    pub kp: f64,
    pub ki: f64,
    /// Derivative gain slot. Carried in the configuration, not applied.
    #[serde(default)]
    pub kd: f64,
    /// Completion band: `|error| <= tolerance` brakes and reports reached.
    pub tolerance: Counts,
    /// Mechanical end-stop. Only the axis that sets it enforces it.
    #[serde(default)]
    pub hinge_limit: Option<Counts>,
}

impl AxisControlConfig {
    pub fn elevation() -> Self {
        Self {
            kp: ELEVATION_KP,
            ki: ELEVATION_KI,
            kd: 0.0,
            tolerance: ELEVATION_TOLERANCE,
            hinge_limit: Some(ELEVATION_HINGE_LIMIT),
        }
    }

    pub fn azimuth() -> Self {
        Self {
            kp: AZIMUTH_KP,
            ki: AZIMUTH_KI,
            kd: 0.0,
            tolerance: AZIMUTH_TOLERANCE,
            hinge_limit: None,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !self.kp.is_finite() || !self.ki.is_finite() || !self.kd.is_finite() {
            return Err("gains must be finite".to_string());
        }
        if self.tolerance < 0 {
            return Err(format!("tolerance {} must not be negative", self.tolerance));
        }
        if let Some(limit) = self.hinge_limit {
            if limit <= 0 {
                return Err(format!("hinge_limit {limit} must be positive"));
            }
        }
        Ok(())
    }
}

// ─── Target Acquisition ─────────────────────────────────────────────

/// Rule used by the lock state to decide the target is centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CenteringRule {
    /// The historical bound set, evaluated exactly as written.
    #[default]
    Literal,
    /// All four peripheral readings within `±center_tolerance` of center.
    Symmetric,
}

/// Target acquisition geometry and step sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub period_ms: u64,
    pub home_elevation: Counts,
    pub face_azimuth: Counts,
    pub hinge_limit: Counts,
    pub base_left_limit: Counts,
    pub base_right_limit: Counts,
    pub light_threshold: u16,
    pub center_tolerance: i32,
    pub scan_rise_step: Counts,
    pub scan_descent_step: Counts,
    pub scan_azimuth_step: Counts,
    pub lock_azimuth_step: Counts,
    pub lock_elevation_step: Counts,
    pub centering: CenteringRule,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            period_ms: ACQUISITION_PERIOD_MS,
            home_elevation: HOME_ELEVATION,
            face_azimuth: FACE_AZIMUTH,
            hinge_limit: SCAN_HINGE_LIMIT,
            base_left_limit: BASE_LEFT_LIMIT,
            base_right_limit: BASE_RIGHT_LIMIT,
            light_threshold: LIGHT_THRESHOLD,
            center_tolerance: CENTER_TOLERANCE,
            scan_rise_step: SCAN_RISE_STEP,
            scan_descent_step: SCAN_DESCENT_STEP,
            scan_azimuth_step: SCAN_AZIMUTH_STEP,
            lock_azimuth_step: LOCK_AZIMUTH_STEP,
            lock_elevation_step: LOCK_ELEVATION_STEP,
            centering: CenteringRule::default(),
        }
    }
}

impl AcquisitionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_right_limit >= self.base_left_limit {
            return Err(format!(
                "acquisition.base_right_limit {} must be below base_left_limit {}",
                self.base_right_limit, self.base_left_limit
            ));
        }
        if self.center_tolerance < 0 {
            return Err("acquisition.center_tolerance must not be negative".to_string());
        }
        for (name, step) in [
            ("scan_rise_step", self.scan_rise_step),
            ("scan_descent_step", self.scan_descent_step),
            ("scan_azimuth_step", self.scan_azimuth_step),
            ("lock_azimuth_step", self.lock_azimuth_step),
            ("lock_elevation_step", self.lock_elevation_step),
        ] {
            if step <= 0 {
                return Err(format!("acquisition.{name} {step} must be positive"));
            }
        }
        Ok(())
    }
}

// ─── Collaborators ──────────────────────────────────────────────────

/// ADC channel of each photosensor element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorChannels {
    pub center: u8,
    pub low_right: u8,
    pub low_left: u8,
    pub high_right: u8,
    pub high_left: u8,
}

impl Default for SensorChannels {
    fn default() -> Self {
        Self {
            center: 0,
            low_right: 1,
            low_left: 2,
            high_right: 3,
            high_left: 4,
        }
    }
}

/// Photosensor sampling task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub period_ms: u64,
    /// Extra conversions per reading (`oversample + 1` are averaged).
    pub oversample: u8,
    pub channels: SensorChannels,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            period_ms: SENSOR_PERIOD_MS,
            oversample: SENSOR_OVERSAMPLE,
            channels: SensorChannels::default(),
        }
    }
}

impl SensorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.oversample > SENSOR_OVERSAMPLE_MAX {
            return Err(format!(
                "sensor.oversample {} exceeds {}",
                self.oversample, SENSOR_OVERSAMPLE_MAX
            ));
        }
        let c = &self.channels;
        let mut channels = [c.center, c.low_right, c.low_left, c.high_right, c.high_left];
        channels.sort_unstable();
        if channels.windows(2).any(|w| w[0] == w[1]) {
            return Err("sensor.channels must be distinct".to_string());
        }
        if channels[4] > 7 {
            return Err(format!("sensor channel {} out of range [0, 7]", channels[4]));
        }
        Ok(())
    }
}

/// Motor actuation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub period_ms: u64,
    /// Duty applied while braking.
    pub brake_duty: u16,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            period_ms: MOTOR_PERIOD_MS,
            brake_duty: BRAKE_DUTY,
        }
    }
}

/// Trigger servo task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub period_ms: u64,
    pub fire_duty: u16,
    /// Cycles the trigger stays pulled.
    pub pull_cycles: u16,
    /// Length of a complete pull/release sequence [cycles].
    pub sequence_cycles: u16,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            period_ms: TRIGGER_PERIOD_MS,
            fire_duty: TRIGGER_FIRE_DUTY,
            pull_cycles: TRIGGER_PULL_CYCLES,
            sequence_cycles: TRIGGER_SEQUENCE_CYCLES,
        }
    }
}

impl TriggerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.pull_cycles >= self.sequence_cycles {
            return Err(format!(
                "trigger.pull_cycles {} must be below sequence_cycles {}",
                self.pull_cycles, self.sequence_cycles
            ));
        }
        Ok(())
    }
}

/// Logical input lines of one quadrature encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderPins {
    pub line_a: u8,
    pub line_b: u8,
}

/// Encoder wiring. Line numbers index the 8-line digital input port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub elevation: EncoderPins,
    pub azimuth: EncoderPins,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            elevation: EncoderPins { line_a: 4, line_b: 5 },
            azimuth: EncoderPins { line_a: 6, line_b: 7 },
        }
    }
}

impl EncoderConfig {
    pub fn pins(&self, axis: Axis) -> EncoderPins {
        match axis {
            Axis::Elevation => self.elevation,
            Axis::Azimuth => self.azimuth,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let lines = [
            self.elevation.line_a,
            self.elevation.line_b,
            self.azimuth.line_a,
            self.azimuth.line_b,
        ];
        if let Some(bad) = lines.iter().find(|&&l| l > 7) {
            return Err(format!("encoder line {bad} out of range [0, 7]"));
        }
        for (i, a) in lines.iter().enumerate() {
            if lines[i + 1..].contains(a) {
                return Err(format!("encoder line {a} assigned twice"));
            }
        }
        Ok(())
    }
}

/// Static task priorities and CPU placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    pub acquisition_priority: u8,
    pub control_priority: u8,
    pub motor_priority: u8,
    pub sensor_priority: u8,
    pub diagnostics_priority: u8,
    pub trigger_priority: u8,
    pub diagnostics_period_ms: u64,
    /// CPU core all task threads are pinned to (RT builds only).
    pub cpu_core: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            acquisition_priority: ACQUISITION_PRIORITY,
            control_priority: CONTROL_PRIORITY,
            motor_priority: MOTOR_PRIORITY,
            sensor_priority: SENSOR_PRIORITY,
            diagnostics_priority: DIAGNOSTICS_PRIORITY,
            trigger_priority: TRIGGER_PRIORITY,
            diagnostics_period_ms: DIAGNOSTICS_PERIOD_MS,
            cpu_core: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    #[test]
    fn defaults_validate() {
        let config = TurretConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control.elevation.hinge_limit, Some(1100));
        assert_eq!(config.control.azimuth.hinge_limit, None);
        assert_eq!(config.control.elevation.tolerance, 10);
        assert_eq!(config.control.azimuth.tolerance, 30);
    }

    #[test]
    fn empty_document_is_default() {
        let config = TurretConfig::from_toml("").unwrap();
        assert_eq!(config.control.period_ms, CONTROL_PERIOD_MS);
        assert_eq!(config.acquisition.centering, CenteringRule::Literal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let config = TurretConfig::from_toml(
            r#"
[control]
dead_zone_floor = 35

[control.azimuth]
kp = 2.0
ki = 0.0
tolerance = 5

[acquisition]
centering = "symmetric"
"#,
        )
        .unwrap();
        assert_eq!(config.control.dead_zone_floor, 35);
        assert_eq!(config.control.max_magnitude, MAX_MAGNITUDE);
        assert_eq!(config.control.azimuth.kp, 2.0);
        assert_eq!(config.control.azimuth.hinge_limit, None);
        assert_eq!(config.control.elevation.kp, ELEVATION_KP);
        assert_eq!(config.acquisition.centering, CenteringRule::Symmetric);
        assert_eq!(config.acquisition.face_azimuth, FACE_AZIMUTH);
    }

    #[test]
    fn dead_zone_above_saturation_is_rejected() {
        let mut config = TurretConfig::default();
        config.control.dead_zone_floor = 400;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("dead_zone_floor")
        ));
    }

    #[test]
    fn inverted_scan_limits_are_rejected() {
        let mut config = TurretConfig::default();
        config.acquisition.base_right_limit = 1200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut config = TurretConfig::default();
        config.trigger.period_ms = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("trigger.period_ms"));
    }

    #[test]
    fn shared_encoder_line_is_rejected() {
        let mut config = TurretConfig::default();
        config.encoders.azimuth.line_a = config.encoders.elevation.line_b;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversample_is_capped() {
        let mut config = TurretConfig::default();
        config.sensor.oversample = 11;
        assert!(config.validate().is_err());
        config.sensor.oversample = 10;
        assert!(config.validate().is_ok());
    }
}
