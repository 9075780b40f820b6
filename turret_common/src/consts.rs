//! System-wide constants for the turret workspace.
//!
//! Single source of truth for the control law limits, acquisition geometry
//! and task periods. The configuration defaults are built from these values.

// ─── Axis Control ───────────────────────────────────────────────────

/// Largest PWM magnitude the motor bridge accepts.
pub const MAX_MAGNITUDE: i16 = 300;

/// Smallest magnitude that actually moves a motor.
pub const DEAD_ZONE_FLOOR: i16 = 20;

/// Elevation (hinge) axis proportional gain.
pub const ELEVATION_KP: f64 = 0.5;
/// Elevation (hinge) axis integral gain.
pub const ELEVATION_KI: f64 = 0.05;
/// Elevation completion band [counts].
pub const ELEVATION_TOLERANCE: i32 = 10;
/// Hinge end-stop guarded by the elevation controller [counts].
pub const ELEVATION_HINGE_LIMIT: i32 = 1100;

/// Azimuth (base) axis proportional gain.
pub const AZIMUTH_KP: f64 = 1.0;
/// Azimuth (base) axis integral gain.
pub const AZIMUTH_KI: f64 = 0.01;
/// Azimuth completion band [counts].
pub const AZIMUTH_TOLERANCE: i32 = 30;

// ─── Target Acquisition ─────────────────────────────────────────────

/// Elevation reference while turning to face the field.
pub const HOME_ELEVATION: i32 = 0;
/// Azimuth reference while turning to face the field.
pub const FACE_AZIMUTH: i32 = 700;
/// Elevation at which the raster scan starts sweeping down.
pub const SCAN_HINGE_LIMIT: i32 = 500;
/// Azimuth travel limit in the forward scan direction.
pub const BASE_LEFT_LIMIT: i32 = 1000;
/// Azimuth travel limit in the reverse scan direction.
pub const BASE_RIGHT_LIMIT: i32 = 600;
/// Photosensor reading that counts as a detected light source.
pub const LIGHT_THRESHOLD: u16 = 10;
/// Centering band used by the lock test.
pub const CENTER_TOLERANCE: i32 = 50;

/// Elevation added per raster row.
pub const SCAN_RISE_STEP: i32 = 50;
/// Elevation removed per cycle once above the scan hinge limit.
pub const SCAN_DESCENT_STEP: i32 = 10;
/// Azimuth moved per raster column.
pub const SCAN_AZIMUTH_STEP: i32 = 100;
/// Azimuth correction per lock cycle.
pub const LOCK_AZIMUTH_STEP: i32 = 50;
/// Elevation correction per lock cycle.
pub const LOCK_ELEVATION_STEP: i32 = 10;

// ─── Collaborators ──────────────────────────────────────────────────

/// Conversions per oversampled read are `samples + 1`.
pub const SENSOR_OVERSAMPLE: u8 = 4;
/// Upper bound on the oversampling request.
pub const SENSOR_OVERSAMPLE_MAX: u8 = 10;

/// PWM duty used to hold a motor in brake.
pub const BRAKE_DUTY: u16 = 255;

/// Servo duty that pulls the trigger.
pub const TRIGGER_FIRE_DUTY: u16 = 1799;
/// Trigger cycles the servo stays pulled.
pub const TRIGGER_PULL_CYCLES: u16 = 50;
/// Length of one complete trigger pull/release sequence [cycles].
pub const TRIGGER_SEQUENCE_CYCLES: u16 = 100;

// ─── Task Periods [ms] ──────────────────────────────────────────────

pub const CONTROL_PERIOD_MS: u64 = 30;
pub const ACQUISITION_PERIOD_MS: u64 = 50;
pub const SENSOR_PERIOD_MS: u64 = 100;
pub const MOTOR_PERIOD_MS: u64 = 100;
pub const TRIGGER_PERIOD_MS: u64 = 50;
pub const DIAGNOSTICS_PERIOD_MS: u64 = 100;

/// Longest task period the scheduler accepts [ms].
pub const PERIOD_MS_MAX: u64 = 10_000;

// ─── Task Priorities ────────────────────────────────────────────────

pub const ACQUISITION_PRIORITY: u8 = 4;
pub const CONTROL_PRIORITY: u8 = 3;
pub const MOTOR_PRIORITY: u8 = 2;
pub const SENSOR_PRIORITY: u8 = 1;
pub const DIAGNOSTICS_PRIORITY: u8 = 1;
pub const TRIGGER_PRIORITY: u8 = 0;

/// Base SCHED_FIFO priority; task priorities are added on top.
pub const RT_PRIORITY_BASE: i32 = 70;
