//! Output shaping: completion band, hinge guard, saturation and dead zone.
//!
//! Rules are evaluated in order and the first match decides the command:
//!
//! 1. `|error| <= tolerance` or `output == 0` → brake, target reached
//! 2. hinge axis, `output > 1`, `measured >= hinge_limit` → brake
//! 3. hinge axis, `output < -1`, `measured <= 0` → brake
//! 4. `|output| > max_magnitude` → saturate
//! 5. `0 < |output| < dead_zone_floor` → raise to the floor, sign kept
//! 6. otherwise drive with `output`, truncated toward zero

use turret_common::control_unit::config::ControlConfig;
use turret_common::control_unit::state::{Axis, Counts, DriveMode};

/// Limits applied to one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    pub max_magnitude: i16,
    pub dead_zone_floor: i16,
    pub tolerance: Counts,
    /// Only the hinge axis sets this.
    pub hinge_limit: Option<Counts>,
}

impl OutputLimits {
    pub fn for_axis(config: &ControlConfig, axis: Axis) -> Self {
        let axis_cfg = config.axis(axis);
        Self {
            max_magnitude: config.max_magnitude,
            dead_zone_floor: config.dead_zone_floor,
            tolerance: axis_cfg.tolerance,
            hinge_limit: axis_cfg.hinge_limit,
        }
    }
}

/// Which shaping rule produced the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapingRule {
    OnTarget,
    HingeUpper,
    HingeLower,
    Saturated,
    DeadZone,
    Linear,
}

/// Result of shaping one controller output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedOutput {
    pub mode: DriveMode,
    /// True only for [`ShapingRule::OnTarget`].
    pub reached: bool,
    /// Output after saturation and dead zone.
    pub output: f64,
    pub rule: ShapingRule,
}

impl ShapedOutput {
    const fn brake(output: f64, reached: bool, rule: ShapingRule) -> Self {
        Self {
            mode: DriveMode::Brake,
            reached,
            output,
            rule,
        }
    }
}

/// Apply the output rules to a raw PI output.
pub fn shape_output(
    limits: &OutputLimits,
    error: Counts,
    measured: Counts,
    output: f64,
) -> ShapedOutput {
    if error.unsigned_abs() <= limits.tolerance.unsigned_abs() || output == 0.0 {
        return ShapedOutput::brake(output, true, ShapingRule::OnTarget);
    }

    if let Some(hinge_limit) = limits.hinge_limit {
        if output > 1.0 && measured >= hinge_limit {
            return ShapedOutput::brake(output, false, ShapingRule::HingeUpper);
        }
        if output < -1.0 && measured <= 0 {
            return ShapedOutput::brake(output, false, ShapingRule::HingeLower);
        }
    }

    let max = f64::from(limits.max_magnitude);
    let floor = f64::from(limits.dead_zone_floor);

    let (shaped, rule) = if output.abs() > max {
        (max.copysign(output), ShapingRule::Saturated)
    } else if output.abs() < floor {
        (floor.copysign(output), ShapingRule::DeadZone)
    } else {
        (output, ShapingRule::Linear)
    };

    ShapedOutput {
        // |shaped| <= max_magnitude, so the cast truncates toward zero
        // without leaving the i16 range.
        mode: DriveMode::Power(shaped as i16),
        reached: false,
        output: shaped,
        rule,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
