//! Two-sample PI law.
//!
//! The integral term is `(previous_error + error) * Ki`, not an accumulator:
//! it only remembers the last cycle. A derivative gain is carried for
//! configuration compatibility but the derivative term is always zero.

use turret_common::control_unit::config::AxisControlConfig;
use turret_common::control_unit::state::Counts;

/// PI gains of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiGains {
    /// Proportional gain.
    pub kp: f64,
    /// Two-sample integral gain.
    pub ki: f64,
    /// Derivative gain slot (not applied).
    pub kd: f64,
}

impl From<&AxisControlConfig> for PiGains {
    fn from(cfg: &AxisControlConfig) -> Self {
        Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
        }
    }
}

/// Terms computed in one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PiTerms {
    /// `reference - measured`.
    pub error: Counts,
    pub proportional: f64,
    pub integral: f64,
    /// Always 0.0.
    pub derivative: f64,
    /// `proportional + integral`, before output shaping.
    pub output: f64,
}

/// Compute one PI cycle.
#[inline]
pub fn pi_compute(
    gains: &PiGains,
    reference: Counts,
    measured: Counts,
    previous_error: Counts,
) -> PiTerms {
    let error = reference.wrapping_sub(measured);

    let proportional = f64::from(error) * gains.kp;
    let integral = (f64::from(previous_error) + f64::from(error)) * gains.ki;

    PiTerms {
        error,
        proportional,
        integral,
        derivative: 0.0,
        output: proportional + integral,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
