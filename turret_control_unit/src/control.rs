//! Axis position control.
//!
//! One independent [`AxisController`] per axis: a two-sample PI law
//! followed by output shaping into a motor command.

pub mod axis;
pub mod output;
pub mod pi;

pub use axis::{AxisControlState, AxisController, AxisCycle};
pub use output::{OutputLimits, ShapedOutput, ShapingRule, shape_output};
pub use pi::{PiGains, PiTerms, pi_compute};
