//! Periodic position controller of one axis.

use turret_common::control_unit::config::ControlConfig;
use turret_common::control_unit::state::{Axis, Counts, DriveMode};
use turret_shared_state::TaskCtx;

use super::output::{OutputLimits, ShapedOutput, shape_output};
use super::pi::{PiGains, PiTerms, pi_compute};
use crate::cycle::PeriodicTask;
use crate::shares::AxisShares;
use crate::telemetry::{TelemetrySink, emit_snapshot};

/// Controller state after the last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisControlState {
    pub reference_position: Counts,
    pub measured_position: Counts,
    pub previous_error: Counts,
    pub mode: DriveMode,
    pub reached: bool,
}

/// Everything one cycle computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCycle {
    pub terms: PiTerms,
    pub shaped: ShapedOutput,
    pub state: AxisControlState,
}

/// PI position controller bound to one axis' registers.
pub struct AxisController {
    axis: Axis,
    name: String,
    gains: PiGains,
    limits: OutputLimits,
    shares: AxisShares,
    telemetry: Box<dyn TelemetrySink>,
    state: AxisControlState,
}

impl AxisController {
    pub fn new(
        axis: Axis,
        config: &ControlConfig,
        shares: AxisShares,
        telemetry: Box<dyn TelemetrySink>,
    ) -> Self {
        Self {
            axis,
            name: format!("control.{axis}"),
            gains: PiGains::from(config.axis(axis)),
            limits: OutputLimits::for_axis(config, axis),
            shares,
            telemetry,
            state: AxisControlState::default(),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn state(&self) -> &AxisControlState {
        &self.state
    }

    /// Run one control cycle.
    ///
    /// Register reads and writes happen in one critical section so the
    /// reference echo cannot overwrite a newer reference.
    pub fn step(&mut self, ctx: &TaskCtx) -> AxisCycle {
        let shares = self.shares;
        let previous_error = self.state.previous_error;

        let (reference, measured, terms, shaped) = ctx.critical(|cs| {
            let reference = shares.reference.load(cs);
            let measured = shares.position.load(cs);

            let terms = pi_compute(&self.gains, reference, measured, previous_error);
            let shaped = shape_output(&self.limits, terms.error, measured, terms.output);

            shares.command.store(cs, shaped.mode);
            shares.reference.store(cs, reference);
            if shaped.reached {
                shares.reached.store(cs, true);
            }
            (reference, measured, terms, shaped)
        });

        self.state = AxisControlState {
            reference_position: reference,
            measured_position: measured,
            previous_error: terms.error,
            mode: shaped.mode,
            reached: shaped.reached,
        };

        emit_snapshot(self.telemetry.as_mut(), measured, reference, shaped.output);

        AxisCycle {
            terms,
            shaped,
            state: self.state,
        }
    }
}

impl PeriodicTask for AxisController {
    fn name(&self) -> &str {
        &self.name
    }

    fn cycle(&mut self, ctx: &TaskCtx) {
        self.step(ctx);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
