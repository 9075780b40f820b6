//! Quadrature decoder and edge interrupt table.
//!
//! Each axis encoder produces two phase-offset square waves. The 2-bit code
//! `(A << 1) | B` walks the Gray cycle `11 → 01 → 00 → 10 → 11` when the
//! shaft turns forward and the reverse cycle when it turns backward. Any
//! other transition (no change, or both lines flipping at once) is counted
//! as a decode error.

use std::sync::Arc;

use bitflags::bitflags;
use tracing::debug;

use turret_common::control_unit::state::{Axis, Counts};
use turret_shared_state::{IrqCtx, Register, TaskCtx, dispatch_interrupt};

use crate::hal::QuadratureInputs;
use crate::shares::Shares;

bitflags! {
    /// Sampled levels of both quadrature lines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct QuadratureLines: u8 {
        const LINE_A = 0b10;
        const LINE_B = 0b01;
    }
}

impl QuadratureLines {
    #[inline]
    pub fn from_levels(a: bool, b: bool) -> Self {
        let mut lines = Self::empty();
        lines.set(Self::LINE_A, a);
        lines.set(Self::LINE_B, b);
        lines
    }

    /// 2-bit code `(A << 1) | B`.
    #[inline]
    pub const fn code(self) -> u8 {
        self.bits()
    }

    /// Position of this code in the forward Gray cycle.
    #[inline]
    const fn phase(self) -> u8 {
        match self.bits() {
            0b11 => 0,
            0b01 => 1,
            0b00 => 2,
            _ => 3,
        }
    }

    /// Code one step forward along the Gray cycle.
    #[inline]
    pub fn advanced(self) -> Self {
        GRAY_CYCLE[usize::from((self.phase() + 1) % 4)]
    }

    /// Code one step backward along the Gray cycle.
    #[inline]
    pub fn retreated(self) -> Self {
        GRAY_CYCLE[usize::from((self.phase() + 3) % 4)]
    }
}

/// Forward Gray cycle.
pub const GRAY_CYCLE: [QuadratureLines; 4] = [
    QuadratureLines::from_bits_retain(0b11),
    QuadratureLines::from_bits_retain(0b01),
    QuadratureLines::from_bits_retain(0b00),
    QuadratureLines::from_bits_retain(0b10),
];

/// Classification of one code transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Forward,
    Backward,
    Invalid,
}

impl Step {
    /// Position delta applied for this step.
    #[inline]
    pub const fn delta(self) -> Counts {
        match self {
            Step::Forward => 1,
            Step::Backward => -1,
            Step::Invalid => 0,
        }
    }
}

/// Classify the transition `previous → current`.
#[inline]
pub fn classify(previous: QuadratureLines, current: QuadratureLines) -> Step {
    match (current.phase() + 4 - previous.phase()) % 4 {
        1 => Step::Forward,
        3 => Step::Backward,
        _ => Step::Invalid,
    }
}

// ─── Decoder ────────────────────────────────────────────────────────

/// Per-axis quadrature decoder.
///
/// [`on_edge`](Self::on_edge) runs in interrupt context. The task-side
/// accessors below it mask interrupts for each access.
pub struct QuadratureDecoder {
    axis: Axis,
    inputs: Box<dyn QuadratureInputs>,
    previous: Register<QuadratureLines>,
    position: &'static Register<Counts>,
    errors: &'static Register<u32>,
}

impl QuadratureDecoder {
    /// Bind a decoder to its lines and registers.
    ///
    /// The lines are sampled once here so the first edge decodes against
    /// the real resting state.
    pub fn new(
        axis: Axis,
        inputs: Box<dyn QuadratureInputs>,
        position: &'static Register<Counts>,
        errors: &'static Register<u32>,
    ) -> Self {
        let resting = inputs.sample();
        debug!(%axis, code = resting.code(), "Quadrature decoder seeded");
        Self {
            axis,
            inputs,
            previous: Register::new("quadrature.previous", resting),
            position,
            errors,
        }
    }

    /// Bind a decoder to the axis registers of `shares`.
    pub fn for_axis(axis: Axis, inputs: Box<dyn QuadratureInputs>, shares: &Shares) -> Self {
        Self::new(
            axis,
            inputs,
            shares.axis(axis).position,
            shares.encoder_errors,
        )
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Edge interrupt handler body.
    pub fn on_edge(&self, irq: &IrqCtx<'_>) -> Step {
        let current = self.inputs.sample();
        let step = classify(self.previous.isr_get(irq), current);
        match step {
            Step::Invalid => {
                let errors = self.errors.isr_get(irq);
                self.errors.isr_put(irq, errors.wrapping_add(1));
            }
            Step::Forward | Step::Backward => {
                let position = self.position.isr_get(irq);
                self.position
                    .isr_put(irq, position.wrapping_add(step.delta()));
            }
        }
        self.previous.isr_put(irq, current);
        step
    }

    // ─── Task-side access ───────────────────────────────────────────

    pub fn position(&self, ctx: &TaskCtx) -> Counts {
        self.position.get(ctx)
    }

    pub fn clear(&self, ctx: &TaskCtx) {
        self.position.put(ctx, 0);
    }

    pub fn set(&self, ctx: &TaskCtx, position: Counts) {
        self.position.put(ctx, position);
    }

    /// Decode errors of every decoder sharing this counter.
    pub fn errors(&self, ctx: &TaskCtx) -> u32 {
        self.errors.get(ctx)
    }
}

// ─── Interrupt Table ────────────────────────────────────────────────

/// Number of edge interrupt sources on the input port.
pub const EDGE_LINES: usize = 8;

/// Maps input lines to the decoder that services their edges.
///
/// Both lines of an encoder route to the same decoder instance.
#[derive(Default)]
pub struct EdgeInterrupts {
    vectors: [Option<Arc<QuadratureDecoder>>; EDGE_LINES],
}

impl EdgeInterrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `line_a` and `line_b` to `decoder`, replacing any previous
    /// binding of those lines.
    pub fn attach(&mut self, line_a: u8, line_b: u8, decoder: Arc<QuadratureDecoder>) {
        for line in [line_a, line_b] {
            if let Some(slot) = self.vectors.get_mut(usize::from(line)) {
                *slot = Some(Arc::clone(&decoder));
            }
        }
    }

    /// Decoder bound to `line`, if any.
    pub fn decoder(&self, line: u8) -> Option<&Arc<QuadratureDecoder>> {
        self.vectors.get(usize::from(line)).and_then(Option::as_ref)
    }

    /// Raise the edge interrupt of `line`. Returns the decoded step, or
    /// `None` if no handler is attached to that line.
    pub fn raise(&self, line: u8) -> Option<Step> {
        let decoder = self.decoder(line)?;
        Some(dispatch_interrupt(|irq| decoder.on_edge(irq)))
    }
}

// Raised from any thread that plays the role of the interrupt source.
static_assertions::assert_impl_all!(EdgeInterrupts: Send, Sync);
