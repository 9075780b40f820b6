//! Property tests: quadrature decoding over arbitrary line sequences.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use proptest::prelude::*;

use turret_common::control_unit::state::{Axis, Counts};
use turret_control_unit::encoder::{GRAY_CYCLE, QuadratureDecoder, QuadratureLines, Step};
use turret_control_unit::hal::QuadratureInputs;
use turret_shared_state::{Register, TaskCtx, dispatch_interrupt};

struct Wires(Arc<AtomicU8>);

impl QuadratureInputs for Wires {
    fn sample(&self) -> QuadratureLines {
        QuadratureLines::from_bits_truncate(self.0.load(Ordering::SeqCst))
    }
}

struct Probe {
    wires: Arc<AtomicU8>,
    decoder: QuadratureDecoder,
    position: &'static Register<Counts>,
    errors: &'static Register<u32>,
}

fn probe(resting: u8) -> Probe {
    let wires = Arc::new(AtomicU8::new(resting));
    let position = Register::leak("prop.position", 0);
    let errors = Register::leak("prop.errors", 0);
    let decoder = QuadratureDecoder::new(
        Axis::Elevation,
        Box::new(Wires(Arc::clone(&wires))),
        position,
        errors,
    );
    Probe {
        wires,
        decoder,
        position,
        errors,
    }
}

impl Probe {
    fn edge(&self, code: u8) -> Step {
        self.wires.store(code, Ordering::SeqCst);
        dispatch_interrupt(|irq| self.decoder.on_edge(irq))
    }
}

proptest! {
    #[test]
    fn each_edge_moves_at_most_one_count(
        resting in 0u8..4,
        codes in prop::collection::vec(0u8..4, 0..200),
    ) {
        let p = probe(resting);
        let ctx = TaskCtx::new();
        let mut steps = 0u32;
        let mut last = 0;
        for &code in &codes {
            let step = p.edge(code);
            let now = p.position.get(&ctx);
            prop_assert!((now - last).abs() <= 1);
            prop_assert_eq!(now - last, step.delta());
            if step != Step::Invalid {
                steps += 1;
            }
            last = now;
        }
        prop_assert_eq!(steps + p.errors.get(&ctx), codes.len() as u32);
    }

    #[test]
    fn gray_walk_position_is_net_step_count(moves in prop::collection::vec(any::<bool>(), 0..200)) {
        let p = probe(GRAY_CYCLE[0].code());
        let ctx = TaskCtx::new();
        let mut lines = GRAY_CYCLE[0];
        let mut net: Counts = 0;
        for &forward in &moves {
            lines = if forward { lines.advanced() } else { lines.retreated() };
            net += if forward { 1 } else { -1 };
            p.edge(lines.code());
        }
        prop_assert_eq!(p.position.get(&ctx), net);
        prop_assert_eq!(p.errors.get(&ctx), 0);
    }
}
