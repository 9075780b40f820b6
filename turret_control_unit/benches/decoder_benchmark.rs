//! Quadrature decoder micro-benchmark.
//!
//! Measures one edge interrupt end to end: raising the line through the
//! interrupt table, sampling both lines, classifying the transition and
//! updating the shared position.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use criterion::{Criterion, criterion_group, criterion_main};

use turret_common::control_unit::state::Axis;
use turret_control_unit::encoder::{
    EdgeInterrupts, GRAY_CYCLE, QuadratureDecoder, QuadratureLines, classify,
};
use turret_control_unit::hal::QuadratureInputs;
use turret_control_unit::shares::Shares;

struct Wires(Arc<AtomicU8>);

impl QuadratureInputs for Wires {
    fn sample(&self) -> QuadratureLines {
        QuadratureLines::from_bits_truncate(self.0.load(Ordering::Relaxed))
    }
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_transition", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % 4;
            classify(
                std::hint::black_box(GRAY_CYCLE[i]),
                std::hint::black_box(GRAY_CYCLE[(i + 1) % 4]),
            )
        });
    });
}

fn bench_edge_interrupt(c: &mut Criterion) {
    let shares = Shares::allocate();
    let wires = Arc::new(AtomicU8::new(GRAY_CYCLE[0].code()));
    let decoder = Arc::new(QuadratureDecoder::for_axis(
        Axis::Elevation,
        Box::new(Wires(Arc::clone(&wires))),
        &shares,
    ));
    let mut interrupts = EdgeInterrupts::new();
    interrupts.attach(4, 5, decoder);

    c.bench_function("edge_interrupt_forward", |b| {
        let mut lines = GRAY_CYCLE[0];
        b.iter(|| {
            lines = lines.advanced();
            wires.store(lines.code(), Ordering::Relaxed);
            interrupts.raise(std::hint::black_box(4))
        });
    });
}

criterion_group!(benches, bench_classify, bench_edge_interrupt);
criterion_main!(benches);
