//! # Turret Shared State
//!
//! Registers shared between periodic tasks and edge interrupt handlers.
//!
//! A task read or write is a short masked access; an interrupt handler
//! accesses registers directly because nothing preempts it. Multi-register
//! consistency is available through [`TaskCtx::critical`].
//!
//! ```rust
//! use turret_shared_state::{Register, TaskCtx, dispatch_interrupt};
//!
//! let ticks: &'static Register<u32> = Register::leak("ticks", 0);
//! dispatch_interrupt(|irq| ticks.isr_put(irq, ticks.isr_get(irq) + 1));
//!
//! let ctx = TaskCtx::new();
//! assert_eq!(ticks.get(&ctx), 1);
//! ```

pub mod context;
pub mod register;

pub use context::{CriticalSection, IrqCtx, TaskCtx, dispatch_interrupt};
pub use register::Register;
