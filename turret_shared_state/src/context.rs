//! Execution context tokens.
//!
//! Two contexts touch shared state: periodic tasks and edge interrupt
//! handlers. An interrupt handler runs to completion and is never preempted
//! by a task, so it may read and write registers directly. A task may be
//! preempted at any instruction by an interrupt, so every task access
//! masks interrupts for its duration.
//!
//! On the host both guarantees come from one process-wide gate:
//!
//! - [`dispatch_interrupt`] holds the gate for the whole handler and hands
//!   it an [`IrqCtx`],
//! - [`TaskCtx`] takes the gate around each individual access,
//! - [`TaskCtx::critical`] holds the gate across a group of accesses and
//!   hands out a [`CriticalSection`].
//!
//! The gate is reentrant, so a handler that reaches task code on the same
//! thread does not deadlock.

use std::marker::PhantomData;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Global interrupt mask. Holding it means no handler is running.
static INTERRUPT_GATE: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Marker that makes a token neither `Send` nor `Sync`.
type NotThreadSafe = PhantomData<*const ()>;

/// Witness that the interrupt gate is held by the current thread.
///
/// Only created by [`dispatch_interrupt`] and [`TaskCtx::critical`], and only
/// lent out by reference for the duration of that call.
pub struct CriticalSection<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
    _not_send: NotThreadSafe,
}

impl CriticalSection<'_> {
    #[inline]
    fn enter() -> CriticalSection<'static> {
        CriticalSection {
            _guard: INTERRUPT_GATE.lock(),
            _not_send: PhantomData,
        }
    }
}

/// Token handed to an edge interrupt handler.
///
/// Accesses made with it are not masked: the gate is already held.
pub struct IrqCtx<'cs> {
    cs: &'cs CriticalSection<'cs>,
    _not_send: NotThreadSafe,
}

impl<'cs> IrqCtx<'cs> {
    /// The critical section this handler runs under.
    #[inline]
    pub fn cs(&self) -> &'cs CriticalSection<'cs> {
        self.cs
    }
}

/// Run `handler` as an interrupt service routine.
///
/// Handlers are serialized against each other and against every masked task
/// access.
pub fn dispatch_interrupt<R>(handler: impl FnOnce(&IrqCtx<'_>) -> R) -> R {
    let cs = CriticalSection::enter();
    let irq = IrqCtx {
        cs: &cs,
        _not_send: PhantomData,
    };
    handler(&irq)
}

/// Token held by periodic task code.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCtx(());

impl TaskCtx {
    pub const fn new() -> Self {
        Self(())
    }

    /// Run `f` with interrupts masked.
    ///
    /// Use this when several registers have to be read or written as one
    /// consistent group.
    #[inline]
    pub fn critical<R>(&self, f: impl FnOnce(&CriticalSection<'_>) -> R) -> R {
        let cs = CriticalSection::enter();
        f(&cs)
    }
}

static_assertions::assert_not_impl_any!(CriticalSection<'static>: Send, Sync);
static_assertions::assert_not_impl_any!(IrqCtx<'static>: Send, Sync);
static_assertions::assert_impl_all!(TaskCtx: Send, Sync, Copy);
