//! Cross-context value register.

use std::cell::UnsafeCell;
use std::fmt;

use tracing::debug;

use crate::context::{CriticalSection, IrqCtx, TaskCtx};

/// A single value shared between task and interrupt contexts.
///
/// Every access needs a context token:
///
/// | Caller              | Read            | Write           |
/// |---------------------|-----------------|-----------------|
/// | task                | [`get`]         | [`put`]         |
/// | interrupt handler   | [`isr_get`]     | [`isr_put`]     |
/// | inside `critical()` | [`load`]        | [`store`]       |
///
/// Values are copied in and out; no reference to the inner value escapes.
///
/// [`get`]: Register::get
/// [`put`]: Register::put
/// [`isr_get`]: Register::isr_get
/// [`isr_put`]: Register::isr_put
/// [`load`]: Register::load
/// [`store`]: Register::store
pub struct Register<T: Copy> {
    name: &'static str,
    cell: UnsafeCell<T>,
}

// SAFETY: The cell is only touched through `load`/`store`, which require a
// `CriticalSection`. A `CriticalSection` proves the current thread holds the
// process-wide interrupt gate and cannot be shared with or sent to another
// thread, so accesses from different threads never overlap.
unsafe impl<T: Copy + Send> Sync for Register<T> {}

impl<T: Copy> Register<T> {
    pub const fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            cell: UnsafeCell::new(initial),
        }
    }

    /// Allocate a register that lives for the rest of the process.
    pub fn leak(name: &'static str, initial: T) -> &'static Self
    where
        T: fmt::Debug,
    {
        debug!(register = name, ?initial, "Allocating shared register");
        Box::leak(Box::new(Self::new(name, initial)))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // ─── Critical Section Access ────────────────────────────────────

    #[inline]
    pub fn load(&self, _cs: &CriticalSection<'_>) -> T {
        // SAFETY: See the `Sync` impl. The gate is held by this thread.
        unsafe { *self.cell.get() }
    }

    #[inline]
    pub fn store(&self, _cs: &CriticalSection<'_>, value: T) {
        // SAFETY: See the `Sync` impl. The gate is held by this thread.
        unsafe { *self.cell.get() = value }
    }

    // ─── Task Access ────────────────────────────────────────────────

    /// Read with interrupts masked for the duration of the copy.
    #[inline]
    pub fn get(&self, ctx: &TaskCtx) -> T {
        ctx.critical(|cs| self.load(cs))
    }

    /// Write with interrupts masked for the duration of the copy.
    #[inline]
    pub fn put(&self, ctx: &TaskCtx, value: T) {
        ctx.critical(|cs| self.store(cs, value))
    }

    /// Read-modify-write as one masked access. Returns the new value.
    #[inline]
    pub fn update(&self, ctx: &TaskCtx, f: impl FnOnce(T) -> T) -> T {
        ctx.critical(|cs| {
            let next = f(self.load(cs));
            self.store(cs, next);
            next
        })
    }

    // ─── Interrupt Access ───────────────────────────────────────────

    #[inline]
    pub fn isr_get(&self, irq: &IrqCtx<'_>) -> T {
        self.load(irq.cs())
    }

    #[inline]
    pub fn isr_put(&self, irq: &IrqCtx<'_>, value: T) {
        self.store(irq.cs(), value)
    }
}

impl<T: Copy + Default> Default for Register<T> {
    fn default() -> Self {
        Self::new("unnamed", T::default())
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Register<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = TaskCtx::new().critical(|cs| self.load(cs));
        f.debug_struct("Register")
            .field("name", &self.name)
            .field("value", &value)
            .finish()
    }
}

static_assertions::assert_impl_all!(Register<i32>: Sync, Send);
static_assertions::assert_impl_all!(Register<bool>: Sync, Send);
