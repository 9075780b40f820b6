//! Periodic task scheduling.
//!
//! Every task runs on its own thread and is paced from its previous
//! deadline, never from the end of its last cycle, so jitter does not
//! accumulate.
//!
//! ## RT Setup
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` once per process.
//! 2. Per task thread: prefault stack, `sched_setaffinity`,
//!    `sched_setscheduler(SCHED_FIFO, base + priority)`.
//!
//! ## Pacing
//! With the `rt` feature, `clock_nanosleep(CLOCK_MONOTONIC, TIMER_ABSTIME)`.
//! Without it, `Instant` deadlines and `std::thread::sleep`.
//!
//! An overrun is counted and logged. The task keeps running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use turret_common::consts::RT_PRIORITY_BASE;
use turret_shared_state::TaskCtx;

// ─── Periodic Task ──────────────────────────────────────────────────

/// A unit of work run once per period.
pub trait PeriodicTask: Send {
    fn name(&self) -> &str;

    /// Called once on the task thread before the first cycle.
    fn start(&mut self, _ctx: &TaskCtx) {}

    fn cycle(&mut self, ctx: &TaskCtx);
}

impl<T: PeriodicTask + ?Sized> PeriodicTask for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self, ctx: &TaskCtx) {
        (**self).start(ctx)
    }

    fn cycle(&mut self, ctx: &TaskCtx) {
        (**self).cycle(ctx)
    }
}

/// Scheduling parameters of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub period: Duration,
    /// Static priority, higher runs first.
    pub priority: u8,
    pub cpu_core: usize,
}

impl TaskSpec {
    pub fn new(period_ms: u64, priority: u8, cpu_core: usize) -> Self {
        Self {
            period: Duration::from_millis(period_ms),
            priority,
            cpu_core,
        }
    }

    /// SCHED_FIFO priority for this task.
    pub fn rt_priority(&self) -> i32 {
        RT_PRIORITY_BASE + i32::from(self.priority)
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Cycles that ended after their deadline.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (actual wake minus deadline).
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or task execution.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// Monotonic clock could not be read.
    #[error("clock error: {0}")]
    Clock(String),

    /// Task thread could not be created.
    #[error("failed to spawn task {task}: {source}")]
    Spawn {
        task: String,
        #[source]
        source: std::io::Error,
    },

    /// Task thread panicked.
    #[error("task {0} panicked")]
    Panicked(String),
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Bytes of stack touched before a task's first cycle.
const STACK_PREFAULT_BYTES: usize = 256 * 1024;

/// Stack size of every task thread.
pub const TASK_STACK_BYTES: usize = 1024 * 1024;

/// Lock all current and future memory pages.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
pub fn rt_lock_memory() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
pub fn rt_lock_memory() -> Result<(), CycleError> {
    Ok(())
}

/// Touch stack pages so the periodic loop does not fault on them.
fn prefault_stack() {
    let mut buf = [0u8; STACK_PREFAULT_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Set SCHED_FIFO with the given RT priority on the calling thread.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` is a valid sched_param; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Per-thread RT setup. All RT calls are no-ops without the `rt` feature.
pub fn rt_thread_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Pacing ─────────────────────────────────────────────────────────

/// Absolute deadline sequence `start + k * period`.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    deadline: Instant,
    period: Duration,
}

impl Pacer {
    pub fn new(first_deadline: Instant, period: Duration) -> Self {
        Self {
            deadline: first_deadline,
            period,
        }
    }

    #[inline]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Move to the next deadline and return it.
    #[inline]
    pub fn advance(&mut self) -> Instant {
        self.deadline += self.period;
        self.deadline
    }

    /// Sleep until the current deadline. Returns immediately if it passed.
    pub fn wait(&self) {
        let now = Instant::now();
        if let Some(remaining) = self.deadline.checked_duration_since(now) {
            thread::sleep(remaining);
        }
    }
}

fn as_ns(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

fn note_overrun(task: &str, stats: &mut CycleStats, duration_ns: i64, budget_ns: i64) {
    stats.overruns += 1;
    warn!(
        task,
        duration_ns,
        budget_ns,
        overruns = stats.overruns,
        "Task cycle overrun"
    );
}

/// Run `task` on the calling thread until `shutdown` is set.
pub fn run_periodic(
    task: &mut dyn PeriodicTask,
    spec: &TaskSpec,
    shutdown: &AtomicBool,
) -> Result<CycleStats, CycleError> {
    rt_thread_setup(spec.cpu_core, spec.rt_priority())?;

    let ctx = TaskCtx::new();
    task.start(&ctx);
    info!(
        task = task.name(),
        period_ms = spec.period.as_millis() as u64,
        priority = spec.priority,
        "Task started"
    );

    #[cfg(feature = "rt")]
    let stats = run_rt_loop(task, spec, shutdown, &ctx)?;

    #[cfg(not(feature = "rt"))]
    let stats = run_sim_loop(task, spec, shutdown, &ctx);

    info!(
        task = task.name(),
        cycles = stats.cycle_count,
        overruns = stats.overruns,
        avg_ns = stats.avg_cycle_ns(),
        max_ns = stats.max_cycle_ns,
        "Task stopped"
    );
    Ok(stats)
}

#[cfg(not(feature = "rt"))]
fn run_sim_loop(
    task: &mut dyn PeriodicTask,
    spec: &TaskSpec,
    shutdown: &AtomicBool,
    ctx: &TaskCtx,
) -> CycleStats {
    let mut stats = CycleStats::new();
    let budget_ns = as_ns(spec.period);
    // The first cycle runs immediately.
    let mut pacer = Pacer::new(Instant::now(), spec.period);

    while !shutdown.load(Ordering::Acquire) {
        let cycle_start = Instant::now();
        let latency_ns = as_ns(cycle_start.saturating_duration_since(pacer.deadline()));

        task.cycle(ctx);

        let duration_ns = as_ns(cycle_start.elapsed());
        stats.record(duration_ns, latency_ns);
        if duration_ns > budget_ns {
            note_overrun(task.name(), &mut stats, duration_ns, budget_ns);
        }

        pacer.advance();
        pacer.wait();
    }
    stats
}

#[cfg(feature = "rt")]
fn run_rt_loop(
    task: &mut dyn PeriodicTask,
    spec: &TaskSpec,
    shutdown: &AtomicBool,
    ctx: &TaskCtx,
) -> Result<CycleStats, CycleError> {
    use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

    let clock = ClockId::CLOCK_MONOTONIC;
    let budget_ns = as_ns(spec.period);
    let mut stats = CycleStats::new();
    let mut next_wake = clock_gettime(clock).map_err(|e| CycleError::Clock(e.to_string()))?;

    while !shutdown.load(Ordering::Acquire) {
        let cycle_start = clock_gettime(clock).map_err(|e| CycleError::Clock(e.to_string()))?;
        let latency_ns = timespec_diff_ns(&cycle_start, &next_wake).max(0);

        task.cycle(ctx);

        let cycle_end = clock_gettime(clock).map_err(|e| CycleError::Clock(e.to_string()))?;
        let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
        stats.record(duration_ns, latency_ns);
        if duration_ns > budget_ns {
            note_overrun(task.name(), &mut stats, duration_ns, budget_ns);
        }

        next_wake = timespec_add_ns(next_wake, budget_ns);
        // EINTR only shortens one sleep; the next deadline is unaffected.
        let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
    }
    Ok(stats)
}

/// Spawn `task` on a dedicated named thread.
pub fn spawn_periodic(
    mut task: Box<dyn PeriodicTask>,
    spec: TaskSpec,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<CycleStats, CycleError>>, CycleError> {
    let name = task.name().to_string();
    thread::Builder::new()
        .name(name.clone())
        .stack_size(TASK_STACK_BYTES)
        .spawn(move || run_periodic(task.as_mut(), &spec, &shutdown))
        .map_err(|source| CycleError::Spawn { task: name, source })
}

// ─── Time Helpers ───────────────────────────────────────────────────

/// Add nanoseconds to a TimeSpec.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Compute the difference (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn cycle_stats_basic() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.cycle_count, 0);
        assert_eq!(stats.avg_cycle_ns(), 0);

        stats.record(500_000, 1_000);
        assert_eq!(stats.cycle_count, 1);
        assert_eq!(stats.min_cycle_ns, 500_000);
        assert_eq!(stats.max_cycle_ns, 500_000);
        assert_eq!(stats.max_latency_ns, 1_000);

        stats.record(600_000, 500);
        assert_eq!(stats.min_cycle_ns, 500_000);
        assert_eq!(stats.max_cycle_ns, 600_000);
        assert_eq!(stats.max_latency_ns, 1_000);
        assert_eq!(stats.avg_cycle_ns(), 550_000);
    }

    #[test]
    fn pacer_deadlines_ignore_cycle_duration() {
        let start = Instant::now();
        let period = Duration::from_millis(30);
        let mut pacer = Pacer::new(start, period);
        assert_eq!(pacer.deadline(), start);

        // A slow cycle does not shift the schedule.
        thread::sleep(Duration::from_millis(40));
        assert_eq!(pacer.advance(), start + period);
        assert_eq!(pacer.advance(), start + 2 * period);
    }

    #[test]
    fn pacer_wait_returns_at_past_deadline() {
        let mut pacer = Pacer::new(Instant::now(), Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        pacer.advance();
        let before = Instant::now();
        pacer.wait();
        assert!(before.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn rt_priority_is_offset_from_base() {
        let spec = TaskSpec::new(50, 4, 1);
        assert_eq!(spec.rt_priority(), RT_PRIORITY_BASE + 4);
        assert_eq!(spec.period, Duration::from_millis(50));
    }

    #[test]
    fn rt_setup_without_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        {
            assert!(rt_lock_memory().is_ok());
            assert!(rt_thread_setup(0, 80).is_ok());
        }
    }

    struct Counter {
        starts: Arc<Mutex<u32>>,
        cycles: Arc<Mutex<u32>>,
        stop_after: u32,
        shutdown: Arc<AtomicBool>,
    }

    impl PeriodicTask for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn start(&mut self, _ctx: &TaskCtx) {
            *self.starts.lock() += 1;
        }

        fn cycle(&mut self, _ctx: &TaskCtx) {
            let mut cycles = self.cycles.lock();
            *cycles += 1;
            if *cycles >= self.stop_after {
                self.shutdown.store(true, Ordering::Release);
            }
        }
    }

    #[test]
    fn spawned_task_runs_until_shutdown() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let starts = Arc::new(Mutex::new(0));
        let cycles = Arc::new(Mutex::new(0));
        let task = Counter {
            starts: Arc::clone(&starts),
            cycles: Arc::clone(&cycles),
            stop_after: 5,
            shutdown: Arc::clone(&shutdown),
        };

        let handle = spawn_periodic(Box::new(task), TaskSpec::new(2, 0, 0), shutdown).unwrap();
        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.cycle_count, 5);
        assert_eq!(*starts.lock(), 1);
        assert_eq!(*cycles.lock(), 5);
    }

    #[test]
    fn cycle_error_display() {
        let err = CycleError::RtSetup("mlockall failed: EPERM".into());
        assert!(err.to_string().contains("mlockall"));
        assert_eq!(CycleError::Panicked("sensor".into()).to_string(), "task sensor panicked");
    }
}
