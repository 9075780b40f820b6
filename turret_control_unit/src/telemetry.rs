//! Text telemetry emitted by the axis controllers.
//!
//! Each controller cycle emits three newline-terminated lines:
//!
//! ```text
//! A: <measured position>
//! R: <reference position>
//! S: <computed output>
//! ```
//!
//! Lines are formatted into fixed-capacity strings so a control cycle does
//! not allocate for telemetry.

use std::fmt::Write as _;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use turret_common::control_unit::state::Counts;

/// Capacity of one telemetry line.
pub const LINE_CAPACITY: usize = 48;

pub type TelemetryLine = heapless::String<LINE_CAPACITY>;

/// Destination for telemetry lines. Lines carry no trailing newline.
pub trait TelemetrySink: Send {
    fn line(&mut self, line: &str);
}

/// Format and emit one controller snapshot.
pub fn emit_snapshot(
    sink: &mut dyn TelemetrySink,
    measured: Counts,
    reference: Counts,
    output: f64,
) {
    let mut line = TelemetryLine::new();
    // Counts always fit. An output too wide for the line goes out in exponent form.
    let _ = write!(line, "A: {measured}");
    sink.line(&line);
    line.clear();
    let _ = write!(line, "R: {reference}");
    sink.line(&line);
    line.clear();
    if write!(line, "S: {output}").is_err() {
        line.clear();
        let _ = write!(line, "S: {output:e}");
    }
    sink.line(&line);
}

// ─── Sinks ──────────────────────────────────────────────────────────

/// Writes lines to any byte stream.
pub struct WriterSink<W> {
    writer: W,
    failed: bool,
}

impl<W: io::Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: io::Write + Send> TelemetrySink for WriterSink<W> {
    fn line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.writer, "{line}") {
            // Report once, then keep the control loop running silently.
            if !self.failed {
                warn!("Telemetry write failed: {e}");
                self.failed = true;
            }
        }
    }
}

/// Forwards lines to `tracing` under the `telemetry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn line(&mut self, line: &str) {
        info!(target: "telemetry", "{line}");
    }
}

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn line(&mut self, _line: &str) {}
}

/// Collects lines in memory. Clones share one buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line collected so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl TelemetrySink for MemorySink {
    fn line(&mut self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Sink selection for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryTarget {
    #[default]
    Stdout,
    Log,
    Off,
}

impl TelemetryTarget {
    /// Build a fresh sink for one controller.
    pub fn sink(self) -> Box<dyn TelemetrySink> {
        match self {
            TelemetryTarget::Stdout => Box::new(WriterSink::stdout()),
            TelemetryTarget::Log => Box::new(TracingSink),
            TelemetryTarget::Off => Box::new(NullSink),
        }
    }
}

impl std::str::FromStr for TelemetryTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(Self::Stdout),
            "log" => Ok(Self::Log),
            "off" => Ok(Self::Off),
            other => Err(format!(
                "unknown telemetry target '{other}' (expected stdout, log or off)"
            )),
        }
    }
}
