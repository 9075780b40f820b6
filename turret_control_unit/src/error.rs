//! Errors surfaced at the binary boundary.
//!
//! The control paths themselves never fail; everything here happens while
//! loading, starting or stopping the unit.

use thiserror::Error;

use turret_common::config::ConfigError;

use crate::cycle::CycleError;

/// Top-level control unit failure.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// Shutdown signal handler could not be installed.
    #[error("signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
