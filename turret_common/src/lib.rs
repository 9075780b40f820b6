//! Turret Common Library
//!
//! This crate provides shared constants, value types and configuration
//! loading utilities for all turret workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Control constants, limits and task periods
//! - [`config`] - Configuration loading traits and types
//! - [`control_unit`] - Control unit value types and configuration sections
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use turret_common::prelude::*;
//!
//! let config = TurretConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.control.max_magnitude, MAX_MAGNITUDE);
//! ```

pub mod config;
pub mod consts;
pub mod control_unit;
pub mod prelude;
