//! # Turret Control Unit Library
//!
//! Motion-control core of a two-axis light-seeking turret. Edge interrupts
//! feed a quadrature decoder per axis; a PI position controller per axis
//! turns reference and measured position into a motor command; a target
//! acquisition state machine faces the field, rasters it until a
//! photosensor sees light, then steers toward it and requests a shot.
//!
//! ## Tasks
//!
//! | Task               | Period | Priority |
//! |--------------------|--------|----------|
//! | acquisition        | 50 ms  | 4        |
//! | control (per axis) | 30 ms  | 3        |
//! | motor              | 100 ms | 2        |
//! | sensor             | 100 ms | 1        |
//! | diagnostics        | 100 ms | 1        |
//! | trigger            | 50 ms  | 0        |
//!
//! Tasks and interrupt handlers communicate only through the registers in
//! [`shares`]. Nothing in a control path allocates or returns an error.

pub mod acquisition;
pub mod actuation;
pub mod config;
pub mod control;
pub mod cycle;
pub mod encoder;
pub mod error;
pub mod hal;
pub mod shares;
pub mod sim;
pub mod telemetry;
pub mod unit;
