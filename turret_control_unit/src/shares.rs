//! Registers shared by the control unit tasks and interrupt handlers.
//!
//! | Register              | Writer              | Reader(s)            |
//! |-----------------------|---------------------|----------------------|
//! | `axis.reference`      | acquisition         | axis controller      |
//! | `axis.position`       | decoder (interrupt) | controller, diag     |
//! | `axis.command`        | axis controller     | motor task           |
//! | `axis.reached`        | axis controller     | acquisition          |
//! | `encoder_errors`      | decoder (interrupt) | diagnostics          |
//! | `sensors`             | sensor sampler      | acquisition          |
//! | `fire_request`        | acquisition         | trigger task         |
//!
//! All registers are allocated once and live for the process lifetime.

use turret_common::control_unit::state::{Axis, Counts, DriveMode, SensorSnapshot};
use turret_shared_state::Register;

/// Per-axis register set.
#[derive(Debug, Clone, Copy)]
pub struct AxisShares {
    pub reference: &'static Register<Counts>,
    pub position: &'static Register<Counts>,
    pub command: &'static Register<DriveMode>,
    pub reached: &'static Register<bool>,
}

impl AxisShares {
    fn leak(axis: Axis) -> Self {
        let (reference, position, command, reached) = match axis {
            Axis::Elevation => (
                "elevation.reference",
                "elevation.position",
                "elevation.command",
                "elevation.reached",
            ),
            Axis::Azimuth => (
                "azimuth.reference",
                "azimuth.position",
                "azimuth.command",
                "azimuth.reached",
            ),
        };
        Self {
            reference: Register::leak(reference, 0),
            position: Register::leak(position, 0),
            command: Register::leak(command, DriveMode::Brake),
            reached: Register::leak(reached, false),
        }
    }
}

/// Every register of one control unit instance.
#[derive(Debug, Clone, Copy)]
pub struct Shares {
    pub elevation: AxisShares,
    pub azimuth: AxisShares,
    /// Invalid transitions seen by either decoder.
    pub encoder_errors: &'static Register<u32>,
    pub sensors: &'static Register<SensorSnapshot>,
    pub fire_request: &'static Register<bool>,
}

impl Shares {
    /// Allocate a fresh register set.
    pub fn allocate() -> Self {
        Self {
            elevation: AxisShares::leak(Axis::Elevation),
            azimuth: AxisShares::leak(Axis::Azimuth),
            encoder_errors: Register::leak("encoder_errors", 0),
            sensors: Register::leak("sensors", SensorSnapshot::default()),
            fire_request: Register::leak("fire_request", false),
        }
    }

    #[inline]
    pub fn axis(&self, axis: Axis) -> &AxisShares {
        match axis {
            Axis::Elevation => &self.elevation,
            Axis::Azimuth => &self.azimuth,
        }
    }
}

static_assertions::assert_impl_all!(Shares: Send, Sync, Copy);
