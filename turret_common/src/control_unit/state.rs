//! Value types exchanged between the decoder, controllers, acquisition and
//! actuation tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoder counts. Positions, references and errors share this unit.
pub type Counts = i32;

/// Turret degree of freedom.
///
/// `Elevation` is the first axis (gun hinge), `Azimuth` the second (base).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Elevation,
    Azimuth,
}

impl Axis {
    /// Both axes in index order.
    pub const ALL: [Axis; 2] = [Axis::Elevation, Axis::Azimuth];

    /// Dense index for per-axis arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::Elevation => 0,
            Axis::Azimuth => 1,
        }
    }

    /// Short lowercase name used in task names and log fields.
    pub const fn name(self) -> &'static str {
        match self {
            Axis::Elevation => "elevation",
            Axis::Azimuth => "azimuth",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Motor command published by an axis controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveMode {
    /// Short both bridge outputs.
    #[default]
    Brake,
    /// Release the bridge, motor coasts.
    Freewheel,
    /// Drive with signed PWM magnitude; the sign selects direction.
    Power(i16),
}

impl DriveMode {
    /// Signed magnitude carried by the command (zero unless `Power`).
    #[inline]
    pub const fn magnitude(self) -> i16 {
        match self {
            DriveMode::Power(m) => m,
            DriveMode::Brake | DriveMode::Freewheel => 0,
        }
    }

    #[inline]
    pub const fn is_brake(self) -> bool {
        matches!(self, DriveMode::Brake)
    }
}

/// One scan of the five-element photosensor array.
///
/// Layout as seen from behind the turret:
///
/// ```text
///   high_left        high_right
///             center
///   low_left         low_right
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub high_left: u16,
    pub high_right: u16,
    pub center: u16,
    pub low_left: u16,
    pub low_right: u16,
}

impl SensorSnapshot {
    /// All readings in the order high_left, high_right, center, low_left, low_right.
    #[inline]
    pub const fn readings(&self) -> [u16; 5] {
        [
            self.high_left,
            self.high_right,
            self.center,
            self.low_left,
            self.low_right,
        ]
    }

    /// True if any element sees at least `threshold`.
    #[inline]
    pub fn any_at_or_above(&self, threshold: u16) -> bool {
        self.readings().iter().any(|&r| r >= threshold)
    }

    /// Brightest element reading.
    #[inline]
    pub fn peak(&self) -> u16 {
        self.readings().into_iter().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_indices_are_dense() {
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
        }
        assert_eq!(Axis::Azimuth.to_string(), "azimuth");
    }

    #[test]
    fn only_power_carries_magnitude() {
        assert_eq!(DriveMode::Power(-120).magnitude(), -120);
        assert_eq!(DriveMode::Brake.magnitude(), 0);
        assert_eq!(DriveMode::Freewheel.magnitude(), 0);
        assert!(DriveMode::default().is_brake());
    }

    #[test]
    fn threshold_counts_equal_reading_as_detection() {
        let snap = SensorSnapshot {
            low_right: 10,
            ..Default::default()
        };
        assert!(snap.any_at_or_above(10));
        assert!(!snap.any_at_or_above(11));
        assert_eq!(snap.peak(), 10);
    }
}
