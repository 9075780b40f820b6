//! Target acquisition state machine.
//!
//! ```text
//!   FaceTarget ──both reached──▶ Search ──light ≥ threshold──▶ Lock
//! ```
//!
//! `FaceTarget` turns the turret toward the field. `Search` rasters the
//! field one step per completed move until a photosensor sees light. `Lock`
//! nudges the axes toward the brightest side and requests a shot once the
//! target is centered. `Lock` is never left.

use std::fmt;

use tracing::{debug, info, warn};

use turret_common::control_unit::config::{AcquisitionConfig, CenteringRule};
use turret_common::control_unit::state::{Counts, SensorSnapshot};
use turret_shared_state::TaskCtx;

use crate::cycle::PeriodicTask;
use crate::shares::Shares;

/// Top-level acquisition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    #[default]
    FaceTarget,
    Search,
    Lock,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FaceTarget => "face_target",
            Self::Search => "search",
            Self::Lock => "lock",
        })
    }
}

/// Azimuth sweep direction of the raster scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    /// Azimuth increasing, toward the left limit.
    #[default]
    Forward,
    /// Azimuth decreasing, toward the right limit.
    Reverse,
}

/// Steering correction chosen by the lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steer {
    Left,
    Right,
    Up,
    Down,
}

/// What one acquisition cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionAction {
    /// Waiting for both axes to report reached.
    Waiting,
    /// Facing references published.
    Facing,
    /// Light detected, switched to `Lock`.
    Detected,
    /// Above the scan hinge limit, stepped elevation down.
    Descend,
    /// Started a new raster row.
    Raster,
    /// Target centered, shot requested.
    Fire,
    Steer(Steer),
    /// No steering rule matched.
    Unresolved,
}

/// Lock-state centering test.
///
/// `Literal` evaluates the historical conjunction exactly as written. It
/// requires both `center > low_left - tol` and `center < low_left - tol`,
/// so it never holds.
pub fn is_centered(rule: CenteringRule, snap: &SensorSnapshot, tol: i32) -> bool {
    let c = i32::from(snap.center);
    let hl = i32::from(snap.high_left);
    let hr = i32::from(snap.high_right);
    let ll = i32::from(snap.low_left);
    let lr = i32::from(snap.low_right);

    match rule {
        CenteringRule::Literal => {
            c > lr - tol
                && c > hr - tol
                && c > ll - tol
                && c > lr - tol
                && c < lr + tol
                && c < hr + tol
                && c < ll - tol
                && c < lr + tol
        }
        CenteringRule::Symmetric => [hl, hr, ll, lr]
            .iter()
            .all(|&r| c > r - tol && c < r + tol),
    }
}

/// Steering correction for an off-center target, first match wins.
pub fn steer(snap: &SensorSnapshot) -> Option<Steer> {
    let c = snap.center;
    if snap.high_left > c || snap.low_left > c {
        Some(Steer::Left)
    } else if snap.high_right > c || snap.low_right > c {
        Some(Steer::Right)
    } else if snap.high_right > c || snap.high_left > c {
        Some(Steer::Up)
    } else if snap.low_right > c || snap.low_left > c {
        Some(Steer::Down)
    } else {
        None
    }
}

/// Periodic target acquisition task.
pub struct TargetAcquisition {
    config: AcquisitionConfig,
    shares: Shares,
    state: AcquisitionState,
    direction: ScanDirection,
}

impl TargetAcquisition {
    pub fn new(config: AcquisitionConfig, shares: Shares) -> Self {
        Self {
            config,
            shares,
            state: AcquisitionState::default(),
            direction: ScanDirection::default(),
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn direction(&self) -> ScanDirection {
        self.direction
    }

    /// Clear both reached flags.
    pub fn reset_reached(&self, ctx: &TaskCtx) {
        self.shares.elevation.reached.put(ctx, false);
        self.shares.azimuth.reached.put(ctx, false);
    }

    /// Publish the facing references with both reached flags cleared.
    ///
    /// Run before any controller cycle so the first completion a
    /// controller reports is against the facing references, not against
    /// the zeroed registers.
    pub fn prime(&self, ctx: &TaskCtx) {
        self.command(ctx, self.config.home_elevation, self.config.face_azimuth);
    }

    fn transition_to(&mut self, next: AcquisitionState) {
        info!(from = %self.state, to = %next, "Acquisition state change");
        self.state = next;
    }

    fn both_reached(&self, ctx: &TaskCtx) -> bool {
        ctx.critical(|cs| {
            self.shares.elevation.reached.load(cs) && self.shares.azimuth.reached.load(cs)
        })
    }

    fn references(&self, ctx: &TaskCtx) -> (Counts, Counts) {
        ctx.critical(|cs| {
            (
                self.shares.elevation.reference.load(cs),
                self.shares.azimuth.reference.load(cs),
            )
        })
    }

    /// Clear both reached flags and publish new references as one group.
    fn command(&self, ctx: &TaskCtx, elevation: Counts, azimuth: Counts) {
        ctx.critical(|cs| {
            self.shares.elevation.reached.store(cs, false);
            self.shares.azimuth.reached.store(cs, false);
            self.shares.elevation.reference.store(cs, elevation);
            self.shares.azimuth.reference.store(cs, azimuth);
        });
        debug!(elevation, azimuth, "Acquisition references");
    }

    /// Run one acquisition cycle.
    pub fn step(&mut self, ctx: &TaskCtx) -> AcquisitionAction {
        match self.state {
            AcquisitionState::FaceTarget => self.face_target(ctx),
            AcquisitionState::Search => self.search(ctx),
            AcquisitionState::Lock => self.lock(ctx),
        }
    }

    fn face_target(&mut self, ctx: &TaskCtx) -> AcquisitionAction {
        ctx.critical(|cs| {
            self.shares
                .elevation
                .reference
                .store(cs, self.config.home_elevation);
            self.shares
                .azimuth
                .reference
                .store(cs, self.config.face_azimuth);
        });
        if self.both_reached(ctx) {
            self.transition_to(AcquisitionState::Search);
        }
        AcquisitionAction::Facing
    }

    fn search(&mut self, ctx: &TaskCtx) -> AcquisitionAction {
        let snap = self.shares.sensors.get(ctx);
        if snap.any_at_or_above(self.config.light_threshold) {
            info!(peak = snap.peak(), "Light source detected");
            self.transition_to(AcquisitionState::Lock);
            return AcquisitionAction::Detected;
        }

        if !self.both_reached(ctx) {
            return AcquisitionAction::Waiting;
        }

        let (mut elevation, mut azimuth) = self.references(ctx);
        let action = if elevation >= self.config.hinge_limit {
            elevation -= self.config.scan_descent_step;
            AcquisitionAction::Descend
        } else {
            elevation += self.config.scan_rise_step;
            match self.direction {
                ScanDirection::Forward => {
                    azimuth += self.config.scan_azimuth_step;
                    if azimuth >= self.config.base_left_limit {
                        self.direction = ScanDirection::Reverse;
                    }
                }
                ScanDirection::Reverse => {
                    azimuth -= self.config.scan_azimuth_step;
                    if azimuth <= self.config.base_right_limit {
                        self.direction = ScanDirection::Forward;
                    }
                }
            }
            AcquisitionAction::Raster
        };
        self.command(ctx, elevation, azimuth);
        action
    }

    fn lock(&mut self, ctx: &TaskCtx) -> AcquisitionAction {
        let snap = self.shares.sensors.get(ctx);
        if !self.both_reached(ctx) {
            return AcquisitionAction::Waiting;
        }

        let (mut elevation, mut azimuth) = self.references(ctx);
        let action = if is_centered(self.config.centering, &snap, self.config.center_tolerance) {
            self.shares.fire_request.put(ctx, true);
            info!(elevation, azimuth, "Target centered, requesting fire");
            AcquisitionAction::Fire
        } else {
            match steer(&snap) {
                Some(dir) => {
                    match dir {
                        Steer::Left => azimuth += self.config.lock_azimuth_step,
                        Steer::Right => azimuth -= self.config.lock_azimuth_step,
                        Steer::Up => elevation += self.config.lock_elevation_step,
                        Steer::Down => elevation -= self.config.lock_elevation_step,
                    }
                    AcquisitionAction::Steer(dir)
                }
                None => {
                    warn!(?snap, "Lock cannot resolve steering direction");
                    AcquisitionAction::Unresolved
                }
            }
        };
        self.command(ctx, elevation, azimuth);
        action
    }
}

impl PeriodicTask for TargetAcquisition {
    fn name(&self) -> &str {
        "acquisition"
    }

    fn start(&mut self, ctx: &TaskCtx) {
        self.prime(ctx);
    }

    fn cycle(&mut self, ctx: &TaskCtx) {
        self.step(ctx);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
