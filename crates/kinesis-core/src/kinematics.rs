//! Constant-acceleration kinematics.
//!
//! Every function here is closed-form over `f64`. Invalid inputs (wrong
//! acceleration sign, negative speeds, negative discriminants) are
//! reported as [`KinematicsError`] rather than propagated as NaN.
//!
//! Deceleration is expressed as a negative acceleration throughout.

use thiserror::Error;

pub mod planner;

pub use planner::{MotionParameters, Phases};

/// Tolerance used when comparing derived times and distances.
pub const EPSILON: f64 = 1e-9;

/// Slack allowed when checking an elapsed time against `duration`. Grows
/// with the duration so long motions are not held to an absolute bound.
pub fn time_tolerance(duration: f64) -> f64 {
    EPSILON * duration.abs().max(1.0)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KinematicsError {
    #[error("acceleration {accel} cannot change speed from {from} to {to}")]
    InvalidAcceleration { from: f64, to: f64, accel: f64 },

    #[error("speed {speed} must not be negative")]
    InvalidSpeed { speed: f64 },

    #[error("square root of negative value {radicand}")]
    NegativeRadicand { radicand: f64 },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: &'static str },

    #[error("destination cannot be reached in time: {reason}")]
    UnreachableInTime { reason: &'static str },

    #[error("acceleration and deceleration are both {accel}; no peak speed exists")]
    DegenerateProfile { accel: f64 },

    #[error("elapsed time {elapsed} exceeds profile duration {total}")]
    ElapsedTimeExceedsProfile { elapsed: f64, total: f64 },

    #[error("a duration, a maximum speed, or an acceleration/deceleration pair is required")]
    InsufficientParameters,

    #[error("profile is partially degenerate")]
    InvalidProfile,

    #[error("exactly one rotation axis must be selected")]
    InvalidAxis,
}

pub type Result<T> = std::result::Result<T, KinematicsError>;

fn check_accel(v0: f64, v1: f64, a: f64) -> Result<()> {
    let invalid = a == 0.0 || (v1 > v0 && a < 0.0) || (v1 < v0 && a > 0.0);
    if invalid {
        return Err(KinematicsError::InvalidAcceleration {
            from: v0,
            to: v1,
            accel: a,
        });
    }
    Ok(())
}

/// Distance covered while changing speed from `v0` to `v1` at constant `a`.
pub fn distance_for_bounded_accel(v0: f64, v1: f64, a: f64) -> Result<f64> {
    check_accel(v0, v1, a)?;
    Ok((v1 * v1 - v0 * v0) / (2.0 * a))
}

/// Time needed to change speed from `v0` to `v1` at constant `a`.
pub fn duration_for_bounded_accel(v0: f64, v1: f64, a: f64) -> Result<f64> {
    check_accel(v0, v1, a)?;
    if v0 == v1 {
        return Ok(0.0);
    }
    Ok((v1 - v0) / a)
}

/// Distance covered after `t` seconds starting at `v0` with constant `a`.
///
/// A decelerating object never reports negative progress.
pub fn distance_for_timed_accel(t: f64, v0: f64, a: f64) -> Result<f64> {
    if v0 < 0.0 {
        return Err(KinematicsError::InvalidSpeed { speed: v0 });
    }
    let distance = a * t * t / 2.0 + v0 * t;
    if a < 0.0 {
        return Ok(distance.max(0.0));
    }
    Ok(distance)
}

/// Speed after `t` seconds starting at `v0` with constant `a`, never below zero.
pub fn speed_for_timed_accel(t: f64, v0: f64, a: f64) -> f64 {
    (a * t + v0).max(0.0)
}

/// Speed reached after covering `d` from `v0` with constant `a`.
pub fn speed_for_distance_bounded_accel(d: f64, v0: f64, a: f64) -> Result<f64> {
    if d < 0.0 {
        return Err(KinematicsError::InvalidInput {
            reason: "distance must not be negative",
        });
    }
    if v0 < 0.0 {
        return Err(KinematicsError::InvalidInput {
            reason: "initial speed must not be negative",
        });
    }
    let squared = v0 * v0 + 2.0 * a * d;
    if squared < 0.0 {
        return Err(KinematicsError::NegativeRadicand { radicand: squared });
    }
    Ok(squared.sqrt())
}

/// Speed reached when accelerating at `acc` is immediately followed by
/// decelerating at `dec` so that exactly `distance` is covered and the
/// object ends at `v_end`.
pub fn peak_speed_for_triangular_profile(
    distance: f64,
    v0: f64,
    v_end: f64,
    acc: f64,
    dec: f64,
) -> Result<f64> {
    if acc == dec {
        return Err(KinematicsError::DegenerateProfile { accel: acc });
    }
    let radicand = (2.0 * acc * dec * distance + dec * v0 * v0 - acc * v_end * v_end) / (dec - acc);
    if radicand < 0.0 {
        return Err(KinematicsError::NegativeRadicand { radicand });
    }
    Ok(radicand.sqrt())
}

/// Constant acceleration that turns `v0` into `v1` within `duration`.
pub fn acceleration_for_duration(v0: f64, v1: f64, duration: f64) -> Result<f64> {
    if duration <= 0.0 {
        return Err(KinematicsError::InvalidInput {
            reason: "phase duration must be positive",
        });
    }
    Ok((v1 - v0) / duration)
}
