//! Planned motions bound to their geometry.
//!
//! A [`MotionProfile`] pairs solved [`Phases`] with the [`Track`] they
//! run along and answers "where is the object after `t` seconds". The
//! per-phase rates are never stored; they are implied by the phase
//! durations and boundary speeds.

use crate::{
    geometry::{Axis, Vec3},
    kinematics::{
        KinematicsError, MotionParameters, Phases, Result, acceleration_for_duration,
        distance_for_timed_accel, planner, speed_for_timed_accel, time_tolerance,
    },
    track::Track,
};
use serde::Serialize;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct MotionProfile {
    phases: Phases,
    track: Rc<dyn Track>,
}

impl MotionProfile {
    pub fn new(track: Rc<dyn Track>, phases: Phases) -> Self {
        Self { phases, track }
    }

    /// Solve the phases for `track` from whichever parameters are given.
    pub fn plan(track: Rc<dyn Track>, initial_speed: f64, params: &MotionParameters) -> Result<Self> {
        let phases = planner::plan(track.length(), initial_speed, params)?;
        Ok(Self::new(track, phases))
    }

    pub fn phases(&self) -> &Phases {
        &self.phases
    }

    pub fn track(&self) -> &Rc<dyn Track> {
        &self.track
    }

    pub fn total_duration(&self) -> f64 {
        self.phases.total_duration()
    }

    /// Either nothing moves at all, or length, duration and speed are all
    /// nonzero.
    pub fn is_valid(&self) -> bool {
        let p = &self.phases;
        let zeros = [
            self.track.length(),
            p.total_duration(),
            p.initial_speed + p.cruise_speed + p.end_speed,
        ]
        .map(|v| v == 0.0);
        zeros.iter().all(|z| *z) || zeros.iter().all(|z| !*z)
    }

    fn accel_rate(&self) -> Result<f64> {
        let p = &self.phases;
        acceleration_for_duration(p.initial_speed, p.cruise_speed, p.accel_duration)
    }

    fn decel_rate(&self) -> Result<f64> {
        let p = &self.phases;
        acceleration_for_duration(p.cruise_speed, p.end_speed, p.decel_duration)
    }

    fn clamp_elapsed(&self, elapsed: f64) -> Result<f64> {
        if !self.is_valid() {
            return Err(KinematicsError::InvalidProfile);
        }
        if !(elapsed.is_finite() && elapsed >= 0.0) {
            return Err(KinematicsError::InvalidInput {
                reason: "elapsed time must be a non-negative number",
            });
        }
        let total = self.total_duration();
        if elapsed > total + time_tolerance(total) {
            return Err(KinematicsError::ElapsedTimeExceedsProfile { elapsed, total });
        }
        Ok(elapsed.min(total))
    }

    /// Distance along the track after `elapsed` seconds.
    pub fn distance_at(&self, elapsed: f64) -> Result<f64> {
        let t = self.clamp_elapsed(elapsed)?;
        let p = &self.phases;
        let accel_end = p.accel_duration;
        let cruise_end = accel_end + p.cruise_duration;

        if t < accel_end {
            return distance_for_timed_accel(t, p.initial_speed, self.accel_rate()?);
        }
        let accel_distance = if accel_end > 0.0 {
            distance_for_timed_accel(accel_end, p.initial_speed, self.accel_rate()?)?
        } else {
            0.0
        };
        if t <= cruise_end {
            return Ok(accel_distance + (t - accel_end) * p.cruise_speed);
        }
        let decel_distance = distance_for_timed_accel(t - cruise_end, p.cruise_speed, self.decel_rate()?)?;
        Ok(accel_distance + p.cruise_duration * p.cruise_speed + decel_distance)
    }

    pub fn speed_at(&self, elapsed: f64) -> Result<f64> {
        let t = self.clamp_elapsed(elapsed)?;
        let p = &self.phases;
        let cruise_end = p.accel_duration + p.cruise_duration;

        if t < p.accel_duration {
            Ok(speed_for_timed_accel(t, p.initial_speed, self.accel_rate()?))
        } else if t <= cruise_end {
            Ok(p.cruise_speed)
        } else {
            Ok(speed_for_timed_accel(t - cruise_end, p.cruise_speed, self.decel_rate()?))
        }
    }

    pub fn position_at(&self, elapsed: f64) -> Result<Vec3> {
        Ok(self.track.position_at(self.distance_at(elapsed)?))
    }

    pub fn direction_at(&self, elapsed: f64) -> Result<Vec3> {
        Ok(self.track.direction_at(self.distance_at(elapsed)?))
    }
}

/// A turn about a single body axis at constant angular speed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rotation {
    axis: Axis,
    angle: f64,
    duration: f64,
}

impl Rotation {
    pub fn new(axis: Axis, angle: f64, duration: f64) -> Result<Self> {
        if !angle.is_finite() {
            return Err(KinematicsError::InvalidInput {
                reason: "rotation angle must be finite",
            });
        }
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(KinematicsError::InvalidInput {
                reason: "rotation duration must not be negative",
            });
        }
        Ok(Self {
            axis,
            angle,
            duration,
        })
    }

    /// Build a rotation from per-axis selectors, exactly one of which must be set.
    pub fn from_flags(x: bool, y: bool, z: bool, angle: f64, duration: f64) -> Result<Self> {
        let axis = match (x, y, z) {
            (true, false, false) => Axis::X,
            (false, true, false) => Axis::Y,
            (false, false, true) => Axis::Z,
            _ => return Err(KinematicsError::InvalidAxis),
        };
        Self::new(axis, angle, duration)
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Angle turned after `elapsed` seconds.
    pub fn angle_at(&self, elapsed: f64) -> Result<f64> {
        if elapsed > self.duration + time_tolerance(self.duration) {
            return Err(KinematicsError::ElapsedTimeExceedsProfile {
                elapsed,
                total: self.duration,
            });
        }
        if self.duration == 0.0 {
            return Ok(self.angle);
        }
        Ok(self.angle * elapsed.clamp(0.0, self.duration) / self.duration)
    }
}
