//! Three-phase motion planning.
//!
//! Each solver produces [`Phases`]: the accelerate, cruise and decelerate
//! durations together with the speeds at the phase boundaries. The
//! accelerate phase may actually slow the object down when it starts
//! faster than the cruise speed; the implied rate is recovered from the
//! durations and speeds.

use super::{
    EPSILON, KinematicsError, Result, distance_for_bounded_accel, duration_for_bounded_accel,
    peak_speed_for_triangular_profile,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Phases {
    pub accel_duration: f64,
    pub cruise_duration: f64,
    pub decel_duration: f64,
    pub initial_speed: f64,
    pub cruise_speed: f64,
    pub end_speed: f64,
}

impl Phases {
    pub fn total_duration(&self) -> f64 {
        self.accel_duration + self.cruise_duration + self.decel_duration
    }

    /// Distance covered over all three phases.
    pub fn distance(&self) -> f64 {
        let accel = (self.initial_speed + self.cruise_speed) / 2.0 * self.accel_duration;
        let cruise = self.cruise_speed * self.cruise_duration;
        let decel = (self.cruise_speed + self.end_speed) / 2.0 * self.decel_duration;
        accel + cruise + decel
    }

    fn braking(v0: f64, dec: f64) -> Result<Self> {
        Ok(Self {
            decel_duration: duration_for_bounded_accel(v0, 0.0, dec)?,
            initial_speed: v0,
            cruise_speed: v0,
            ..Self::default()
        })
    }

    fn constant(v0: f64, speed: f64, duration: f64) -> Self {
        Self {
            cruise_duration: duration,
            initial_speed: v0,
            cruise_speed: speed,
            ..Self::default()
        }
    }

    fn triangular(v0: f64, peak: f64, acc: f64, dec: f64) -> Result<Self> {
        Ok(Self {
            accel_duration: duration_for_bounded_accel(v0, peak, acc)?,
            decel_duration: duration_for_bounded_accel(peak, 0.0, dec)?,
            initial_speed: v0,
            cruise_speed: peak,
            ..Self::default()
        })
    }
}

/// Optional constraints for a move.
///
/// A value only counts as given when it is usable: a positive duration,
/// a positive maximum speed, or a positive acceleration paired with a
/// negative deceleration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionParameters {
    pub duration: Option<f64>,
    pub max_speed: Option<f64>,
    pub acceleration: Option<f64>,
    pub deceleration: Option<f64>,
}

impl MotionParameters {
    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: MotionParameters) -> Self {
        Self {
            duration: self.duration.or(fallback.duration),
            max_speed: self.max_speed.or(fallback.max_speed),
            acceleration: self.acceleration.or(fallback.acceleration),
            deceleration: self.deceleration.or(fallback.deceleration),
        }
    }

    fn given_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    fn given_max_speed(&self) -> Option<f64> {
        self.max_speed.filter(|v| v.is_finite() && *v > 0.0)
    }

    fn given_rates(&self) -> Option<(f64, f64)> {
        match (self.acceleration, self.deceleration) {
            (Some(acc), Some(dec)) if acc > 0.0 && dec < 0.0 => Some((acc, dec)),
            _ => None,
        }
    }
}

/// Plan a move over `distance` starting at `v0`, picking the solver from
/// which parameters are given.
pub fn plan(distance: f64, v0: f64, params: &MotionParameters) -> Result<Phases> {
    let duration = params.given_duration();
    let max_speed = params.given_max_speed();
    let rates = params.given_rates();

    if duration.is_none() && max_speed.is_none() && rates.is_none() {
        return Err(KinematicsError::InsufficientParameters);
    }
    if !distance.is_finite() || distance < 0.0 {
        return Err(KinematicsError::InvalidInput {
            reason: "distance must be a non-negative number",
        });
    }
    if distance == 0.0 {
        return Ok(Phases::default());
    }

    match (duration, max_speed, rates) {
        (Some(t), Some(m), Some((acc, dec))) => solve_for_duration(distance, v0, m, acc, dec, t),
        (None, Some(m), Some((acc, dec))) => solve_fastest_profile(distance, v0, m, acc, dec),
        (Some(t), None, Some((acc, dec))) => solve_for_distance(distance, v0, acc, dec, t),
        (None, None, Some((acc, dec))) => solve_triangular_profile(distance, v0, acc, dec),
        (Some(t), Some(m), None) => {
            let speed = distance / t;
            if speed > m + EPSILON {
                return Err(KinematicsError::UnreachableInTime {
                    reason: "required constant speed exceeds the maximum speed",
                });
            }
            Ok(Phases::constant(v0, speed, t))
        }
        (None, Some(m), None) => Ok(Phases::constant(v0, m, distance / m)),
        (Some(t), None, None) => Ok(Phases::constant(v0, distance / t, t)),
        (None, None, None) => Err(KinematicsError::InsufficientParameters),
    }
}

fn check_distance(distance: f64) -> Result<()> {
    if !(distance.is_finite() && distance > 0.0) {
        return Err(KinematicsError::InvalidInput {
            reason: "distance must be positive",
        });
    }
    Ok(())
}

fn check_duration(duration: f64) -> Result<()> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(KinematicsError::InvalidInput {
            reason: "duration must be positive",
        });
    }
    Ok(())
}

fn check_rates(v0: f64, acc: f64, dec: f64) -> Result<()> {
    if v0 < 0.0 {
        return Err(KinematicsError::InvalidSpeed { speed: v0 });
    }
    if acc.is_nan() || dec.is_nan() || acc <= 0.0 || dec >= 0.0 {
        return Err(KinematicsError::InvalidInput {
            reason: "acceleration must be positive and deceleration negative",
        });
    }
    Ok(())
}

fn braking_distance(v0: f64, dec: f64, distance: f64) -> Result<f64> {
    let brake = distance_for_bounded_accel(v0, 0.0, dec)?;
    if brake > distance + EPSILON {
        return Err(KinematicsError::UnreachableInTime {
            reason: "braking distance exceeds the track length",
        });
    }
    Ok(brake)
}

/// Fastest legal arrival: accelerate to at most `max_speed`, then brake
/// to a stop exactly at `distance`.
pub fn solve_fastest_profile(
    distance: f64,
    v0: f64,
    max_speed: f64,
    acc: f64,
    dec: f64,
) -> Result<Phases> {
    check_distance(distance)?;
    check_rates(v0, acc, dec)?;
    if max_speed.is_nan() || max_speed <= 0.0 {
        return Err(KinematicsError::InvalidInput {
            reason: "maximum speed must be positive",
        });
    }

    let brake = braking_distance(v0, dec, distance)?;
    if (brake - distance).abs() <= EPSILON {
        return Phases::braking(v0, dec);
    }

    if v0 < max_speed {
        let peak = peak_speed_for_triangular_profile(distance, v0, 0.0, acc, dec)?;
        if peak <= max_speed {
            return Phases::triangular(v0, peak.max(v0), acc, dec);
        }
        let accel_distance = distance_for_bounded_accel(v0, max_speed, acc)?;
        let decel_distance = distance_for_bounded_accel(max_speed, 0.0, dec)?;
        return Ok(Phases {
            accel_duration: duration_for_bounded_accel(v0, max_speed, acc)?,
            cruise_duration: (distance - accel_distance - decel_distance) / max_speed,
            decel_duration: duration_for_bounded_accel(max_speed, 0.0, dec)?,
            initial_speed: v0,
            cruise_speed: max_speed,
            end_speed: 0.0,
        });
    }

    // already at or above the cap: slow down to it, cruise, then stop
    let slow_distance = distance_for_bounded_accel(v0, max_speed, dec)?;
    let decel_distance = distance_for_bounded_accel(max_speed, 0.0, dec)?;
    Ok(Phases {
        accel_duration: duration_for_bounded_accel(v0, max_speed, dec)?,
        cruise_duration: ((distance - slow_distance - decel_distance) / max_speed).max(0.0),
        decel_duration: duration_for_bounded_accel(max_speed, 0.0, dec)?,
        initial_speed: v0,
        cruise_speed: max_speed,
        end_speed: 0.0,
    })
}

/// Accelerate then immediately brake, without a cruise phase.
pub fn solve_triangular_profile(distance: f64, v0: f64, acc: f64, dec: f64) -> Result<Phases> {
    check_distance(distance)?;
    check_rates(v0, acc, dec)?;

    let brake = braking_distance(v0, dec, distance)?;
    if (brake - distance).abs() <= EPSILON {
        return Phases::braking(v0, dec);
    }
    let peak = peak_speed_for_triangular_profile(distance, v0, 0.0, acc, dec)?;
    Phases::triangular(v0, peak.max(v0), acc, dec)
}

/// Arrive after exactly `total_duration`, never exceeding `max_speed`.
pub fn solve_for_duration(
    distance: f64,
    v0: f64,
    max_speed: f64,
    acc: f64,
    dec: f64,
    total_duration: f64,
) -> Result<Phases> {
    check_duration(total_duration)?;
    let fastest = solve_fastest_profile(distance, v0, max_speed, acc, dec)?;
    let fastest_duration = fastest.total_duration();

    if fastest_duration > total_duration + EPSILON {
        return Err(KinematicsError::UnreachableInTime {
            reason: "the fastest profile takes longer than the requested duration",
        });
    }
    if (fastest_duration - total_duration).abs() <= EPSILON {
        return Ok(fastest);
    }
    solve_for_distance(distance, v0, acc, dec, total_duration)
}

/// Arrive after exactly `total_duration` with no speed cap.
///
/// Holding `v0` and braking at the end either undershoots (speed up to a
/// higher cruise speed first), overshoots (slow down to a lower cruise
/// speed first) or matches exactly.
pub fn solve_for_distance(
    distance: f64,
    v0: f64,
    acc: f64,
    dec: f64,
    total_duration: f64,
) -> Result<Phases> {
    check_distance(distance)?;
    check_duration(total_duration)?;
    check_rates(v0, acc, dec)?;

    let brake = braking_distance(v0, dec, distance)?;
    let brake_duration = duration_for_bounded_accel(v0, 0.0, dec)?;
    let hold_duration = total_duration - brake_duration;
    let holding_distance = v0 * hold_duration + brake;

    if (holding_distance - distance).abs() <= EPSILON {
        if hold_duration < 0.0 {
            return Err(KinematicsError::UnreachableInTime {
                reason: "not enough time to brake",
            });
        }
        return Ok(Phases {
            cruise_duration: hold_duration,
            decel_duration: brake_duration,
            initial_speed: v0,
            cruise_speed: v0,
            ..Phases::default()
        });
    }

    let (t, d) = (total_duration, distance);
    let (first_duration, cruise_speed) = if holding_distance < distance {
        let squared = acc * acc * t * t * dec * dec + 2.0 * acc * dec * dec * v0 * t
            + acc * dec * v0 * v0
            - 2.0 * acc * dec * dec * d
            + 2.0 * acc * acc * d * dec;
        if squared < 0.0 {
            return Err(KinematicsError::UnreachableInTime {
                reason: "no cruise speed reaches the destination in time",
            });
        }
        let accel_duration =
            (-acc * v0 - acc * t * dec - squared.sqrt()) / (acc * (acc - dec));
        (accel_duration, acc * accel_duration + v0)
    } else {
        let denominator = 2.0 * dec * (t * dec + v0);
        if denominator == 0.0 {
            return Err(KinematicsError::UnreachableInTime {
                reason: "no cruise speed reaches the destination in time",
            });
        }
        let slow_duration = -(2.0 * v0 * t * dec + v0 * v0 - 2.0 * d * dec) / denominator;
        (slow_duration, dec * slow_duration + v0)
    };

    if first_duration < -EPSILON || cruise_speed < 0.0 {
        return Err(KinematicsError::UnreachableInTime {
            reason: "implied phase duration is negative",
        });
    }
    let first_duration = first_duration.max(0.0);
    let decel_duration = -cruise_speed / dec;
    let cruise_duration = t - first_duration - decel_duration;
    if cruise_duration < -EPSILON {
        return Err(KinematicsError::UnreachableInTime {
            reason: "implied phase duration is negative",
        });
    }

    Ok(Phases {
        accel_duration: first_duration,
        cruise_duration: cruise_duration.max(0.0),
        decel_duration,
        initial_speed: v0,
        cruise_speed,
        end_speed: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn params(
        duration: Option<f64>,
        max_speed: Option<f64>,
        rates: Option<(f64, f64)>,
    ) -> MotionParameters {
        MotionParameters {
            duration,
            max_speed,
            acceleration: rates.map(|r| r.0),
            deceleration: rates.map(|r| r.1),
        }
    }

    #[test]
    fn fastest_trapezoid() {
        let phases = solve_fastest_profile(100.0, 0.0, 10.0, 2.0, -4.0).unwrap();
        assert_close(phases.accel_duration, 5.0);
        assert_close(phases.cruise_duration, 6.25);
        assert_close(phases.decel_duration, 2.5);
        assert_close(phases.total_duration(), 13.75);
        assert_close(phases.distance(), 100.0);
    }

    #[test]
    fn fastest_triangular_when_cap_is_not_reached() {
        let phases = solve_fastest_profile(12.0, 0.0, 100.0, 2.0, -4.0).unwrap();
        assert_eq!(phases.cruise_duration, 0.0);
        assert_close(phases.cruise_speed, 32.0f64.sqrt());
        assert_close(phases.distance(), 12.0);
    }

    #[test]
    fn fastest_from_above_the_cap() {
        let phases = solve_fastest_profile(100.0, 12.0, 10.0, 2.0, -4.0).unwrap();
        assert_close(phases.accel_duration, 0.5);
        assert_close(phases.decel_duration, 2.5);
        assert_close(phases.distance(), 100.0);
    }

    #[test]
    fn fastest_braking_only() {
        let phases = solve_fastest_profile(12.5, 10.0, 10.0, 2.0, -4.0).unwrap();
        assert_eq!(phases.accel_duration, 0.0);
        assert_eq!(phases.cruise_duration, 0.0);
        assert_close(phases.decel_duration, 2.5);
        assert_close(phases.distance(), 12.5);
    }

    #[test]
    fn fastest_cannot_stop_in_time() {
        assert!(matches!(
            solve_fastest_profile(10.0, 10.0, 10.0, 2.0, -4.0),
            Err(KinematicsError::UnreachableInTime { .. })
        ));
    }

    #[test]
    fn distance_solver_speeds_up() {
        let phases = solve_for_distance(100.0, 0.0, 2.0, -4.0, 20.0).unwrap();
        assert_close(phases.total_duration(), 20.0);
        assert_close(phases.distance(), 100.0);
        assert!(phases.accel_duration > 0.0);
        assert_close(phases.cruise_speed, 2.0 * phases.accel_duration);
    }

    #[test]
    fn distance_solver_slows_down() {
        let phases = solve_for_distance(100.0, 10.0, 2.0, -4.0, 20.0).unwrap();
        assert_close(phases.accel_duration, 1.25);
        assert_close(phases.cruise_duration, 17.5);
        assert_close(phases.decel_duration, 1.25);
        assert_close(phases.cruise_speed, 5.0);
        assert_close(phases.distance(), 100.0);
    }

    #[test]
    fn distance_solver_already_matches() {
        let phases = solve_for_distance(87.5, 10.0, 2.0, -4.0, 10.0).unwrap();
        assert_eq!(phases.accel_duration, 0.0);
        assert_close(phases.cruise_duration, 7.5);
        assert_close(phases.decel_duration, 2.5);
    }

    #[test]
    fn duration_solver_rejects_impossible_deadlines() {
        assert!(matches!(
            solve_for_duration(100.0, 0.0, 10.0, 2.0, -4.0, 5.0),
            Err(KinematicsError::UnreachableInTime { .. })
        ));
        let exact = solve_for_duration(100.0, 0.0, 10.0, 2.0, -4.0, 13.75).unwrap();
        assert_close(exact.cruise_speed, 10.0);
        let relaxed = solve_for_duration(100.0, 0.0, 10.0, 2.0, -4.0, 20.0).unwrap();
        assert_close(relaxed.total_duration(), 20.0);
        assert!(relaxed.cruise_speed < 10.0);
    }

    #[test]
    fn distance_solver_rejects_impossible_deadlines() {
        let unreachable = |result: Result<Phases>| {
            assert!(
                matches!(result, Err(KinematicsError::UnreachableInTime { .. })),
                "{result:?}"
            )
        };
        // from rest, no cruise speed covers 100 in 5s
        unreachable(solve_for_distance(100.0, 0.0, 2.0, -4.0, 5.0));
        // already moving but the deadline ends before braking could
        unreachable(solve_for_distance(20.0, 10.0, 2.0, -4.0, 1.0));
        // braking from 10 needs 12.5
        unreachable(solve_for_distance(10.0, 10.0, 2.0, -4.0, 30.0));
        unreachable(plan(100.0, 0.0, &params(Some(5.0), None, Some((2.0, -4.0)))));

        let feasible = solve_for_distance(20.0, 10.0, 2.0, -4.0, 10.0).unwrap();
        assert_close(feasible.accel_duration, 2.25);
        assert_close(feasible.cruise_speed, 1.0);
        assert_close(feasible.distance(), 20.0);
    }

    #[test]
    fn invalid_solver_inputs() {
        assert!(matches!(
            solve_for_distance(0.0, 0.0, 2.0, -4.0, 10.0),
            Err(KinematicsError::InvalidInput { .. })
        ));
        assert!(matches!(
            solve_for_distance(10.0, 0.0, 2.0, -4.0, 0.0),
            Err(KinematicsError::InvalidInput { .. })
        ));
    }

    #[test]
    fn parameter_table() {
        let full = plan(100.0, 0.0, &params(Some(20.0), Some(10.0), Some((2.0, -4.0)))).unwrap();
        assert_close(full.total_duration(), 20.0);

        let fastest = plan(100.0, 0.0, &params(None, Some(10.0), Some((2.0, -4.0)))).unwrap();
        assert_close(fastest.total_duration(), 13.75);

        let uncapped = plan(100.0, 0.0, &params(Some(20.0), None, Some((2.0, -4.0)))).unwrap();
        assert_close(uncapped.total_duration(), 20.0);

        let triangle = plan(12.0, 0.0, &params(None, None, Some((2.0, -4.0)))).unwrap();
        assert_eq!(triangle.cruise_duration, 0.0);

        let capped = plan(50.0, 0.0, &params(Some(10.0), Some(6.0), None)).unwrap();
        assert_close(capped.cruise_speed, 5.0);
        assert!(matches!(
            plan(50.0, 0.0, &params(Some(10.0), Some(4.0), None)),
            Err(KinematicsError::UnreachableInTime { .. })
        ));

        let at_max = plan(50.0, 0.0, &params(None, Some(5.0), None)).unwrap();
        assert_close(at_max.cruise_duration, 10.0);

        let timed = plan(50.0, 0.0, &params(Some(10.0), None, None)).unwrap();
        assert_close(timed.cruise_speed, 5.0);
        assert_eq!(timed.accel_duration + timed.decel_duration, 0.0);
    }

    #[test]
    fn unusable_parameters_are_insufficient() {
        let unusable = MotionParameters {
            duration: Some(-1.0),
            max_speed: Some(0.0),
            acceleration: Some(2.0),
            deceleration: Some(4.0),
        };
        assert_eq!(
            plan(10.0, 0.0, &unusable),
            Err(KinematicsError::InsufficientParameters)
        );
        assert_eq!(
            plan(10.0, 0.0, &MotionParameters::default()),
            Err(KinematicsError::InsufficientParameters)
        );
    }

    #[test]
    fn zero_distance_is_stationary() {
        let phases = plan(0.0, 0.0, &params(Some(3.0), None, None)).unwrap();
        assert_eq!(phases, Phases::default());
    }

    #[test]
    fn fallback_parameters() {
        let request = MotionParameters {
            duration: Some(4.0),
            ..MotionParameters::default()
        };
        let limits = MotionParameters {
            duration: Some(99.0),
            max_speed: Some(10.0),
            ..MotionParameters::default()
        };
        let merged = request.or(limits);
        assert_eq!(merged.duration, Some(4.0));
        assert_eq!(merged.max_speed, Some(10.0));
    }
}
