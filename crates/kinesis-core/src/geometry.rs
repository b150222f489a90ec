//! Points, rotation matrices and rigid poses.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f64 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            return Vec3::ZERO;
        }
        self * (1.0 / len)
    }

    pub fn lerp(self, other: Vec3, t: f64) -> Vec3 {
        self + (other - self) * t
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Row-major 3x3 rotation matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mat3(pub [[f64; 3]; 3]);

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    pub fn rotation(axis: Axis, angle: f64) -> Mat3 {
        let (s, c) = angle.sin_cos();
        match axis {
            Axis::X => Mat3([[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]]),
            Axis::Y => Mat3([[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]),
            Axis::Z => Mat3([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]),
        }
    }

    pub fn transpose(&self) -> Mat3 {
        let m = &self.0;
        let mut out = [[0.0; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = m[c][r];
            }
        }
        Mat3(out)
    }

    pub fn apply(&self, v: Vec3) -> Vec3 {
        let m = &self.0;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }
}

impl Mul for Mat3 {
    type Output = Mat3;

    fn mul(self, rhs: Mat3) -> Mat3 {
        let (a, b) = (&self.0, &rhs.0);
        let mut out = [[0.0; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| a[r][k] * b[k][c]).sum();
            }
        }
        Mat3(out)
    }
}

/// Local direction an object faces before any rotation is applied.
pub const FRONT: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Orientation and position of a rigid body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub orientation: Mat3,
    pub position: Vec3,
}

impl Pose {
    pub fn at(position: Vec3) -> Self {
        Self {
            orientation: Mat3::IDENTITY,
            position,
        }
    }

    /// Rotate about one of the body's own axes.
    pub fn rotated(&self, axis: Axis, angle: f64) -> Pose {
        Pose {
            orientation: self.orientation * Mat3::rotation(axis, angle),
            position: self.position,
        }
    }

    /// Express `local`, given relative to this pose, in world coordinates.
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose {
            orientation: self.orientation * local.orientation,
            position: self.position + self.orientation.apply(local.position),
        }
    }

    pub fn inverse(&self) -> Pose {
        let orientation = self.orientation.transpose();
        Pose {
            orientation,
            position: -orientation.apply(self.position),
        }
    }

    /// This pose expressed relative to `frame`.
    pub fn relative_to(&self, frame: &Pose) -> Pose {
        frame.inverse().compose(self)
    }

    /// Orientation whose front points along `direction`, keeping the body
    /// upright. A zero direction leaves the orientation unchanged.
    pub fn facing(&self, direction: Vec3) -> Pose {
        let dir = direction.normalized();
        if dir == Vec3::ZERO {
            return *self;
        }
        let yaw = (-dir.x).atan2(-dir.z);
        let pitch = dir.y.clamp(-1.0, 1.0).asin();
        Pose {
            orientation: Mat3::rotation(Axis::Y, yaw) * Mat3::rotation(Axis::X, pitch),
            position: self.position,
        }
    }

    pub fn front(&self) -> Vec3 {
        self.orientation.apply(FRONT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_vec_close(actual: Vec3, expected: Vec3) {
        assert!(
            actual.distance(expected) < 1e-9,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn rotations_follow_right_hand_rule() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        assert_vec_close(
            Mat3::rotation(Axis::Z, FRAC_PI_2).apply(x),
            Vec3::new(0.0, 1.0, 0.0),
        );
        assert_vec_close(
            Mat3::rotation(Axis::Y, FRAC_PI_2).apply(x),
            Vec3::new(0.0, 0.0, -1.0),
        );
    }

    #[test]
    fn compose_and_relative_round_trip() {
        let host = Pose::at(Vec3::new(10.0, 0.0, 0.0)).rotated(Axis::Y, 0.7);
        let object = Pose::at(Vec3::new(12.0, 1.0, -3.0)).rotated(Axis::X, 0.2);
        let offset = object.relative_to(&host);
        let back = host.compose(&offset);
        assert_vec_close(back.position, object.position);
        assert_vec_close(back.front(), object.front());
    }

    #[test]
    fn facing_points_front_along_direction() {
        for dir in [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(-3.0, 4.0, 0.0),
            Vec3::new(1.0, -1.0, 1.0),
        ] {
            let pose = Pose::default().facing(dir);
            assert_vec_close(pose.front(), dir.normalized());
        }
        let untouched = Pose::default().facing(Vec3::ZERO);
        assert_eq!(untouched, Pose::default());
    }
}
