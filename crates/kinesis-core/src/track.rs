//! Paths that objects travel along.

use crate::geometry::Vec3;
use std::fmt;

/// A path parameterized by distance travelled from its start.
pub trait Track: fmt::Debug {
    fn length(&self) -> f64;

    /// Point at `distance`, clamped to the ends of the track.
    fn position_at(&self, distance: f64) -> Vec3;

    /// Unit direction of travel at `distance`.
    ///
    /// At distance 0 this points toward the first waypoint (or the
    /// destination); on a waypoint it is the outgoing direction.
    fn direction_at(&self, distance: f64) -> Vec3;

    fn start(&self) -> Vec3 {
        self.position_at(0.0)
    }

    fn destination(&self) -> Vec3 {
        self.position_at(self.length())
    }
}

/// Straight segments through a list of waypoints.
#[derive(Clone, Debug, PartialEq)]
pub struct PolylineTrack {
    points: Vec<Vec3>,
    // distance from the start to each point
    offsets: Vec<f64>,
}

impl PolylineTrack {
    pub fn new(start: Vec3, waypoints: impl IntoIterator<Item = Vec3>, destination: Vec3) -> Self {
        let mut points = vec![start];
        points.extend(waypoints);
        points.push(destination);

        let mut offsets = Vec::with_capacity(points.len());
        let mut total = 0.0;
        offsets.push(total);
        for pair in points.windows(2) {
            total += pair[0].distance(pair[1]);
            offsets.push(total);
        }
        Self { points, offsets }
    }

    pub fn straight(start: Vec3, destination: Vec3) -> Self {
        Self::new(start, [], destination)
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    fn segment_count(&self) -> usize {
        self.points.len() - 1
    }

    fn segment_len(&self, segment: usize) -> f64 {
        self.offsets[segment + 1] - self.offsets[segment]
    }

    fn segment(&self, distance: f64) -> usize {
        let after = self.offsets.partition_point(|&offset| offset <= distance);
        after.saturating_sub(1).min(self.segment_count() - 1)
    }
}

impl Track for PolylineTrack {
    fn length(&self) -> f64 {
        self.offsets[self.offsets.len() - 1]
    }

    fn position_at(&self, distance: f64) -> Vec3 {
        let distance = distance.clamp(0.0, self.length());
        let segment = self.segment(distance);
        let len = self.segment_len(segment);
        if len == 0.0 {
            return self.points[segment + 1];
        }
        let t = (distance - self.offsets[segment]) / len;
        self.points[segment].lerp(self.points[segment + 1], t.min(1.0))
    }

    fn direction_at(&self, distance: f64) -> Vec3 {
        let segment = self.segment(distance.clamp(0.0, self.length()));
        let found = (segment..self.segment_count())
            .chain((0..segment).rev())
            .find(|&s| self.segment_len(s) > 0.0);
        match found {
            Some(s) => (self.points[s + 1] - self.points[s]).normalized(),
            None => Vec3::ZERO,
        }
    }

    fn start(&self) -> Vec3 {
        self.points[0]
    }

    fn destination(&self) -> Vec3 {
        self.points[self.points.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> PolylineTrack {
        PolylineTrack::new(
            Vec3::ZERO,
            [Vec3::new(3.0, 0.0, 0.0)],
            Vec3::new(3.0, 4.0, 0.0),
        )
    }

    #[test]
    fn length_and_position() {
        let track = l_shape();
        assert_eq!(track.length(), 7.0);
        assert_eq!(track.position_at(1.5), Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(track.position_at(5.0), Vec3::new(3.0, 2.0, 0.0));
        assert_eq!(track.position_at(100.0), Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(track.position_at(-1.0), Vec3::ZERO);
    }

    #[test]
    fn direction_uses_outgoing_segment() {
        let track = l_shape();
        assert_eq!(track.direction_at(0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(track.direction_at(3.0), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(track.direction_at(7.0), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn duplicate_points_are_skipped() {
        let p = Vec3::new(0.0, 0.0, -2.0);
        let track = PolylineTrack::new(Vec3::ZERO, [Vec3::ZERO, p], p);
        assert_eq!(track.length(), 2.0);
        assert_eq!(track.direction_at(0.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(track.direction_at(2.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(track.destination(), p);
    }

    #[test]
    fn zero_length_track() {
        let track = PolylineTrack::straight(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(track.length(), 0.0);
        assert_eq!(track.position_at(0.0), Vec3::ZERO);
        assert_eq!(track.direction_at(0.0), Vec3::ZERO);
    }
}
