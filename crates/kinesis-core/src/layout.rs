//! Named locations and the tracks that connect them.

use crate::{
    geometry::Vec3,
    state::{MotionError, Result},
    track::{PolylineTrack, Track},
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub position: Vec3,
    /// Named points where objects arrive, as offsets from `position`.
    #[serde(default)]
    pub entry_points: FxHashMap<String, Vec3>,
    /// Named points where objects leave, as offsets from `position`.
    #[serde(default)]
    pub exit_points: FxHashMap<String, Vec3>,
}

impl Location {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            entry_points: FxHashMap::default(),
            exit_points: FxHashMap::default(),
        }
    }

    pub fn with_entry_point(mut self, name: impl Into<String>, offset: Vec3) -> Self {
        self.entry_points.insert(name.into(), offset);
        self
    }

    pub fn with_exit_point(mut self, name: impl Into<String>, offset: Vec3) -> Self {
        self.exit_points.insert(name.into(), offset);
        self
    }
}

/// A predefined route between two locations. It may be travelled in
/// either direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub waypoints: Vec<Vec3>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub locations: Vec<Location>,
    pub tracks: Vec<TrackSpec>,
}

/// Where a move should end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Location(String),
    Point(Vec3),
    EntryPoint {
        location: String,
        entry_point: String,
    },
    ExitPoint {
        location: String,
        exit_point: String,
    },
}

impl Destination {
    /// The named location this destination belongs to, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            Destination::Location(name)
            | Destination::EntryPoint { location: name, .. }
            | Destination::ExitPoint { location: name, .. } => Some(name),
            Destination::Point(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Layout {
    locations: FxHashMap<String, Location>,
    tracks: FxHashMap<(String, String), Vec<Vec3>>,
}

impl Layout {
    pub fn new(config: &LayoutConfig) -> Result<Self> {
        let mut layout = Self::default();
        for location in &config.locations {
            let previous = layout
                .locations
                .insert(location.name.clone(), location.clone());
            if previous.is_some() {
                return Err(MotionError::DuplicateLocation(location.name.clone()));
            }
        }
        for track in &config.tracks {
            for end in [&track.from, &track.to] {
                if !layout.locations.contains_key(end) {
                    return Err(MotionError::UnknownLocation(end.clone()));
                }
            }
            layout.tracks.insert(
                (track.from.clone(), track.to.clone()),
                track.waypoints.clone(),
            );
        }
        Ok(layout)
    }

    pub fn location(&self, name: &str) -> Option<Vec3> {
        self.locations.get(name).map(|l| l.position)
    }

    pub fn resolve(&self, destination: &Destination) -> Result<Vec3> {
        let site = |name: &str| {
            self.locations
                .get(name)
                .ok_or_else(|| MotionError::UnknownLocation(name.to_string()))
        };
        let named_point = |location: &Location, points: &FxHashMap<String, Vec3>, point: &str| {
            points
                .get(point)
                .map(|offset| location.position + *offset)
                .ok_or_else(|| MotionError::UnknownPoint {
                    location: location.name.clone(),
                    point: point.to_string(),
                })
        };
        match destination {
            Destination::Location(name) => Ok(site(name)?.position),
            Destination::Point(point) => Ok(*point),
            Destination::EntryPoint {
                location,
                entry_point,
            } => {
                let location = site(location)?;
                named_point(location, &location.entry_points, entry_point)
            }
            Destination::ExitPoint {
                location,
                exit_point,
            } => {
                let location = site(location)?;
                named_point(location, &location.exit_points, exit_point)
            }
        }
    }

    /// Track from `start` to `destination`.
    ///
    /// When the object sits at a named location with a predefined route to
    /// the destination's location, that route's waypoints are used and the
    /// track ends at the destination itself; otherwise the track is a
    /// straight line.
    pub fn track(
        &self,
        start: Vec3,
        current: Option<&str>,
        destination: &Destination,
    ) -> Result<Rc<dyn Track>> {
        let end = self.resolve(destination)?;
        let waypoints = match (current, destination.location()) {
            (Some(from), Some(to)) => self.route(from, to),
            _ => None,
        };
        let track = match waypoints {
            Some(waypoints) => PolylineTrack::new(start, waypoints, end),
            None => PolylineTrack::straight(start, end),
        };
        Ok(Rc::new(track))
    }

    fn route(&self, from: &str, to: &str) -> Option<Vec<Vec3>> {
        let key = |a: &str, b: &str| (a.to_string(), b.to_string());
        if let Some(waypoints) = self.tracks.get(&key(from, to)) {
            return Some(waypoints.clone());
        }
        let reversed = self.tracks.get(&key(to, from))?;
        Some(reversed.iter().rev().copied().collect())
    }
}
