use crate::scenario::Step;
use anyhow::{Context, Result};
use kinesis_core::{
    geometry::Vec3,
    layout::{Destination, LayoutConfig, Location},
    object::KinematicLimits,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// A complete scenario: layout, objects and their scripts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulation configuration
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Named locations and the tracks between them
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Objects to spawn, in task order
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Simulation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Virtual time at which the run stops, even if scripts are unfinished
    #[serde(default)]
    pub stop_at: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub name: String,

    /// Initial position, ignored when `location` is set
    #[serde(default)]
    pub position: Vec3,

    /// Named location to start at
    #[serde(default)]
    pub location: Option<String>,

    /// Initial yaw in radians
    #[serde(default)]
    pub heading: f64,

    /// Fallbacks for parameters a move leaves unset
    #[serde(default)]
    pub limits: KinematicLimits,

    #[serde(default)]
    pub script: Vec<Step>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file, auto-detecting TOML or JSON format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content).or_else(|_| Self::from_json(&content)),
        }
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse scenario as TOML")
    }

    /// Parse configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse scenario as JSON")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(stop_at) = self.simulation.stop_at {
            if !(stop_at.is_finite() && stop_at >= 0.0) {
                anyhow::bail!("simulation.stop_at must be a non-negative number");
            }
        }

        let mut locations = FxHashMap::default();
        for location in &self.layout.locations {
            if locations.insert(location.name.as_str(), location).is_some() {
                anyhow::bail!("duplicate location name {:?}", location.name);
            }
        }
        for track in &self.layout.tracks {
            for end in [&track.from, &track.to] {
                if !locations.contains_key(end.as_str()) {
                    anyhow::bail!(
                        "track {} -> {} references unknown location {end:?}",
                        track.from,
                        track.to
                    );
                }
            }
        }

        let mut names = FxHashSet::default();
        for object in &self.objects {
            if object.name.is_empty() {
                anyhow::bail!("object names cannot be empty");
            }
            if !names.insert(object.name.as_str()) {
                anyhow::bail!("duplicate object name {:?}", object.name);
            }
        }

        for object in &self.objects {
            let name = &object.name;
            if let Some(location) = &object.location {
                if !locations.contains_key(location.as_str()) {
                    anyhow::bail!("object {name:?} starts at unknown location {location:?}");
                }
            }
            validate_limits(&object.limits).with_context(|| format!("object {name:?}"))?;
            for (index, step) in object.script.iter().enumerate() {
                validate_step(step, &locations, &names)
                    .with_context(|| format!("step {index} of object {name:?}"))?;
            }
        }

        Ok(())
    }
}

fn validate_limits(limits: &KinematicLimits) -> Result<()> {
    if limits.acceleration.is_some_and(|a| a.is_nan() || a < 0.0) {
        anyhow::bail!("limits.acceleration cannot be negative");
    }
    if limits.deceleration.is_some_and(|d| d.is_nan() || d > 0.0) {
        anyhow::bail!("limits.deceleration cannot be positive");
    }
    if limits.max_speed.is_some_and(|v| v.is_nan() || v < 0.0) {
        anyhow::bail!("limits.max_speed cannot be negative");
    }
    Ok(())
}

fn validate_destination(destination: &Destination, locations: &FxHashMap<&str, &Location>) -> Result<()> {
    let Some(name) = destination.location() else {
        return Ok(());
    };
    let Some(location) = locations.get(name) else {
        anyhow::bail!("unknown location {name:?}");
    };
    match destination {
        Destination::EntryPoint { entry_point, .. } if !location.entry_points.contains_key(entry_point) => {
            anyhow::bail!("location {name:?} has no entry point {entry_point:?}")
        }
        Destination::ExitPoint { exit_point, .. } if !location.exit_points.contains_key(exit_point) => {
            anyhow::bail!("location {name:?} has no exit point {exit_point:?}")
        }
        _ => Ok(()),
    }
}

fn validate_step(
    step: &Step,
    locations: &FxHashMap<&str, &Location>,
    objects: &FxHashSet<&str>,
) -> Result<()> {
    let known_object = |name: &str| {
        if objects.contains(name) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("unknown object {name:?}"))
        }
    };

    match step {
        Step::Move(step) | Step::MoveConcurrent(step) => {
            validate_destination(&step.to, locations)?;
            if step.duration.is_some_and(|d| d.is_nan() || d < 0.0) {
                anyhow::bail!("duration cannot be negative");
            }
        }
        Step::Rotate(step) | Step::RotateConcurrent(step) => {
            if step.duration.is_nan() || step.duration < 0.0 {
                anyhow::bail!("duration cannot be negative");
            }
        }
        Step::Wait { seconds } => {
            if seconds.is_nan() || *seconds < 0.0 {
                anyhow::bail!("wait cannot be negative");
            }
        }
        Step::CancelMove { target } | Step::CancelRotate { target } => {
            if let Some(target) = target {
                known_object(target.as_str())?;
            }
        }
        Step::Attach { to } => known_object(to.as_str())?,
        Step::Teleport { to } => validate_destination(to, locations)?,
        Step::SetLimits(limits) => {
            validate_limits(limits)?;
            let zero = [limits.acceleration, limits.deceleration, limits.max_speed]
                .contains(&Some(0.0));
            if zero {
                anyhow::bail!("limits set at run time must be nonzero");
            }
        }
        Step::Detach | Step::ResetRotation => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[logging]
level = "debug"

[simulation]
stop_at = 60.0

[layout]
locations = [
    { name = "dock", position = [0.0, 0.0, 0.0] },
    { name = "bay", position = [10.0, 0.0, 10.0] },
]
tracks = [{ from = "dock", to = "bay", waypoints = [[10.0, 0.0, 0.0]] }]

[[objects]]
name = "forklift"
location = "dock"
limits = { acceleration = 1.0, deceleration = -2.0, max_speed = 3.0 }
script = [{ op = "move", to = "bay" }]
"#;

        let config = Config::from_toml(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.simulation.stop_at, Some(60.0));
        assert_eq!(config.layout.tracks[0].waypoints, vec![Vec3::new(10.0, 0.0, 0.0)]);
        assert_eq!(config.objects[0].limits.deceleration, Some(-2.0));
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "layout": {
                "locations": [{ "name": "dock", "position": [0.0, 0.0, 0.0] }]
            },
            "objects": [
                {
                    "name": "drone",
                    "position": [0.0, 5.0, 0.0],
                    "heading": 1.5,
                    "script": [{ "op": "rotate", "axis": "y", "angle": 3.14, "duration": 2.0 }]
                }
            ]
        }"#;

        let config = Config::from_json(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.objects[0].position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(config.objects[0].heading, 1.5);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.simulation.stop_at, None);
        assert!(config.objects.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            r#"
[[objects]]
name = "a"
[[objects]]
name = "a"
"#,
            r#"
[[objects]]
name = "a"
limits = { deceleration = 2.0 }
"#,
            r#"
[[objects]]
name = "a"
script = [{ op = "move", to = "nowhere" }]
"#,
            r#"
[[objects]]
name = "a"
script = [{ op = "attach", to = "b" }]
"#,
            r#"
[[objects]]
name = "a"
script = [{ op = "wait", seconds = -1.0 }]
"#,
            r#"
[layout]
locations = [
    { name = "dock", position = [0.0, 0.0, 0.0] },
    { name = "dock", position = [5.0, 0.0, 0.0] },
]
"#,
            r#"
[layout]
locations = [{ name = "dock", position = [0.0, 0.0, 0.0], entry_points = { north = [0.0, 0.0, -1.0] } }]

[[objects]]
name = "a"
script = [{ op = "teleport", to = { location = "dock", entry_point = "south" } }]
"#,
            r#"
[[objects]]
name = "a"
script = [{ op = "set_limits", deceleration = 1.0 }]
"#,
        ];
        for case in cases {
            let config = Config::from_toml(case).unwrap();
            assert!(config.validate().is_err(), "accepted {case}");
        }
    }

    #[test]
    fn test_duplicate_locations() {
        let config = Config::from_toml(
            r#"
[layout]
locations = [
    { name = "bay", position = [0.0, 0.0, 0.0] },
    { name = "bay", position = [9.0, 0.0, 0.0] },
]
"#,
        )
        .unwrap();
        let error = config.validate().unwrap_err();
        assert_eq!(error.to_string(), r#"duplicate location name "bay""#);
    }
}
