//! Scripted scenarios on the reference simulation host.
//!
//! Every object gets one cooperative task that walks through its script.
//! A blocking step suspends the task until the motion completes or is
//! canceled; a `wait` step sleeps for a fixed amount of virtual time.

use crate::config::Config;
use anyhow::{Context, Result};
use kinesis_core::{
    events::{MotionEvent, RecordingSink, Tee, TracingSink},
    geometry::{Axis, Mat3, Pose, Vec3},
    host::{EventScheduler, ObjectId, TaskId},
    kinematics::MotionParameters,
    layout::{Destination, Layout},
    object::{KinematicLimits, Resumed, Suspension},
    profile::Rotation,
    sim::{Event, Simulation},
    state::{Mode, MotionState},
    world::{MoveRequest, World},
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveStep {
    pub to: Destination,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub acceleration: Option<f64>,
    #[serde(default)]
    pub deceleration: Option<f64>,
    #[serde(default)]
    pub lock_orientation: bool,
}

impl MoveStep {
    fn request(&self) -> MoveRequest {
        MoveRequest {
            destination: Some(self.to.clone()),
            parameters: MotionParameters {
                duration: self.duration,
                max_speed: self.max_speed,
                acceleration: self.acceleration,
                deceleration: self.deceleration,
            },
            lock_orientation: self.lock_orientation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotateStep {
    pub axis: Axis,
    /// Radians.
    pub angle: f64,
    pub duration: f64,
}

/// One instruction in an object's script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Move(MoveStep),
    MoveConcurrent(MoveStep),
    Rotate(RotateStep),
    RotateConcurrent(RotateStep),
    Wait {
        seconds: f64,
    },
    /// Cancel the translation of `target`, or of the scripted object itself.
    CancelMove {
        #[serde(default)]
        target: Option<String>,
    },
    CancelRotate {
        #[serde(default)]
        target: Option<String>,
    },
    Attach {
        to: String,
    },
    Detach,
    /// Jump to a location, one of its entry or exit points, or a point.
    Teleport {
        to: Destination,
    },
    ResetRotation,
    /// Change the fallback limits for later moves.
    SetLimits(KinematicLimits),
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectReport {
    pub name: String,
    pub position: Vec3,
    pub orientation: Mat3,
    pub state: MotionState,
    pub location: Option<String>,
}

/// A step that was rejected while the scenario ran.
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub object: String,
    pub at: f64,
    pub step: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub end_time: f64,
    pub objects: Vec<ObjectReport>,
    pub failures: Vec<StepFailure>,
    pub events: Vec<MotionEvent>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "finished at t={:.3}s", self.end_time)?;
        for object in &self.objects {
            let Vec3 { x, y, z } = object.position;
            write!(f, "  {:<12} ({x:.3}, {y:.3}, {z:.3})", object.name)?;
            if let Some(location) = &object.location {
                write!(f, " at {location}")?;
            }
            if object.state != MotionState::Idle {
                write!(f, " [{:?}]", object.state)?;
            }
            writeln!(f)?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  step {} of {} failed at t={:.3}s: {}",
                failure.step, failure.object, failure.at, failure.error
            )?;
        }
        write!(f, "{} motion events", self.events.len())
    }
}

enum Flow {
    Continue,
    Yield,
}

struct Script {
    object: ObjectId,
    steps: Vec<Step>,
    next: usize,
}

type Sink = Tee<RecordingSink, TracingSink>;

pub struct Runner {
    sim: Simulation,
    world: World<Sink>,
    // indexed by task id
    scripts: Vec<Script>,
    failures: Vec<StepFailure>,
    stop_at: Option<f64>,
}

impl Runner {
    pub fn new(config: &Config) -> Result<Self> {
        let layout = Layout::new(&config.layout).context("invalid layout")?;
        let mut sim = Simulation::new();
        let mut world = World::new(layout, Tee(RecordingSink::default(), TracingSink));
        let mut scripts = Vec::with_capacity(config.objects.len());

        for object in &config.objects {
            let task = sim.spawn();
            let orientation = Pose::default().rotated(Axis::Y, object.heading);
            let id = match &object.location {
                Some(location) => world.spawn_at(
                    object.name.as_str(),
                    task,
                    location,
                    orientation,
                    object.limits,
                )?,
                None => world.spawn(
                    object.name.as_str(),
                    task,
                    Pose {
                        position: object.position,
                        ..orientation
                    },
                    object.limits,
                ),
            };
            debug_assert_eq!(task.0, scripts.len());
            scripts.push(Script {
                object: id,
                steps: object.script.clone(),
                next: 0,
            });
        }

        Ok(Self {
            sim,
            world,
            scripts,
            failures: vec![],
            stop_at: config.simulation.stop_at,
        })
    }

    /// Run every script to its end, or until the configured horizon.
    pub fn run(mut self) -> Result<Report> {
        let horizon = self.stop_at.unwrap_or(f64::INFINITY);
        tracing::info!(objects = self.scripts.len(), stop_at = ?self.stop_at, "scenario started");

        while let Some(event) = self.sim.next_event_before(horizon) {
            match event {
                Event::Completion(completion) => {
                    // the simulation withdraws canceled completions, so a
                    // rejected one means the bookkeeping is broken
                    if let Err(error) = self.world.complete(&mut self.sim, completion) {
                        tracing::error!(%error, ?completion, "completion rejected");
                        return Err(error)
                            .with_context(|| format!("unexpected completion {completion:?}"));
                    }
                }
                Event::Resume(task) => self.resume(task)?,
            }
        }

        let end_time = self.sim.now();
        tracing::info!(end_time, failures = self.failures.len(), "scenario finished");
        self.report(end_time)
    }

    fn resume(&mut self, task: TaskId) -> Result<()> {
        let Some(script) = self.scripts.get(task.0) else {
            return Ok(());
        };
        let object = script.object;
        if let Resumed::Interrupted {
            reason,
            position,
            angle,
        } = self.world.resume_outcome(&mut self.sim, object)?
        {
            tracing::info!(%object, ?reason, ?position, ?angle, "woken by cancellation");
        }

        loop {
            let script = &mut self.scripts[task.0];
            let Some(step) = script.steps.get(script.next).cloned() else {
                self.sim.finish(task);
                return Ok(());
            };
            let index = script.next;
            script.next += 1;

            match self.execute(task, object, &step) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Yield) => return Ok(()),
                Err(error) => {
                    let name = self.world.object(object)?.name().to_string();
                    tracing::warn!(object = %name, step = index, ?step, %error, "step failed");
                    self.failures.push(StepFailure {
                        object: name,
                        at: self.sim.now(),
                        step: index,
                        error: format!("{error:#}"),
                    });
                }
            }
        }
    }

    fn execute(&mut self, task: TaskId, object: ObjectId, step: &Step) -> Result<Flow> {
        let now = self.sim.now();
        let suspension = match step {
            Step::Move(step) => {
                self.world
                    .move_to(&mut self.sim, object, step.request(), Mode::Blocking)?
            }
            Step::MoveConcurrent(step) => {
                self.world
                    .move_to(&mut self.sim, object, step.request(), Mode::Concurrent)?
            }
            Step::Rotate(step) => self.rotate(object, step, Mode::Blocking)?,
            Step::RotateConcurrent(step) => self.rotate(object, step, Mode::Concurrent)?,
            Step::Wait { seconds } => {
                self.sim.sleep(task, *seconds);
                Suspension::Suspended
            }
            Step::CancelMove { target } => {
                let target = self.target(object, target.as_deref())?;
                self.world.cancel_move(&mut self.sim, target)?;
                Suspension::Running
            }
            Step::CancelRotate { target } => {
                let target = self.target(object, target.as_deref())?;
                self.world.cancel_rotate(&mut self.sim, target)?;
                Suspension::Running
            }
            Step::Attach { to } => {
                let host = self.target(object, Some(to))?;
                self.world.attach(now, object, host)?;
                Suspension::Running
            }
            Step::Detach => {
                self.world.detach(now, object)?;
                Suspension::Running
            }
            Step::Teleport { to } => {
                self.world.teleport(now, object, to)?;
                Suspension::Running
            }
            Step::ResetRotation => {
                self.world.reset_rotation(now, object)?;
                Suspension::Running
            }
            Step::SetLimits(limits) => {
                self.world.set_limits(object, *limits)?;
                Suspension::Running
            }
        };
        Ok(match suspension {
            Suspension::Running => Flow::Continue,
            Suspension::Suspended => Flow::Yield,
        })
    }

    fn rotate(&mut self, object: ObjectId, step: &RotateStep, mode: Mode) -> Result<Suspension> {
        let rotation = Rotation::new(step.axis, step.angle, step.duration)?;
        Ok(self.world.rotate(&mut self.sim, object, rotation, mode)?)
    }

    fn target(&self, object: ObjectId, name: Option<&str>) -> Result<ObjectId> {
        match name {
            Some(name) => self
                .world
                .find(name)
                .with_context(|| format!("unknown object {name:?}")),
            None => Ok(object),
        }
    }

    fn report(self, end_time: f64) -> Result<Report> {
        let mut objects = vec![];
        for object in self.world.objects() {
            let pose = self.world.pose(object.id(), end_time)?;
            objects.push(ObjectReport {
                name: object.name().to_string(),
                position: pose.position,
                orientation: pose.orientation,
                state: object.state(),
                location: object.location().map(str::to_string),
            });
        }
        let Tee(recording, _) = self.world.into_sink();
        Ok(Report {
            end_time,
            objects,
            failures: self.failures,
            events: recording.events,
        })
    }
}

/// Build a runner for `config` and run it to the end.
pub fn run(config: &Config) -> Result<Report> {
    Runner::new(config)?.run()
}
