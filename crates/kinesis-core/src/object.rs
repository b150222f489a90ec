//! A simulated object that can move, rotate and ride on other objects.
//!
//! [`MovableObject`] applies the legality rules from [`crate::state`] and
//! carries out their effects: planning profiles, arming completions,
//! snapshotting in-flight motion and suspending or waking the object's
//! task.

use crate::{
    events::{EventSink, MotionEvent},
    geometry::{Mat3, Pose, Vec3},
    host::{Host, Interrupt, MotionKind, ObjectId, TaskId},
    kinematics::{KinematicsError, MotionParameters},
    profile::{MotionProfile, Rotation},
    scheduler::MotionScheduler,
    state::{Mode, MotionError, MotionFlags, MotionState, Result, Transition},
    track::Track,
};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Defaults used for any parameter a move request leaves unset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicLimits {
    pub acceleration: Option<f64>,
    pub deceleration: Option<f64>,
    pub max_speed: Option<f64>,
}

impl KinematicLimits {
    pub fn as_parameters(&self) -> MotionParameters {
        MotionParameters {
            duration: None,
            max_speed: self.max_speed,
            acceleration: self.acceleration,
            deceleration: self.deceleration,
        }
    }
}

/// How a translation should be planned.
#[derive(Clone, Debug)]
pub enum MovePlan {
    /// Solve the phases along `track` from the given parameters.
    Solve {
        track: Rc<dyn Track>,
        parameters: MotionParameters,
    },
    /// Follow a caller-built profile as is.
    Profile(MotionProfile),
}

/// Whether the calling task must stop and wait after a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suspension {
    Running,
    Suspended,
}

/// How a task suspended by a blocking motion came back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resumed {
    Completed,
    Interrupted {
        reason: Interrupt,
        /// Where the object is when its task wakes.
        position: Vec3,
        /// Angle turned before the rotation was canceled.
        angle: Option<f64>,
    },
}

#[derive(Debug)]
pub struct MovableObject {
    id: ObjectId,
    name: String,
    task: TaskId,
    state: MotionState,
    // world pose while free, offset from the host while attached; during a
    // motion this is the pose the motion started from
    pose: Pose,
    limits: KinematicLimits,
    scheduler: MotionScheduler,
    location: Option<String>,
    heading_for: Option<String>,
    canceled_angle: Option<f64>,
}

impl MovableObject {
    pub fn new(
        id: ObjectId,
        name: impl Into<String>,
        task: TaskId,
        pose: Pose,
        limits: KinematicLimits,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            task,
            state: MotionState::Idle,
            pose,
            limits,
            scheduler: MotionScheduler::new(id),
            location: None,
            heading_for: None,
            canceled_angle: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn flags(&self) -> MotionFlags {
        self.state.flags()
    }

    pub fn limits(&self) -> &KinematicLimits {
        &self.limits
    }

    pub fn scheduler(&self) -> &MotionScheduler {
        &self.scheduler
    }

    /// Named location the object last arrived at, if it has not left since.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub(crate) fn place_at(&mut self, location: Option<String>) {
        self.location = location;
    }

    pub(crate) fn set_heading(&mut self, location: Option<String>) {
        self.heading_for = location;
    }

    /// Pose stored for the object: its offset from the host when attached.
    pub fn committed_pose(&self) -> &Pose {
        &self.pose
    }

    /// Pose at `now` in the frame `committed_pose` is expressed in.
    pub fn pose_at(&self, now: f64) -> Result<Pose> {
        let mut pose = self.pose;
        if let Some(active) = self.scheduler.movement() {
            let elapsed = active.elapsed(now);
            pose.position = active.profile.position_at(elapsed)?;
            if active.path_locked {
                pose = pose.facing(active.profile.direction_at(elapsed)?);
            }
        }
        if let Some(active) = self.scheduler.rotation() {
            let angle = active.rotation.angle_at(active.elapsed(now))?;
            pose = pose.rotated(active.rotation.axis(), angle);
        }
        Ok(pose)
    }

    pub fn speed_at(&self, now: f64) -> Result<f64> {
        match self.scheduler.movement() {
            Some(active) => Ok(active.profile.speed_at(active.elapsed(now))?),
            None => Ok(0.0),
        }
    }

    /// Start, or retarget, a translation.
    ///
    /// A retarget snapshots the in-flight movement and continues from its
    /// current position and speed.
    pub fn start_move<H: Host + ?Sized, S: EventSink + ?Sized>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        plan: Option<MovePlan>,
        mode: Mode,
        path_locked: bool,
    ) -> Result<Suspension> {
        let next = self.state.apply(Transition::StartMove { mode, path_locked })?;
        let plan = plan.ok_or(MotionError::NoDestination)?;
        let now = host.now();
        let current = self.pose_at(now)?;

        let profile = match plan {
            MovePlan::Solve { track, parameters } => {
                let parameters = parameters.or(self.limits.as_parameters());
                MotionProfile::plan(track, self.speed_at(now)?, &parameters)?
            }
            MovePlan::Profile(profile) => {
                if !profile.is_valid() {
                    return Err(KinematicsError::InvalidProfile.into());
                }
                profile
            }
        };

        if let Some(previous) = self.state.translation() {
            self.pose.position = current.position;
            if previous.path_locked {
                self.pose.orientation = current.orientation;
            }
            self.scheduler.take_movement();
            self.cancel_pending(host, MotionKind::Movement);
            sink.push(MotionEvent::MoveInterrupted {
                object: self.id,
                at: now,
                position: current.position,
            });
        }
        self.location = None;

        let track = profile.track().clone();
        let duration = profile.total_duration();
        self.scheduler.begin_movement(host, profile, path_locked);
        self.state = next;

        tracing::info!(object = %self.id, name = %self.name, duration, ?mode, "move started");
        sink.push(MotionEvent::MoveStarted {
            object: self.id,
            at: now,
            from: track.start(),
            to: track.destination(),
            duration,
            path_locked,
        });
        if path_locked {
            let facing = self.pose.facing(track.direction_at(0.0));
            sink.push(MotionEvent::OrientationChanged {
                object: self.id,
                at: now,
                orientation: facing.orientation,
            });
        }
        Ok(self.block(host, mode))
    }

    /// Start a rotation, or retarget a concurrent one.
    pub fn start_rotate<H: Host + ?Sized, S: EventSink + ?Sized>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        rotation: Rotation,
        mode: Mode,
    ) -> Result<Suspension> {
        let next = self.state.apply(Transition::StartRotate { mode })?;
        let now = host.now();

        if self.state.rotation().is_some() {
            let angle = self.commit_rotation(now)?;
            self.cancel_pending(host, MotionKind::Rotation);
            sink.push(MotionEvent::RotateInterrupted {
                object: self.id,
                at: now,
                angle,
            });
        }

        self.scheduler.begin_rotation(host, rotation);
        self.state = next;

        tracing::info!(
            object = %self.id,
            name = %self.name,
            axis = ?rotation.axis(),
            angle = rotation.angle(),
            ?mode,
            "rotation started"
        );
        sink.push(MotionEvent::RotateStarted {
            object: self.id,
            at: now,
            axis: rotation.axis(),
            angle: rotation.angle(),
            duration: rotation.duration(),
        });
        Ok(self.block(host, mode))
    }

    /// Stop the current translation where it is and return that position.
    pub fn cancel_move<H: Host + ?Sized, S: EventSink + ?Sized>(
        &mut self,
        host: &mut H,
        sink: &mut S,
    ) -> Result<Vec3> {
        let next = self.state.apply(Transition::CancelMove)?;
        let translation = self.state.translation().ok_or(MotionError::NotMoving)?;
        let now = host.now();
        let current = self.pose_at(now)?;

        self.pose.position = current.position;
        self.scheduler.take_movement();
        self.cancel_pending(host, MotionKind::Movement);
        self.location = None;
        self.heading_for = None;
        self.state = next;

        tracing::info!(object = %self.id, name = %self.name, position = ?current.position, "move canceled");
        sink.push(MotionEvent::MoveInterrupted {
            object: self.id,
            at: now,
            position: current.position,
        });
        if translation.path_locked {
            self.pose.orientation = current.orientation;
            sink.push(MotionEvent::OrientationChanged {
                object: self.id,
                at: now,
                orientation: current.orientation,
            });
        }
        if translation.mode == Mode::Blocking {
            host.interrupt(self.task, Interrupt::MoveCanceled);
        }
        Ok(current.position)
    }

    /// Stop the current rotation and return the angle turned so far.
    pub fn cancel_rotate<H: Host + ?Sized, S: EventSink + ?Sized>(
        &mut self,
        host: &mut H,
        sink: &mut S,
    ) -> Result<f64> {
        let next = self.state.apply(Transition::CancelRotate)?;
        let mode = self.state.rotation().ok_or(MotionError::NotRotating)?;
        let now = host.now();

        let angle = self.commit_rotation(now)?;
        self.cancel_pending(host, MotionKind::Rotation);
        self.state = next;
        self.canceled_angle = Some(angle);

        tracing::info!(object = %self.id, name = %self.name, angle, "rotation canceled");
        sink.push(MotionEvent::RotateInterrupted {
            object: self.id,
            at: now,
            angle,
        });
        sink.push(MotionEvent::OrientationChanged {
            object: self.id,
            at: now,
            orientation: self.pose.orientation,
        });
        if mode == Mode::Blocking {
            host.interrupt(self.task, Interrupt::RotationCanceled);
        }
        Ok(angle)
    }

    /// Apply the completion of the armed motion of `kind`.
    pub fn complete<H: Host + ?Sized, S: EventSink + ?Sized>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        kind: MotionKind,
    ) -> Result<()> {
        let transition = match kind {
            MotionKind::Movement => Transition::MoveDone,
            MotionKind::Rotation => Transition::RotateDone,
        };
        let spurious = MotionError::SpuriousCompletion { kind };
        let next = self.state.apply(transition)?;
        if self.scheduler.armed().map(|slot| slot.kind) != Some(kind) {
            return Err(spurious);
        }
        let mode = match kind {
            MotionKind::Movement => self.state.translation().map(|t| t.mode),
            MotionKind::Rotation => self.state.rotation(),
        };
        let now = host.now();

        match kind {
            MotionKind::Movement => {
                let active = self.scheduler.take_movement().ok_or(spurious.clone())?;
                let track = active.profile.track();
                self.pose.position = track.destination();
                self.location = self.heading_for.take();
                tracing::info!(object = %self.id, name = %self.name, position = ?self.pose.position, "move completed");
                sink.push(MotionEvent::MoveCompleted {
                    object: self.id,
                    at: now,
                    position: self.pose.position,
                });
                if active.path_locked {
                    self.pose = self.pose.facing(track.direction_at(track.length()));
                    sink.push(MotionEvent::OrientationChanged {
                        object: self.id,
                        at: now,
                        orientation: self.pose.orientation,
                    });
                }
            }
            MotionKind::Rotation => {
                let active = self.scheduler.take_rotation().ok_or(spurious.clone())?;
                let rotation = active.rotation;
                self.pose = self.pose.rotated(rotation.axis(), rotation.angle());
                tracing::info!(object = %self.id, name = %self.name, "rotation completed");
                sink.push(MotionEvent::RotateCompleted {
                    object: self.id,
                    at: now,
                });
                sink.push(MotionEvent::OrientationChanged {
                    object: self.id,
                    at: now,
                    orientation: self.pose.orientation,
                });
            }
        }

        self.state = next;
        self.scheduler
            .completion_fired(host, kind)
            .map_err(|_| spurious)?;
        if mode == Some(Mode::Blocking) {
            host.resume(self.task, now);
        }
        Ok(())
    }

    /// Freeze the offset from `host_pose` and follow the host from now on.
    ///
    /// `world_pose` is the object's current pose in world coordinates.
    pub fn attach<S: EventSink + ?Sized>(
        &mut self,
        sink: &mut S,
        now: f64,
        host: ObjectId,
        world_pose: Pose,
        host_pose: Pose,
    ) -> Result<()> {
        self.state = self.state.apply(Transition::Attach { host })?;
        self.pose = world_pose.relative_to(&host_pose);
        self.location = None;
        tracing::info!(object = %self.id, name = %self.name, %host, "attached");
        sink.push(MotionEvent::Attached {
            object: self.id,
            at: now,
            host,
        });
        Ok(())
    }

    /// Leave the host, keeping `world_pose`. Does nothing when not attached.
    pub fn detach<S: EventSink + ?Sized>(&mut self, sink: &mut S, now: f64, world_pose: Pose) -> Result<()> {
        if self.state.attached_to().is_none() {
            return Ok(());
        }
        self.state = self.state.apply(Transition::Detach)?;
        self.pose = world_pose;
        tracing::info!(object = %self.id, name = %self.name, "detached");
        sink.push(MotionEvent::Detached {
            object: self.id,
            at: now,
            position: world_pose.position,
        });
        Ok(())
    }

    /// Jump to `position` without travelling. `location` names the place
    /// the object landed at, if any.
    pub fn teleport<S: EventSink + ?Sized>(
        &mut self,
        sink: &mut S,
        now: f64,
        position: Vec3,
        location: Option<String>,
    ) -> Result<()> {
        self.state = self.state.apply(Transition::Teleport)?;
        self.pose.position = position;
        self.location = location;
        self.heading_for = None;
        tracing::info!(object = %self.id, name = %self.name, ?position, "teleported");
        sink.push(MotionEvent::Teleported {
            object: self.id,
            at: now,
            position,
        });
        Ok(())
    }

    /// Turn the object back to the identity orientation.
    pub fn reset_rotation<S: EventSink + ?Sized>(&mut self, sink: &mut S, now: f64) -> Result<()> {
        self.state = self.state.apply(Transition::ResetRotation)?;
        self.pose.orientation = Mat3::IDENTITY;
        tracing::debug!(object = %self.id, name = %self.name, "rotation reset");
        sink.push(MotionEvent::OrientationChanged {
            object: self.id,
            at: now,
            orientation: Mat3::IDENTITY,
        });
        Ok(())
    }

    /// Motions already in flight keep the limits they were planned with.
    pub fn set_acceleration(&mut self, acceleration: f64) -> Result<()> {
        if !(acceleration.is_finite() && acceleration > 0.0) {
            return Err(KinematicsError::InvalidInput {
                reason: "acceleration must be positive",
            }
            .into());
        }
        self.limits.acceleration = Some(acceleration);
        Ok(())
    }

    pub fn set_deceleration(&mut self, deceleration: f64) -> Result<()> {
        if !(deceleration.is_finite() && deceleration < 0.0) {
            return Err(KinematicsError::InvalidInput {
                reason: "deceleration must be negative",
            }
            .into());
        }
        self.limits.deceleration = Some(deceleration);
        Ok(())
    }

    pub fn set_max_speed(&mut self, max_speed: f64) -> Result<()> {
        if !(max_speed.is_finite() && max_speed > 0.0) {
            return Err(KinematicsError::InvalidInput {
                reason: "maximum speed must be positive",
            }
            .into());
        }
        self.limits.max_speed = Some(max_speed);
        Ok(())
    }

    /// Replace the limits `limits` sets, leaving the others as they are.
    /// Nothing changes unless every given value is valid.
    pub fn set_limits(&mut self, limits: KinematicLimits) -> Result<()> {
        let previous = self.limits;
        let applied = self.apply_limits(limits);
        if applied.is_err() {
            self.limits = previous;
        }
        applied
    }

    fn apply_limits(&mut self, limits: KinematicLimits) -> Result<()> {
        if let Some(acceleration) = limits.acceleration {
            self.set_acceleration(acceleration)?;
        }
        if let Some(deceleration) = limits.deceleration {
            self.set_deceleration(deceleration)?;
        }
        if let Some(max_speed) = limits.max_speed {
            self.set_max_speed(max_speed)?;
        }
        Ok(())
    }

    /// Tell a task woken after a blocking request why it woke up.
    ///
    /// The position is read at the host's current time, in the frame of
    /// [`MovableObject::committed_pose`].
    pub fn resume_outcome<H: Host + ?Sized>(&self, host: &mut H) -> Result<Resumed> {
        let Some(reason) = host.take_interrupt(self.task) else {
            return Ok(Resumed::Completed);
        };
        let angle = match reason {
            Interrupt::RotationCanceled => self.canceled_angle,
            Interrupt::MoveCanceled => None,
        };
        Ok(Resumed::Interrupted {
            reason,
            position: self.pose_at(host.now())?.position,
            angle,
        })
    }

    fn block<H: Host + ?Sized>(&self, host: &mut H, mode: Mode) -> Suspension {
        match mode {
            Mode::Blocking => {
                host.suspend(self.task);
                Suspension::Suspended
            }
            Mode::Concurrent => Suspension::Running,
        }
    }

    fn commit_rotation(&mut self, now: f64) -> Result<f64> {
        let Some(active) = self.scheduler.rotation() else {
            return Err(MotionError::NotRotating);
        };
        let rotation = active.rotation;
        let angle = rotation.angle_at(active.elapsed(now))?;
        self.scheduler.take_rotation();
        self.pose = self.pose.rotated(rotation.axis(), angle);
        Ok(angle)
    }

    fn cancel_pending<H: Host + ?Sized>(&mut self, host: &mut H, kind: MotionKind) {
        if let Err(warning) = self.scheduler.cancel_completion(host, kind) {
            tracing::warn!(object = %self.id, %warning, "ignoring cancel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::RecordingSink,
        geometry::{Axis, Mat3},
        host::EventScheduler,
        kinematics::Phases,
        sim::{Event, Simulation},
        track::PolylineTrack,
    };
    use std::f64::consts::FRAC_PI_2;

    fn assert_vec_close(actual: Vec3, expected: Vec3) {
        assert!(
            actual.distance(expected) < 1e-6,
            "expected {expected:?}, got {actual:?}"
        );
    }

    fn straight_to(x: f64, y: f64) -> Rc<dyn Track> {
        Rc::new(PolylineTrack::straight(Vec3::ZERO, Vec3::new(x, y, 0.0)))
    }

    fn timed(duration: f64) -> MotionParameters {
        MotionParameters {
            duration: Some(duration),
            ..MotionParameters::default()
        }
    }

    struct Fixture {
        sim: Simulation,
        sink: RecordingSink,
        object: MovableObject,
    }

    impl Fixture {
        fn new(limits: KinematicLimits) -> Self {
            let mut sim = Simulation::new();
            let task = sim.spawn();
            assert_eq!(sim.next_event(), Some(Event::Resume(task)));
            let object = MovableObject::new(ObjectId(0), "cart", task, Pose::default(), limits);
            Self {
                sim,
                sink: RecordingSink::default(),
                object,
            }
        }

        fn start_move(&mut self, plan: MovePlan, mode: Mode) -> Result<Suspension> {
            self.object
                .start_move(&mut self.sim, &mut self.sink, Some(plan), mode, false)
        }

        /// Run until `deadline`, delivering completions along the way.
        fn advance(&mut self, deadline: f64) -> Vec<Event> {
            let mut seen = vec![];
            while let Some(event) = self.sim.next_event_before(deadline) {
                if let Event::Completion(c) = event {
                    self.object
                        .complete(&mut self.sim, &mut self.sink, c.kind)
                        .unwrap();
                }
                seen.push(event);
            }
            seen
        }
    }

    #[test]
    fn cancel_snapshots_blocking_move() {
        let mut f = Fixture::new(KinematicLimits::default());
        let plan = MovePlan::Solve {
            track: straight_to(50.0, 0.0),
            parameters: timed(10.0),
        };
        assert_eq!(f.start_move(plan, Mode::Blocking).unwrap(), Suspension::Suspended);

        f.advance(4.0);
        let snapshot = f.object.cancel_move(&mut f.sim, &mut f.sink).unwrap();
        assert_vec_close(snapshot, Vec3::new(20.0, 0.0, 0.0));
        assert!(f.object.state().is_idle());
        assert_eq!(f.object.scheduler().armed(), None);
        assert_eq!(f.sim.pending_completions().count(), 0);

        let task = f.object.task();
        assert_eq!(f.sim.next_event(), Some(Event::Resume(task)));
        assert_eq!(
            f.object.resume_outcome(&mut f.sim).unwrap(),
            Resumed::Interrupted {
                reason: Interrupt::MoveCanceled,
                position: snapshot,
                angle: None,
            }
        );
        assert!(matches!(
            f.sink.events.last(),
            Some(MotionEvent::MoveInterrupted { .. })
        ));
    }

    #[test]
    fn blocking_move_resumes_on_completion() {
        let mut f = Fixture::new(KinematicLimits::default());
        let plan = MovePlan::Solve {
            track: straight_to(30.0, 40.0),
            parameters: timed(5.0),
        };
        f.start_move(plan, Mode::Blocking).unwrap();

        let task = f.object.task();
        let events = f.advance(6.0);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::Resume(t) if t == task));
        assert_eq!(f.sim.now(), 6.0);
        assert_eq!(f.object.resume_outcome(&mut f.sim).unwrap(), Resumed::Completed);
        assert_eq!(f.object.committed_pose().position, Vec3::new(30.0, 40.0, 0.0));
        assert!(f.object.state().is_idle());
    }

    #[test]
    fn retarget_continues_at_current_speed() {
        let limits = KinematicLimits {
            acceleration: Some(2.0),
            deceleration: Some(-4.0),
            max_speed: Some(10.0),
        };
        let mut f = Fixture::new(limits);
        let plan = MovePlan::Solve {
            track: straight_to(100.0, 0.0),
            parameters: MotionParameters::default(),
        };
        f.start_move(plan, Mode::Concurrent).unwrap();
        f.advance(5.0);
        assert!((f.object.speed_at(5.0).unwrap() - 10.0).abs() < 1e-9);

        let here = f.object.pose_at(f.sim.now()).unwrap().position;
        assert_vec_close(here, Vec3::new(25.0, 0.0, 0.0));
        let detour = Rc::new(PolylineTrack::straight(here, Vec3::new(25.0, 60.0, 0.0)));
        let plan = MovePlan::Solve {
            track: detour,
            parameters: MotionParameters::default(),
        };
        assert_eq!(f.start_move(plan, Mode::Concurrent).unwrap(), Suspension::Running);

        let active = f.object.scheduler().movement().unwrap();
        assert_eq!(active.profile.phases().initial_speed, 10.0);
        assert_eq!(active.started_at, 5.0);
        assert_eq!(f.sim.pending_completions().count(), 1);
        let kinds: Vec<_> = f
            .sink
            .events
            .iter()
            .map(|e| match e {
                MotionEvent::MoveStarted { .. } => "started",
                MotionEvent::MoveInterrupted { .. } => "interrupted",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["started", "interrupted", "started"]);

        f.advance(100.0);
        assert_vec_close(f.object.committed_pose().position, Vec3::new(25.0, 60.0, 0.0));
    }

    #[test]
    fn missing_parameters_leave_object_untouched() {
        let mut f = Fixture::new(KinematicLimits::default());
        let plan = MovePlan::Solve {
            track: straight_to(10.0, 0.0),
            parameters: MotionParameters::default(),
        };
        assert_eq!(
            f.start_move(plan, Mode::Blocking),
            Err(MotionError::Kinematics(KinematicsError::InsufficientParameters))
        );
        assert!(f.object.state().is_idle());
        assert_eq!(f.sim.pending(), 0);
        assert!(f.sink.events.is_empty());
    }

    #[test]
    fn move_needs_a_destination() {
        let mut f = Fixture::new(KinematicLimits::default());
        assert_eq!(
            f.object
                .start_move(&mut f.sim, &mut f.sink, None, Mode::Concurrent, false),
            Err(MotionError::NoDestination)
        );
    }

    #[test]
    fn direct_profile_must_be_valid() {
        let mut f = Fixture::new(KinematicLimits::default());
        let broken = MotionProfile::new(
            straight_to(10.0, 0.0),
            Phases {
                cruise_speed: 2.0,
                ..Phases::default()
            },
        );
        assert_eq!(
            f.start_move(MovePlan::Profile(broken), Mode::Concurrent),
            Err(MotionError::Kinematics(KinematicsError::InvalidProfile))
        );

        let ok = MotionProfile::new(
            straight_to(10.0, 0.0),
            Phases {
                cruise_duration: 5.0,
                cruise_speed: 2.0,
                ..Phases::default()
            },
        );
        f.start_move(MovePlan::Profile(ok), Mode::Concurrent).unwrap();
        f.advance(5.0);
        assert_eq!(f.object.committed_pose().position, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn rotation_while_moving() {
        let mut f = Fixture::new(KinematicLimits::default());
        let plan = MovePlan::Solve {
            track: straight_to(10.0, 0.0),
            parameters: timed(10.0),
        };
        f.start_move(plan, Mode::Concurrent).unwrap();
        let quarter = Rotation::new(Axis::Z, FRAC_PI_2, 2.0).unwrap();
        let suspension = f
            .object
            .start_rotate(&mut f.sim, &mut f.sink, quarter, Mode::Blocking)
            .unwrap();
        assert_eq!(suspension, Suspension::Suspended);

        let half_way = f.object.pose_at(1.0).unwrap();
        assert_vec_close(half_way.position, Vec3::new(1.0, 0.0, 0.0));

        let events = f.advance(3.0);
        assert!(matches!(events[0], Event::Completion(c) if c.kind == MotionKind::Rotation));
        assert!(f.object.flags().is_moving_concurrent());
        assert!(!f.object.flags().is_rotating());
        let expected = Mat3::rotation(Axis::Z, FRAC_PI_2);
        for (row, want) in f.object.committed_pose().orientation.0.iter().zip(expected.0) {
            for (a, b) in row.iter().zip(want) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn cancel_rotation_keeps_partial_angle() {
        let mut f = Fixture::new(KinematicLimits::default());
        let rotation = Rotation::new(Axis::Y, 2.0, 4.0).unwrap();
        f.object
            .start_rotate(&mut f.sim, &mut f.sink, rotation, Mode::Concurrent)
            .unwrap();
        f.advance(1.0);
        let angle = f.object.cancel_rotate(&mut f.sim, &mut f.sink).unwrap();
        assert!((angle - 0.5).abs() < 1e-9);
        assert!(f.object.state().is_idle());
        assert_eq!(
            f.object.cancel_rotate(&mut f.sim, &mut f.sink),
            Err(MotionError::NotRotating)
        );
    }

    #[test]
    fn canceled_rotation_wakes_with_live_position_and_angle() {
        let mut f = Fixture::new(KinematicLimits::default());
        let plan = MovePlan::Solve {
            track: straight_to(10.0, 0.0),
            parameters: timed(10.0),
        };
        f.start_move(plan, Mode::Concurrent).unwrap();
        let turn = Rotation::new(Axis::Z, FRAC_PI_2, 8.0).unwrap();
        f.object
            .start_rotate(&mut f.sim, &mut f.sink, turn, Mode::Blocking)
            .unwrap();

        f.advance(4.0);
        let turned = f.object.cancel_rotate(&mut f.sim, &mut f.sink).unwrap();
        assert!((turned - FRAC_PI_2 / 2.0).abs() < 1e-9);

        let task = f.object.task();
        assert_eq!(f.sim.next_event(), Some(Event::Resume(task)));
        let Resumed::Interrupted {
            reason,
            position,
            angle,
        } = f.object.resume_outcome(&mut f.sim).unwrap()
        else {
            panic!("expected the task to be interrupted");
        };
        assert_eq!(reason, Interrupt::RotationCanceled);
        // the concurrent move is still under way
        assert_vec_close(position, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(angle, Some(turned));
        assert!(f.object.flags().is_moving_concurrent());
    }

    #[test]
    fn completion_late_in_the_run_lands_exactly() {
        let mut f = Fixture::new(KinematicLimits::default());
        let task = f.object.task();
        f.sim.sleep(task, 1.0e9);
        assert_eq!(f.sim.next_event(), Some(Event::Resume(task)));

        let plan = MovePlan::Solve {
            track: straight_to(7.0, 0.0),
            parameters: timed(0.7),
        };
        f.start_move(plan, Mode::Blocking).unwrap();
        let end = f.sim.now() + 0.7;
        // the clock cannot represent the end time exactly
        assert!(end - f.sim.now() > 0.7);
        assert_vec_close(f.object.pose_at(end).unwrap().position, Vec3::new(7.0, 0.0, 0.0));
        assert!((f.object.speed_at(end).unwrap() - 10.0).abs() < 1e-9);

        f.advance(end);
        assert_eq!(f.object.resume_outcome(&mut f.sim).unwrap(), Resumed::Completed);
        assert_eq!(f.object.committed_pose().position, Vec3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn teleport_and_reset_rotation() {
        let mut f = Fixture::new(KinematicLimits::default());
        let spin = Rotation::new(Axis::Y, FRAC_PI_2, 1.0).unwrap();
        f.object
            .start_rotate(&mut f.sim, &mut f.sink, spin, Mode::Concurrent)
            .unwrap();
        assert_eq!(
            f.object.reset_rotation(&mut f.sink, 0.0),
            Err(MotionError::BusyWithMotion {
                kind: MotionKind::Rotation
            })
        );
        f.advance(2.0);
        assert_ne!(f.object.committed_pose().orientation, Mat3::IDENTITY);
        f.object.reset_rotation(&mut f.sink, 2.0).unwrap();
        assert_eq!(f.object.committed_pose().orientation, Mat3::IDENTITY);

        let plan = MovePlan::Solve {
            track: straight_to(10.0, 0.0),
            parameters: timed(10.0),
        };
        f.start_move(plan, Mode::Concurrent).unwrap();
        let target = Vec3::new(0.0, 0.0, 5.0);
        assert_eq!(
            f.object.teleport(&mut f.sink, 2.0, target, None),
            Err(MotionError::BusyWithMotion {
                kind: MotionKind::Movement
            })
        );
        f.object.cancel_move(&mut f.sim, &mut f.sink).unwrap();
        f.object
            .teleport(&mut f.sink, 2.0, target, Some("pad".into()))
            .unwrap();
        assert_eq!(f.object.committed_pose().position, target);
        assert_eq!(f.object.location(), Some("pad"));
        assert!(matches!(
            f.sink.events.last(),
            Some(MotionEvent::Teleported { position, .. }) if *position == target
        ));

        f.object
            .attach(&mut f.sink, 2.0, ObjectId(1), Pose::default(), Pose::default())
            .unwrap();
        assert_eq!(
            f.object.teleport(&mut f.sink, 2.0, Vec3::ZERO, None),
            Err(MotionError::AlreadyAttached { host: ObjectId(1) })
        );
        assert_eq!(
            f.object.reset_rotation(&mut f.sink, 2.0),
            Err(MotionError::AlreadyAttached { host: ObjectId(1) })
        );
    }

    #[test]
    fn limits_can_change_between_moves() {
        let mut f = Fixture::new(KinematicLimits::default());
        assert!(f.object.set_acceleration(0.0).is_err());
        assert!(f.object.set_deceleration(2.0).is_err());
        assert!(f.object.set_max_speed(f64::NAN).is_err());
        assert_eq!(f.object.limits(), &KinematicLimits::default());

        f.object.set_max_speed(5.0).unwrap();
        let plan = MovePlan::Solve {
            track: straight_to(10.0, 0.0),
            parameters: MotionParameters::default(),
        };
        f.start_move(plan, Mode::Concurrent).unwrap();
        let first = f.object.scheduler().movement().unwrap().profile.total_duration();
        assert!((first - 2.0).abs() < 1e-9);

        // applies to the next plan only
        f.object.set_acceleration(1.0).unwrap();
        f.object.set_deceleration(-1.0).unwrap();
        let in_flight = f.object.scheduler().movement().unwrap().profile.total_duration();
        assert_eq!(in_flight, first);
        assert_eq!(
            f.object.limits(),
            &KinematicLimits {
                acceleration: Some(1.0),
                deceleration: Some(-1.0),
                max_speed: Some(5.0),
            }
        );
    }

    #[test]
    fn attached_object_rejects_motion() {
        let mut f = Fixture::new(KinematicLimits::default());
        let host_pose = Pose::at(Vec3::new(5.0, 0.0, 0.0));
        f.object
            .attach(&mut f.sink, 0.0, ObjectId(1), Pose::default(), host_pose)
            .unwrap();
        assert_eq!(
            f.object.committed_pose().position,
            Vec3::new(-5.0, 0.0, 0.0)
        );
        let plan = MovePlan::Solve {
            track: straight_to(1.0, 0.0),
            parameters: timed(1.0),
        };
        assert_eq!(
            f.start_move(plan, Mode::Concurrent),
            Err(MotionError::AlreadyAttached { host: ObjectId(1) })
        );
        assert_eq!(
            f.object.complete(&mut f.sim, &mut f.sink, MotionKind::Movement),
            Err(MotionError::SpuriousCompletion {
                kind: MotionKind::Movement
            })
        );
        f.object
            .detach(&mut f.sink, 0.0, Pose::at(Vec3::new(7.0, 0.0, 0.0)))
            .unwrap();
        assert!(f.object.state().is_idle());
        assert_eq!(f.object.committed_pose().position, Vec3::new(7.0, 0.0, 0.0));
    }
}
