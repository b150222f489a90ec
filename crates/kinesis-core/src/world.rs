//! A set of objects sharing one layout and one event sink.
//!
//! The world resolves named destinations into tracks, composes the poses
//! of attached objects, and rejects attachments that would form a cycle.

use crate::{
    events::EventSink,
    geometry::{Pose, Vec3},
    host::{Completion, Host, ObjectId, TaskId},
    kinematics::MotionParameters,
    layout::{Destination, Layout},
    object::{KinematicLimits, MovableObject, MovePlan, Resumed, Suspension},
    profile::{MotionProfile, Rotation},
    state::{Mode, MotionError, Result, Transition},
};
use rustc_hash::FxHashMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MoveRequest {
    pub destination: Option<Destination>,
    pub parameters: MotionParameters,
    /// Keep the object's front aligned with the direction of travel.
    pub lock_orientation: bool,
}

#[derive(Debug)]
pub struct World<S> {
    objects: Vec<MovableObject>,
    names: FxHashMap<String, ObjectId>,
    layout: Layout,
    sink: S,
}

impl<S: EventSink> World<S> {
    pub fn new(layout: Layout, sink: S) -> Self {
        Self {
            objects: vec![],
            names: FxHashMap::default(),
            layout,
            sink,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        task: TaskId,
        pose: Pose,
        limits: KinematicLimits,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len());
        let object = MovableObject::new(id, name, task, pose, limits);
        tracing::debug!(%id, name = object.name(), "object spawned");
        self.names.insert(object.name().to_string(), id);
        self.objects.push(object);
        id
    }

    /// Spawn an object resting at a named location.
    pub fn spawn_at(
        &mut self,
        name: impl Into<String>,
        task: TaskId,
        location: &str,
        orientation: Pose,
        limits: KinematicLimits,
    ) -> Result<ObjectId> {
        let position = self
            .layout
            .location(location)
            .ok_or_else(|| MotionError::UnknownLocation(location.to_string()))?;
        let pose = Pose {
            position,
            ..orientation
        };
        let id = self.spawn(name, task, pose, limits);
        self.objects[id.0].place_at(Some(location.to_string()));
        Ok(id)
    }

    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    pub fn object(&self, id: ObjectId) -> Result<&MovableObject> {
        self.objects.get(id.0).ok_or(MotionError::UnknownObject(id))
    }

    pub fn objects(&self) -> impl Iterator<Item = &MovableObject> {
        self.objects.iter()
    }

    /// World pose of `id` at `now`, following any chain of hosts.
    pub fn pose(&self, id: ObjectId, now: f64) -> Result<Pose> {
        let object = self.object(id)?;
        let local = object.pose_at(now)?;
        match object.state().attached_to() {
            Some(host) => Ok(self.pose(host, now)?.compose(&local)),
            None => Ok(local),
        }
    }

    pub fn speed(&self, id: ObjectId, now: f64) -> Result<f64> {
        self.object(id)?.speed_at(now)
    }

    pub fn move_to<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        id: ObjectId,
        request: MoveRequest,
        mode: Mode,
    ) -> Result<Suspension> {
        let now = host.now();
        let object = self.object(id)?;
        object.state().apply(Transition::StartMove {
            mode,
            path_locked: request.lock_orientation,
        })?;

        let mut heading = None;
        let plan = match &request.destination {
            Some(destination) => {
                let start = object.pose_at(now)?.position;
                let track = self.layout.track(start, object.location(), destination)?;
                heading = destination.location().map(str::to_string);
                Some(MovePlan::Solve {
                    track,
                    parameters: request.parameters,
                })
            }
            None => None,
        };

        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        let suspension =
            object.start_move(host, &mut self.sink, plan, mode, request.lock_orientation)?;
        object.set_heading(heading);
        Ok(suspension)
    }

    /// Follow a caller-built profile.
    pub fn move_along<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        id: ObjectId,
        profile: MotionProfile,
        mode: Mode,
        lock_orientation: bool,
    ) -> Result<Suspension> {
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        let plan = Some(MovePlan::Profile(profile));
        let suspension = object.start_move(host, &mut self.sink, plan, mode, lock_orientation)?;
        object.set_heading(None);
        Ok(suspension)
    }

    pub fn rotate<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        id: ObjectId,
        rotation: Rotation,
        mode: Mode,
    ) -> Result<Suspension> {
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.start_rotate(host, &mut self.sink, rotation, mode)
    }

    pub fn cancel_move<H: Host + ?Sized>(&mut self, host: &mut H, id: ObjectId) -> Result<Vec3> {
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.cancel_move(host, &mut self.sink)
    }

    pub fn cancel_rotate<H: Host + ?Sized>(&mut self, host: &mut H, id: ObjectId) -> Result<f64> {
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.cancel_rotate(host, &mut self.sink)
    }

    /// Put `id` at `destination` at once, without planning a motion.
    pub fn teleport(&mut self, now: f64, id: ObjectId, destination: &Destination) -> Result<()> {
        let position = self.layout.resolve(destination)?;
        let location = destination.location().map(str::to_string);
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.teleport(&mut self.sink, now, position, location)
    }

    pub fn reset_rotation(&mut self, now: f64, id: ObjectId) -> Result<()> {
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.reset_rotation(&mut self.sink, now)
    }

    pub fn set_limits(&mut self, id: ObjectId, limits: KinematicLimits) -> Result<()> {
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.set_limits(limits)
    }

    /// Attach `id` to `host`, keeping its current world pose.
    pub fn attach(&mut self, now: f64, id: ObjectId, host: ObjectId) -> Result<()> {
        let cycle = MotionError::AttachmentCycle { object: id, host };
        let mut cursor = Some(host);
        while let Some(current) = cursor {
            if current == id {
                return Err(cycle);
            }
            cursor = self.object(current)?.state().attached_to();
        }

        let world_pose = self.pose(id, now)?;
        let host_pose = self.pose(host, now)?;
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.attach(&mut self.sink, now, host, world_pose, host_pose)
    }

    pub fn detach(&mut self, now: f64, id: ObjectId) -> Result<()> {
        let world_pose = self.pose(id, now)?;
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.detach(&mut self.sink, now, world_pose)
    }

    /// Deliver a completion fired by the host.
    pub fn complete<H: Host + ?Sized>(&mut self, host: &mut H, completion: Completion) -> Result<()> {
        let id = completion.object;
        let object = self.objects.get_mut(id.0).ok_or(MotionError::UnknownObject(id))?;
        object.complete(host, &mut self.sink, completion.kind)
    }

    /// Why the task of `id` woke up, with the position in world coordinates.
    pub fn resume_outcome<H: Host + ?Sized>(&self, host: &mut H, id: ObjectId) -> Result<Resumed> {
        match self.object(id)?.resume_outcome(host)? {
            Resumed::Interrupted { reason, angle, .. } => Ok(Resumed::Interrupted {
                reason,
                position: self.pose(id, host.now())?.position,
                angle,
            }),
            Resumed::Completed => Ok(Resumed::Completed),
        }
    }
}
