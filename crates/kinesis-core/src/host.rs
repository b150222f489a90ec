//! Interface to the discrete-event host.
//!
//! The motion core never owns a clock or an agenda. It asks the host to
//! schedule [`Completion`]s in virtual time and to suspend, resume or
//! interrupt the cooperative task that drives each object.

use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(pub usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

/// Ticket for a scheduled completion, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionKind {
    Movement,
    Rotation,
}

impl fmt::Display for MotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionKind::Movement => f.write_str("movement"),
            MotionKind::Rotation => f.write_str("rotation"),
        }
    }
}

/// "The motion of this kind on this object has finished."
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    pub object: ObjectId,
    pub kind: MotionKind,
}

/// Why a suspended task was woken early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interrupt {
    MoveCanceled,
    RotationCanceled,
}

pub trait EventScheduler {
    /// Current virtual time in seconds.
    fn now(&self) -> f64;

    /// Deliver `completion` after `delay` seconds of virtual time.
    fn schedule(&mut self, completion: Completion, delay: f64) -> Handle;

    /// Withdraw a scheduled completion. Unknown or fired handles are ignored.
    fn cancel(&mut self, handle: Handle);
}

pub trait Cooperative {
    fn suspend(&mut self, task: TaskId);

    /// Make a suspended task runnable again at virtual time `at`.
    fn resume(&mut self, task: TaskId, at: f64);

    /// Wake a suspended task immediately, recording `reason`.
    fn interrupt(&mut self, task: TaskId, reason: Interrupt);

    fn is_interrupted(&self, task: TaskId) -> bool;

    /// Consume the pending interrupt reason, if any.
    fn take_interrupt(&mut self, task: TaskId) -> Option<Interrupt>;
}

/// Everything the motion core needs from its host.
pub trait Host: EventScheduler + Cooperative {}

impl<T: EventScheduler + Cooperative + ?Sized> Host for T {}
