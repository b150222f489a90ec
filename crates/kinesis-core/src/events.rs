//! Notifications for observers such as loggers or visualizers.
//!
//! Delivery is fire-and-forget: a sink cannot reject or delay an event.

use crate::{
    geometry::{Axis, Mat3, Vec3},
    host::ObjectId,
};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MotionEvent {
    MoveStarted {
        object: ObjectId,
        at: f64,
        from: Vec3,
        to: Vec3,
        duration: f64,
        path_locked: bool,
    },
    MoveInterrupted {
        object: ObjectId,
        at: f64,
        position: Vec3,
    },
    MoveCompleted {
        object: ObjectId,
        at: f64,
        position: Vec3,
    },
    RotateStarted {
        object: ObjectId,
        at: f64,
        axis: Axis,
        angle: f64,
        duration: f64,
    },
    RotateInterrupted {
        object: ObjectId,
        at: f64,
        angle: f64,
    },
    RotateCompleted {
        object: ObjectId,
        at: f64,
    },
    OrientationChanged {
        object: ObjectId,
        at: f64,
        orientation: Mat3,
    },
    Attached {
        object: ObjectId,
        at: f64,
        host: ObjectId,
    },
    Detached {
        object: ObjectId,
        at: f64,
        position: Vec3,
    },
    Teleported {
        object: ObjectId,
        at: f64,
        position: Vec3,
    },
}

impl MotionEvent {
    pub fn object(&self) -> ObjectId {
        match *self {
            MotionEvent::MoveStarted { object, .. }
            | MotionEvent::MoveInterrupted { object, .. }
            | MotionEvent::MoveCompleted { object, .. }
            | MotionEvent::RotateStarted { object, .. }
            | MotionEvent::RotateInterrupted { object, .. }
            | MotionEvent::RotateCompleted { object, .. }
            | MotionEvent::OrientationChanged { object, .. }
            | MotionEvent::Attached { object, .. }
            | MotionEvent::Detached { object, .. }
            | MotionEvent::Teleported { object, .. } => object,
        }
    }

    pub fn at(&self) -> f64 {
        match *self {
            MotionEvent::MoveStarted { at, .. }
            | MotionEvent::MoveInterrupted { at, .. }
            | MotionEvent::MoveCompleted { at, .. }
            | MotionEvent::RotateStarted { at, .. }
            | MotionEvent::RotateInterrupted { at, .. }
            | MotionEvent::RotateCompleted { at, .. }
            | MotionEvent::OrientationChanged { at, .. }
            | MotionEvent::Attached { at, .. }
            | MotionEvent::Detached { at, .. }
            | MotionEvent::Teleported { at, .. } => at,
        }
    }
}

pub trait EventSink {
    fn push(&mut self, event: MotionEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn push(&mut self, event: MotionEvent) {
        (**self).push(event);
    }
}

/// Keeps every event in memory, mostly for tests and reports.
#[derive(Default, Debug)]
pub struct RecordingSink {
    pub events: Vec<MotionEvent>,
}

impl EventSink for RecordingSink {
    fn push(&mut self, event: MotionEvent) {
        self.events.push(event);
    }
}

/// Forwards events to `tracing` under the `kinesis::events` target.
#[derive(Default, Debug, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn push(&mut self, event: MotionEvent) {
        tracing::info!(
            target: "kinesis::events",
            object = %event.object(),
            at = event.at(),
            ?event,
            "motion event"
        );
    }
}

/// Delivers each event to both sinks.
#[derive(Default, Debug)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn push(&mut self, event: MotionEvent) {
        self.0.push(event.clone());
        self.1.push(event);
    }
}
