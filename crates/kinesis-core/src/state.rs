//! Motion state of a single object.
//!
//! The state is a tagged value rather than a set of flags, so that
//! combinations such as "attached and moving" cannot be represented.
//! [`MotionState::apply`] consumes the old state and either returns the
//! next one or the reason the transition is illegal; the caller keeps the
//! old state on error.

use crate::{
    host::{MotionKind, ObjectId},
    kinematics::KinematicsError,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    #[error("object is attached to {host} and cannot move on its own")]
    AlreadyAttached { host: ObjectId },

    #[error("no destination given")]
    NoDestination,

    #[error("object is busy with a {kind}")]
    BusyWithMotion { kind: MotionKind },

    #[error("orientation is locked to the path of the current movement")]
    OrientationLocked,

    #[error("object is not moving")]
    NotMoving,

    #[error("object is not rotating")]
    NotRotating,

    #[error("{kind} completion delivered while no {kind} is in progress")]
    SpuriousCompletion { kind: MotionKind },

    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("unknown location {0:?}")]
    UnknownLocation(String),

    #[error("location {location:?} has no {point:?} point")]
    UnknownPoint { location: String, point: String },

    #[error("location {0:?} is defined more than once")]
    DuplicateLocation(String),

    #[error("attaching {object} to {host} would form a cycle")]
    AttachmentCycle { object: ObjectId, host: ObjectId },

    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
}

pub type Result<T> = std::result::Result<T, MotionError>;

/// Whether the initiating task waits for the motion to finish.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Blocking,
    Concurrent,
}

impl Mode {
    fn merge(self, other: Mode) -> Mode {
        if self == Mode::Blocking || other == Mode::Blocking {
            Mode::Blocking
        } else {
            Mode::Concurrent
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub mode: Mode,
    pub path_locked: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MotionState {
    #[default]
    Idle,
    Moving(Translation),
    Rotating { mode: Mode },
    MovingAndRotating {
        translation: Translation,
        rotation: Mode,
    },
    Attached { host: ObjectId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    StartMove { mode: Mode, path_locked: bool },
    StartRotate { mode: Mode },
    CancelMove,
    CancelRotate,
    MoveDone,
    RotateDone,
    Attach { host: ObjectId },
    Detach,
    /// Jump to a new position without travelling.
    Teleport,
    ResetRotation,
}

impl MotionState {
    pub fn translation(&self) -> Option<Translation> {
        match *self {
            MotionState::Moving(t) => Some(t),
            MotionState::MovingAndRotating { translation, .. } => Some(translation),
            _ => None,
        }
    }

    pub fn rotation(&self) -> Option<Mode> {
        match *self {
            MotionState::Rotating { mode } => Some(mode),
            MotionState::MovingAndRotating { rotation, .. } => Some(rotation),
            _ => None,
        }
    }

    pub fn attached_to(&self) -> Option<ObjectId> {
        match *self {
            MotionState::Attached { host } => Some(host),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == MotionState::Idle
    }

    fn compose(translation: Option<Translation>, rotation: Option<Mode>) -> MotionState {
        match (translation, rotation) {
            (None, None) => MotionState::Idle,
            (Some(t), None) => MotionState::Moving(t),
            (None, Some(mode)) => MotionState::Rotating { mode },
            (Some(translation), Some(rotation)) => MotionState::MovingAndRotating {
                translation,
                rotation,
            },
        }
    }

    pub fn apply(self, transition: Transition) -> Result<MotionState> {
        use MotionState as S;
        use Transition as T;

        if let S::Attached { host } = self {
            return match transition {
                T::Attach { host } => Ok(S::Attached { host }),
                T::Detach => Ok(S::Idle),
                T::StartMove { .. }
                | T::StartRotate { .. }
                | T::Teleport
                | T::ResetRotation => Err(MotionError::AlreadyAttached { host }),
                T::CancelMove => Err(MotionError::NotMoving),
                T::CancelRotate => Err(MotionError::NotRotating),
                T::MoveDone => Err(MotionError::SpuriousCompletion {
                    kind: MotionKind::Movement,
                }),
                T::RotateDone => Err(MotionError::SpuriousCompletion {
                    kind: MotionKind::Rotation,
                }),
            };
        }

        let translation = self.translation();
        let rotation = self.rotation();
        let busy = |kind| Err(MotionError::BusyWithMotion { kind });

        match transition {
            T::StartMove { mode, path_locked } => {
                if rotation == Some(Mode::Blocking) {
                    return busy(MotionKind::Rotation);
                }
                if path_locked && rotation.is_some() {
                    return Err(MotionError::OrientationLocked);
                }
                let mode = translation.map_or(mode, |t| t.mode.merge(mode));
                Ok(S::compose(Some(Translation { mode, path_locked }), rotation))
            }
            T::StartRotate { mode } => {
                match translation {
                    Some(t) if t.mode == Mode::Blocking => return busy(MotionKind::Movement),
                    Some(t) if t.path_locked => return Err(MotionError::OrientationLocked),
                    _ => {}
                }
                match (rotation, mode) {
                    (None, _) => Ok(S::compose(translation, Some(mode))),
                    (Some(Mode::Concurrent), Mode::Concurrent) => Ok(self),
                    (Some(_), _) => busy(MotionKind::Rotation),
                }
            }
            T::CancelMove => match translation {
                Some(_) => Ok(S::compose(None, rotation)),
                None => Err(MotionError::NotMoving),
            },
            T::CancelRotate => match rotation {
                Some(_) => Ok(S::compose(translation, None)),
                None => Err(MotionError::NotRotating),
            },
            T::MoveDone => match translation {
                Some(_) => Ok(S::compose(None, rotation)),
                None => Err(MotionError::SpuriousCompletion {
                    kind: MotionKind::Movement,
                }),
            },
            T::RotateDone => match rotation {
                Some(_) => Ok(S::compose(translation, None)),
                None => Err(MotionError::SpuriousCompletion {
                    kind: MotionKind::Rotation,
                }),
            },
            T::Attach { host } => match (translation, rotation) {
                (None, None) => Ok(S::Attached { host }),
                (Some(_), _) => busy(MotionKind::Movement),
                (None, Some(_)) => busy(MotionKind::Rotation),
            },
            T::Detach => Ok(self),
            T::Teleport => match translation {
                Some(_) => busy(MotionKind::Movement),
                None => Ok(self),
            },
            T::ResetRotation => match (translation, rotation) {
                (_, Some(_)) => busy(MotionKind::Rotation),
                (Some(t), None) if t.path_locked => Err(MotionError::OrientationLocked),
                _ => Ok(self),
            },
        }
    }

    pub fn flags(&self) -> MotionFlags {
        let mut flags = MotionFlags::new();
        if let Some(t) = self.translation() {
            flags = match t.mode {
                Mode::Blocking => flags.with_moving(),
                Mode::Concurrent => flags.with_moving_concurrent(),
            };
            if t.path_locked {
                flags = flags.with_path_locked();
            }
        }
        if let Some(mode) = self.rotation() {
            flags = match mode {
                Mode::Blocking => flags.with_rotating(),
                Mode::Concurrent => flags.with_rotating_concurrent(),
            };
        }
        if self.attached_to().is_some() {
            flags = flags.with_attached();
        }
        flags
    }
}

/// Compact view of a [`MotionState`] for observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MotionFlags(u8);

impl MotionFlags {
    const MOVING: u8 = 1 << 0;
    const MOVING_CONCURRENT: u8 = 1 << 1;
    const ROTATING: u8 = 1 << 2;
    const ROTATING_CONCURRENT: u8 = 1 << 3;
    const ATTACHED: u8 = 1 << 4;
    const PATH_LOCKED: u8 = 1 << 5;

    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn with_moving(mut self) -> Self {
        self.0 |= Self::MOVING;
        self
    }

    pub const fn with_moving_concurrent(mut self) -> Self {
        self.0 |= Self::MOVING_CONCURRENT;
        self
    }

    pub const fn with_rotating(mut self) -> Self {
        self.0 |= Self::ROTATING;
        self
    }

    pub const fn with_rotating_concurrent(mut self) -> Self {
        self.0 |= Self::ROTATING_CONCURRENT;
        self
    }

    pub const fn with_attached(mut self) -> Self {
        self.0 |= Self::ATTACHED;
        self
    }

    pub const fn with_path_locked(mut self) -> Self {
        self.0 |= Self::PATH_LOCKED;
        self
    }

    pub const fn is_moving(&self) -> bool {
        self.0 & Self::MOVING != 0
    }

    pub const fn is_moving_concurrent(&self) -> bool {
        self.0 & Self::MOVING_CONCURRENT != 0
    }

    pub const fn is_rotating(&self) -> bool {
        self.0 & Self::ROTATING != 0
    }

    pub const fn is_rotating_concurrent(&self) -> bool {
        self.0 & Self::ROTATING_CONCURRENT != 0
    }

    pub const fn is_attached(&self) -> bool {
        self.0 & Self::ATTACHED != 0
    }

    pub const fn is_path_locked(&self) -> bool {
        self.0 & Self::PATH_LOCKED != 0
    }
}
