//! Per-object completion bookkeeping.
//!
//! An object has at most one completion registered with the host (the
//! armed slot) and at most one more held back (the buffered slot). The
//! armed completion always has the earlier deadline, so the host never
//! delivers a later completion ahead of an earlier one for the same
//! object.

use crate::{
    host::{Completion, EventScheduler, Handle, MotionKind, ObjectId},
    profile::{MotionProfile, Rotation},
};
use thiserror::Error;

/// Cancel was requested for a completion that is neither armed nor
/// buffered, usually because it already fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("no pending {kind} completion")]
pub struct NoPendingCompletion {
    pub kind: MotionKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slot {
    pub kind: MotionKind,
    pub deadline: f64,
}

#[derive(Clone, Copy, Debug)]
struct Armed {
    slot: Slot,
    handle: Handle,
}

#[derive(Clone, Debug)]
pub struct ActiveMove {
    pub profile: MotionProfile,
    pub started_at: f64,
    pub path_locked: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct ActiveRotation {
    pub rotation: Rotation,
    pub started_at: f64,
}

impl ActiveMove {
    pub fn elapsed(&self, now: f64) -> f64 {
        elapsed_since(self.started_at, now, self.profile.total_duration())
    }
}

impl ActiveRotation {
    pub fn elapsed(&self, now: f64) -> f64 {
        elapsed_since(self.started_at, now, self.rotation.duration())
    }
}

/// Time from `started_at` to `now`. The completion fires at
/// `started_at + duration` as rounded by the clock, so a reading taken then
/// may overshoot `duration` by up to one rounding of `now`; that overshoot
/// is folded back onto `duration`.
fn elapsed_since(started_at: f64, now: f64, duration: f64) -> f64 {
    let elapsed = now - started_at;
    let rounding = now.abs() * f64::EPSILON;
    if elapsed > duration && elapsed - duration <= rounding {
        duration
    } else {
        elapsed
    }
}

#[derive(Debug)]
pub struct MotionScheduler {
    object: ObjectId,
    armed: Option<Armed>,
    buffered: Option<Slot>,
    movement: Option<ActiveMove>,
    rotation: Option<ActiveRotation>,
}

impl MotionScheduler {
    pub fn new(object: ObjectId) -> Self {
        Self {
            object,
            armed: None,
            buffered: None,
            movement: None,
            rotation: None,
        }
    }

    pub fn armed(&self) -> Option<Slot> {
        self.armed.map(|a| a.slot)
    }

    pub fn buffered(&self) -> Option<Slot> {
        self.buffered
    }

    pub fn movement(&self) -> Option<&ActiveMove> {
        self.movement.as_ref()
    }

    pub fn rotation(&self) -> Option<&ActiveRotation> {
        self.rotation.as_ref()
    }

    /// Commit `profile` as the current movement and schedule its completion.
    ///
    /// Any previous movement must already have been canceled or finished.
    pub fn begin_movement<H: EventScheduler + ?Sized>(
        &mut self,
        host: &mut H,
        profile: MotionProfile,
        path_locked: bool,
    ) {
        let delay = profile.total_duration();
        self.movement = Some(ActiveMove {
            profile,
            started_at: host.now(),
            path_locked,
        });
        self.schedule_completion(host, MotionKind::Movement, delay);
    }

    pub fn begin_rotation<H: EventScheduler + ?Sized>(&mut self, host: &mut H, rotation: Rotation) {
        self.rotation = Some(ActiveRotation {
            rotation,
            started_at: host.now(),
        });
        self.schedule_completion(host, MotionKind::Rotation, rotation.duration());
    }

    pub fn take_movement(&mut self) -> Option<ActiveMove> {
        self.movement.take()
    }

    pub fn take_rotation(&mut self) -> Option<ActiveRotation> {
        self.rotation.take()
    }

    /// Register a completion of `kind` due after `delay`, keeping the
    /// earliest deadline armed.
    pub fn schedule_completion<H: EventScheduler + ?Sized>(
        &mut self,
        host: &mut H,
        kind: MotionKind,
        delay: f64,
    ) {
        let slot = Slot {
            kind,
            deadline: host.now() + delay,
        };
        match self.armed {
            None => self.arm(host, slot),
            Some(armed) if slot.deadline > armed.slot.deadline => {
                tracing::debug!(object = %self.object, ?slot, "completion buffered");
                self.buffered = Some(slot);
            }
            Some(armed) => {
                host.cancel(armed.handle);
                tracing::debug!(object = %self.object, displaced = ?armed.slot, "completion buffered");
                self.buffered = Some(armed.slot);
                self.arm(host, slot);
            }
        }
    }

    /// The armed completion of `kind` was delivered. Arms the buffered
    /// completion, if any, for its remaining time.
    pub fn completion_fired<H: EventScheduler + ?Sized>(
        &mut self,
        host: &mut H,
        kind: MotionKind,
    ) -> Result<(), NoPendingCompletion> {
        match self.armed {
            Some(armed) if armed.slot.kind == kind => {
                self.armed = None;
                self.promote(host);
                Ok(())
            }
            _ => Err(NoPendingCompletion { kind }),
        }
    }

    /// Withdraw the pending completion of `kind`, wherever it sits.
    pub fn cancel_completion<H: EventScheduler + ?Sized>(
        &mut self,
        host: &mut H,
        kind: MotionKind,
    ) -> Result<(), NoPendingCompletion> {
        match (self.armed, self.buffered) {
            (Some(armed), _) if armed.slot.kind == kind => {
                host.cancel(armed.handle);
                self.armed = None;
                self.promote(host);
            }
            (_, Some(buffered)) if buffered.kind == kind => {
                self.buffered = None;
            }
            _ => return Err(NoPendingCompletion { kind }),
        }
        tracing::debug!(object = %self.object, %kind, "completion canceled");
        Ok(())
    }

    fn arm<H: EventScheduler + ?Sized>(&mut self, host: &mut H, slot: Slot) {
        let delay = (slot.deadline - host.now()).max(0.0);
        let handle = host.schedule(
            Completion {
                object: self.object,
                kind: slot.kind,
            },
            delay,
        );
        tracing::debug!(object = %self.object, ?slot, delay, "completion armed");
        self.armed = Some(Armed { slot, handle });
    }

    fn promote<H: EventScheduler + ?Sized>(&mut self, host: &mut H) {
        if let Some(slot) = self.buffered.take() {
            self.arm(host, slot);
        }
    }
}
