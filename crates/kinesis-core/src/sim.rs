//! A minimal single-threaded discrete-event host.
//!
//! Entries are kept in a min-heap ordered by virtual time, ties broken by
//! insertion order. Cancellation is lazy: the handle is forgotten and the
//! heap entry is skipped when it surfaces.

use crate::host::{Completion, Cooperative, EventScheduler, Handle, Interrupt, TaskId};
use rustc_hash::FxHashMap;
use std::{cmp::Ordering, collections::BinaryHeap};

/// What the simulation hands back to its driver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// The task may run its next step.
    Resume(TaskId),
    Completion(Completion),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Ready,
    Running,
    Suspended,
    Finished,
}

#[derive(Clone, Copy, Debug)]
enum Scheduled {
    Completion(Completion),
    Wake(TaskId),
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    at: f64,
    handle: Handle,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // reversed so the max-heap yields the earliest entry
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.handle.0.cmp(&self.handle.0))
    }
}

#[derive(Debug)]
struct Task {
    status: TaskStatus,
    interrupt: Option<Interrupt>,
    wake: Option<Handle>,
}

#[derive(Debug, Default)]
pub struct Simulation {
    now: f64,
    next_handle: u64,
    agenda: BinaryHeap<Entry>,
    scheduled: FxHashMap<Handle, Scheduled>,
    tasks: Vec<Task>,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task that becomes runnable immediately.
    pub fn spawn(&mut self) -> TaskId {
        let task = TaskId(self.tasks.len());
        self.tasks.push(Task {
            status: TaskStatus::Suspended,
            interrupt: None,
            wake: None,
        });
        self.resume(task, self.now);
        task
    }

    /// Suspend `task` and wake it after `delay`.
    pub fn sleep(&mut self, task: TaskId, delay: f64) {
        self.suspend(task);
        self.resume(task, self.now + delay.max(0.0));
    }

    pub fn finish(&mut self, task: TaskId) {
        if let Some(wake) = self.tasks[task.0].wake.take() {
            self.scheduled.remove(&wake);
        }
        self.tasks[task.0].status = TaskStatus::Finished;
    }

    pub fn status(&self, task: TaskId) -> TaskStatus {
        self.tasks[task.0].status
    }

    /// Number of live entries on the agenda.
    pub fn pending(&self) -> usize {
        self.scheduled.len()
    }

    /// Scheduled completions, in no particular order.
    pub fn pending_completions(&self) -> impl Iterator<Item = Completion> + '_ {
        self.scheduled.values().filter_map(|s| match s {
            Scheduled::Completion(c) => Some(*c),
            Scheduled::Wake(_) => None,
        })
    }

    /// Pop the next live entry and advance the clock to it.
    pub fn next_event(&mut self) -> Option<Event> {
        while let Some(entry) = self.agenda.pop() {
            if let Some(event) = self.fire(entry) {
                return Some(event);
            }
        }
        None
    }

    /// Like [`Simulation::next_event`], but never past `deadline`. When
    /// nothing is due by then the clock is moved to `deadline`.
    pub fn next_event_before(&mut self, deadline: f64) -> Option<Event> {
        while let Some(entry) = self.agenda.peek().copied() {
            if entry.at > deadline {
                break;
            }
            self.agenda.pop();
            if let Some(event) = self.fire(entry) {
                return Some(event);
            }
        }
        if deadline.is_finite() {
            self.now = self.now.max(deadline);
        }
        None
    }

    fn fire(&mut self, entry: Entry) -> Option<Event> {
        let scheduled = self.scheduled.remove(&entry.handle)?;
        self.now = self.now.max(entry.at);
        match scheduled {
            Scheduled::Completion(completion) => {
                tracing::debug!(now = self.now, ?completion, "completion fired");
                Some(Event::Completion(completion))
            }
            Scheduled::Wake(task) => {
                let slot = &mut self.tasks[task.0];
                slot.wake = None;
                if slot.status != TaskStatus::Ready {
                    return None;
                }
                slot.status = TaskStatus::Running;
                Some(Event::Resume(task))
            }
        }
    }

    fn push(&mut self, scheduled: Scheduled, delay: f64) -> Handle {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        self.agenda.push(Entry {
            at: self.now + delay.max(0.0),
            handle,
        });
        self.scheduled.insert(handle, scheduled);
        handle
    }

    fn wake(&mut self, task: TaskId, delay: f64) {
        if let Some(previous) = self.tasks[task.0].wake.take() {
            self.scheduled.remove(&previous);
        }
        let handle = self.push(Scheduled::Wake(task), delay);
        let slot = &mut self.tasks[task.0];
        slot.wake = Some(handle);
        slot.status = TaskStatus::Ready;
    }
}

impl EventScheduler for Simulation {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, completion: Completion, delay: f64) -> Handle {
        let handle = self.push(Scheduled::Completion(completion), delay);
        tracing::debug!(now = self.now, delay, ?completion, ?handle, "completion scheduled");
        handle
    }

    fn cancel(&mut self, handle: Handle) {
        if self.scheduled.remove(&handle).is_some() {
            tracing::debug!(now = self.now, ?handle, "completion canceled");
        }
    }
}

impl Cooperative for Simulation {
    fn suspend(&mut self, task: TaskId) {
        self.tasks[task.0].status = TaskStatus::Suspended;
    }

    fn resume(&mut self, task: TaskId, at: f64) {
        if self.tasks[task.0].status == TaskStatus::Suspended {
            self.wake(task, at - self.now);
        }
    }

    fn interrupt(&mut self, task: TaskId, reason: Interrupt) {
        self.tasks[task.0].interrupt = Some(reason);
        if self.tasks[task.0].status == TaskStatus::Suspended {
            self.wake(task, 0.0);
        }
    }

    fn is_interrupted(&self, task: TaskId) -> bool {
        self.tasks[task.0].interrupt.is_some()
    }

    fn take_interrupt(&mut self, task: TaskId) -> Option<Interrupt> {
        self.tasks[task.0].interrupt.take()
    }
}
