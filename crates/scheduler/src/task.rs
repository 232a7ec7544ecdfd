//! Render task slots
//!
//! Every submitted render gets a slot in a fixed arena, addressed by a
//! [`TaskId`] made of the slot index and a generation counter. Releasing a
//! slot bumps its generation, so an id held past the task's lifetime can
//! never observe or cancel an unrelated task that reuses the slot.
//!
//! ```text
//! Idle -> Queued -> Executing -> Delivered -> Idle
//!            |          |            |
//!            v          v            v
//!          Idle     Cancelled -> Idle   (Cancelled, dropped on receive)
//! ```

/// Handle to a render task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    index: u32,
    generation: u32,
}

impl TaskId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Lifecycle state of a task slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Slot is free for reuse
    Idle,

    /// Waiting in the worker queue
    Queued,

    /// The worker is rendering it
    Executing,

    /// Result sent to the control thread
    Delivered,

    /// Cancelled while executing or after delivery; the result is discarded
    Cancelled,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: TaskState,
}

/// Arena of task slots with a free list
#[derive(Debug, Default)]
pub(crate) struct TaskArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl TaskArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take a free slot, or grow the arena, and mark it queued
    pub(crate) fn allocate(&mut self) -> TaskId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    state: TaskState::Idle,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        debug_assert_eq!(slot.state, TaskState::Idle);
        slot.state = TaskState::Queued;
        TaskId {
            index,
            generation: slot.generation,
        }
    }

    /// Current state of `id`, `None` if the id is stale
    pub(crate) fn state(&self, id: TaskId) -> Option<TaskState> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.state != TaskState::Idle)
            .map(|slot| slot.state)
    }

    /// Move `id` from `from` to `to`; fails if the id is stale or in another state
    pub(crate) fn transition(&mut self, id: TaskId, from: TaskState, to: TaskState) -> bool {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.state == from => {
                slot.state = to;
                true
            }
            _ => false,
        }
    }

    /// Return the slot of `id` to the free list
    pub(crate) fn release(&mut self, id: TaskId) -> bool {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.state != TaskState::Idle => {
                slot.state = TaskState::Idle;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                true
            }
            _ => false,
        }
    }

    /// Number of slots not idle
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Total slots ever created
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }
}
