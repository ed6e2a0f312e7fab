// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed set of tasks that make up the firmware image.
//!
//! Hubris proper generates this enum from the application's TOML
//! manifest at build time. Our application has a small, fixed task
//! list that doesn't change board to board, so it's simply written out
//! by hand here instead of being regenerated by an external packager.

#![no_std]

use abi::TaskId;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "hubpack", derive(hubpack::SerializedSize))]
#[repr(u16)]
pub enum Task {
    Jefe = 0,
    Io = 1,
    Relay = 2,
    Burner = 3,
    Preheater = 4,
    Pump = 5,
    Scheduler = 6,
    Store = 7,
    Faultlog = 8,
    Idle = 9,
}

pub const NUM_TASKS: usize = 10;

impl Task {
    pub const ALL: [Task; NUM_TASKS] = [
        Task::Jefe,
        Task::Io,
        Task::Relay,
        Task::Burner,
        Task::Preheater,
        Task::Pump,
        Task::Scheduler,
        Task::Store,
        Task::Faultlog,
        Task::Idle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Task::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Task::Jefe => "jefe",
            Task::Io => "io",
            Task::Relay => "relay",
            Task::Burner => "burner",
            Task::Preheater => "preheater",
            Task::Pump => "pump",
            Task::Scheduler => "scheduler",
            Task::Store => "store",
            Task::Faultlog => "faultlog",
            Task::Idle => "idle",
        }
    }

    /// Whether this task's continued health is load-bearing for safety:
    /// if it dies and cannot be restarted, the system must fail safe
    /// rather than keep running without it.
    pub fn is_critical(self) -> bool {
        matches!(self, Task::Relay | Task::Burner | Task::Io)
    }

    /// Tasks that must be `RUNNING` before the supervisor starts this
    /// one, per §11's task layout table. `drv-fieldbus` is omitted here
    /// (and from `Task` entirely) since the spec calls it out as the bus
    /// scheduler's client-side API rather than a supervised task of its
    /// own.
    pub fn depends_on(self) -> &'static [Task] {
        match self {
            Task::Jefe => &[],
            Task::Io => &[],
            Task::Relay => &[],
            Task::Burner => &[Task::Io, Task::Relay, Task::Store],
            Task::Preheater => &[Task::Io, Task::Pump],
            Task::Pump => &[Task::Relay, Task::Store],
            Task::Scheduler => &[Task::Burner, Task::Store],
            Task::Store => &[],
            Task::Faultlog => &[Task::Store],
            Task::Idle => &[],
        }
    }
}

/// Resolves the generation-qualified `TaskId` of a task given its raw
/// index and the kernel's current notion of that task's generation.
///
/// Normally this bookkeeping is a side effect of the kernel's restart
/// counter; here we accept it as given since the supervisor is the
/// only caller that needs this.
pub fn task_id_at(index: usize, generation: abi::Generation) -> TaskId {
    TaskId::for_index_and_gen(index, generation)
}
