// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Implementation of the system supervisor (C12).
//!
//! The supervisor is responsible for:
//!
//! - Bringing tasks up in dependency order at boot, refusing to start a
//!   task ahead of the tasks §11 lists as its dependencies.
//! - Polling every other task's health on a timer and restarting a
//!   failed one with bounded retries and exponential backoff.
//! - Escalating to a system-wide emergency stop when a critical task's
//!   retries are exhausted, or on an explicit request.
//!
//! It's unwise for the supervisor to use `SEND` to another task, ever:
//! a `SEND` to a misbehaving task could block forever, taking out the
//! supervisor along with it. Every action the supervisor takes is
//! either a kernel call (`kipc::*`, which cannot block on a peer) or a
//! notification post, never a blocking IPC to the tasks it watches.

#![no_std]
#![no_main]

use idol_runtime::RequestError;
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use task_ids::{Task, NUM_TASKS};
use task_jefe_api::{JefeError, EMERGENCY_STOP_BIT};
use userlib::*;

include!(concat!(env!("OUT_DIR"), "/jefe_config.rs"));

mod notifications {
    pub const TIMER_BIT: u8 = 0;
    pub const TIMER_MASK: u32 = 1 << TIMER_BIT;
}

/// Health as the supervisor's own restart bookkeeping sees it. Distinct
/// from `abi::TaskState`, which only the kernel can report and which
/// this module consults, but doesn't persist, every poll.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Count)]
enum Health {
    Running,
    /// Faulted, with a restart already scheduled at `retry_deadline`.
    Restarting,
    /// Held: either waiting on an unmet dependency at boot, or given up
    /// on after exhausting its retries (non-critical tasks only).
    Held,
}

impl Health {
    fn as_wire(self) -> u8 {
        match self {
            Health::Running => task_jefe_api::TaskHealth::Running as u8,
            Health::Restarting => task_jefe_api::TaskHealth::Restarting as u8,
            Health::Held => task_jefe_api::TaskHealth::Held as u8,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct TaskRecord {
    health: Health,
    retry_count: u8,
    retry_deadline: u64,
}

impl TaskRecord {
    const fn new() -> Self {
        TaskRecord {
            health: Health::Held,
            retry_count: 0,
            retry_deadline: 0,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    Started(Task),
    DeferredStart(Task),
    Faulted(Task),
    RetryScheduled(Task, u8),
    Restarted(Task),
    RetriesExhausted(Task),
    EmergencyStop,
}

counted_ringbuf!(Trace, 32, Trace::None);

/// Computes a dependency-respecting start order over the fixed task
/// set via repeated fixed-point passes: small and quadratic in the
/// worst case, but `NUM_TASKS` is ten, so that's free. A hand-written
/// dependency table (`Task::depends_on`) that turned out to be cyclic
/// would make this loop stall with some tasks never placed; the
/// fallback below just leaves those tasks absent, rather than
/// looping forever.
fn compute_start_order() -> ([Task; NUM_TASKS], usize) {
    let mut order = [Task::Idle; NUM_TASKS];
    let mut placed = [false; NUM_TASKS];
    let mut count = 0;

    loop {
        let mut progressed = false;
        for &task in Task::ALL.iter() {
            let idx = task.index();
            if placed[idx] {
                continue;
            }
            if task.depends_on().iter().all(|d| placed[d.index()]) {
                order[count] = task;
                placed[idx] = true;
                count += 1;
                progressed = true;
            }
        }
        if !progressed || count == NUM_TASKS {
            break;
        }
    }

    (order, count)
}

fn backoff_ms(retry_count: u8) -> u32 {
    let shifted = (INITIAL_BACKOFF_MS as u64) << retry_count.min(16) as u64;
    shifted.min(MAX_BACKOFF_MS as u64) as u32
}

#[export_name = "main"]
fn main() -> ! {
    let (start_order, start_count) = compute_start_order();
    let mut task_states = [TaskRecord::new(); NUM_TASKS];

    // Jefe is itself; it doesn't get restarted into existence.
    task_states[Task::Jefe.index()].health = Health::Running;

    for &task in &start_order[..start_count] {
        if task == Task::Jefe {
            continue;
        }
        let idx = task.index();
        let deps_ready = task
            .depends_on()
            .iter()
            .all(|d| task_states[d.index()].health == Health::Running);
        if !deps_ready {
            ringbuf_entry!(Trace::DeferredStart(task));
            continue;
        }
        kipc::restart_task(idx, true);
        task_states[idx].health = Health::Running;
        ringbuf_entry!(Trace::Started(task));
    }

    let deadline = sys_get_timer().now + HEALTH_POLL_MS;
    sys_set_timer(Some(deadline), notifications::TIMER_MASK);

    let mut server = ServerImpl {
        state: 0,
        deadline,
        task_states,
        start_order,
        start_count,
        emergency: false,
    };
    let mut buf = [0u8; idl::INCOMING_SIZE];

    loop {
        idol_runtime::dispatch(&mut buf, &mut server);
    }
}

struct ServerImpl {
    state: u16,
    deadline: u64,
    task_states: [TaskRecord; NUM_TASKS],
    start_order: [Task; NUM_TASKS],
    start_count: usize,
    emergency: bool,
}

impl ServerImpl {
    fn broadcast_state(&mut self, new_state: u16) {
        if self.state == new_state {
            return;
        }
        self.state = new_state;
        for (task, mask) in MAILING_LIST {
            let task_id = TaskId::for_index_and_gen(task.index(), Generation::default());
            let task_id = sys_refresh_task_id(task_id);
            sys_post(task_id, mask);
        }
    }

    fn trigger_emergency_stop(&mut self) {
        if self.emergency {
            return;
        }
        self.emergency = true;
        ringbuf_entry!(Trace::EmergencyStop);
        self.broadcast_state(self.state | EMERGENCY_STOP_BIT);
    }

    /// One attempt starting a task that just came up out of a fault or a
    /// deferred boot start, once its dependencies are satisfied and its
    /// backoff window (if any) has elapsed.
    fn on_fault(&mut self, task: Task, now: u64) {
        let idx = task.index();
        ringbuf_entry!(Trace::Faulted(task));

        if self.task_states[idx].retry_count >= MAX_RETRIES {
            ringbuf_entry!(Trace::RetriesExhausted(task));
            if task.is_critical() {
                self.trigger_emergency_stop();
            }
            self.task_states[idx].health = Health::Held;
            return;
        }

        let retry_count = self.task_states[idx].retry_count + 1;
        self.task_states[idx].retry_count = retry_count;
        self.task_states[idx].retry_deadline = now + backoff_ms(retry_count) as u64;
        self.task_states[idx].health = Health::Restarting;
        ringbuf_entry!(Trace::RetryScheduled(task, retry_count));
    }

    fn poll_health(&mut self, now: u64) {
        if self.emergency {
            return;
        }
        for &task in &self.start_order[..self.start_count] {
            if task == Task::Jefe {
                continue;
            }
            let idx = task.index();
            match self.task_states[idx].health {
                Health::Held => {}
                Health::Restarting => {
                    if now >= self.task_states[idx].retry_deadline {
                        let deps_ready = task
                            .depends_on()
                            .iter()
                            .all(|d| self.task_states[d.index()].health == Health::Running);
                        if deps_ready {
                            kipc::restart_task(idx, true);
                            self.task_states[idx].health = Health::Running;
                            ringbuf_entry!(Trace::Restarted(task));
                        }
                    }
                }
                Health::Running => {
                    if let abi::TaskState::Faulted { .. } = kipc::read_task_status(idx) {
                        self.on_fault(task, now);
                    }
                }
            }
        }
    }
}

impl idl::InOrderJefeImpl for ServerImpl {
    fn request_reset(
        &mut self,
        _msg: &userlib::RecvMessage,
    ) -> Result<(), RequestError<core::convert::Infallible>> {
        kipc::system_restart();
    }

    fn get_reset_reason(
        &mut self,
        _msg: &userlib::RecvMessage,
    ) -> Result<u32, RequestError<core::convert::Infallible>> {
        // No hardware reset-cause register is modeled here (board bring-up
        // is out of scope); callers get the "unknown" code.
        Ok(0)
    }

    fn get_state(
        &mut self,
        _msg: &userlib::RecvMessage,
    ) -> Result<u16, RequestError<core::convert::Infallible>> {
        Ok(self.state)
    }

    fn set_state(
        &mut self,
        _msg: &userlib::RecvMessage,
        state: u16,
    ) -> Result<(), RequestError<core::convert::Infallible>> {
        self.broadcast_state(state);
        Ok(())
    }

    fn task_status(
        &mut self,
        _msg: &userlib::RecvMessage,
        task_index: u16,
    ) -> Result<u8, RequestError<JefeError>> {
        let task = Task::from_index(task_index as usize).ok_or(JefeError::InvalidTask)?;
        Ok(self.task_states[task.index()].health.as_wire())
    }

    fn emergency_stop(
        &mut self,
        _msg: &userlib::RecvMessage,
    ) -> Result<(), RequestError<core::convert::Infallible>> {
        self.trigger_emergency_stop();
        Ok(())
    }
}

impl idol_runtime::NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        notifications::TIMER_MASK
    }

    fn handle_notification(&mut self, bits: u32) {
        if bits & notifications::TIMER_MASK != 0 {
            let now = sys_get_timer().now;
            if now >= self.deadline {
                self.deadline += HEALTH_POLL_MS;
                sys_set_timer(Some(self.deadline), notifications::TIMER_MASK);
            }
            self.poll_health(now);
        }
    }
}

mod idl {
    use task_jefe_api::JefeError;
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
