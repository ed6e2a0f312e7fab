// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Calendar scheduler (C11).
//!
//! Schedules live in memory as up to [`MAX_SCHEDULES`] slots, loaded
//! from `drv-store` at boot and written back on a debounce timer after
//! each edit. Every [`EVAL_PERIOD_MS`] tick the scheduler recomputes
//! which schedules are active (§4.11's midnight-crossing window logic
//! lives in [`boiler_schedule`]) and dispatches `onStart`/`onEnd`/
//! `onPreheatingStart` through a small table of function pointers keyed
//! by schedule kind — not a trait object, since the kind set is fixed
//! and known at compile time.
//!
//! There's no RTC driver in this workspace, so the wall clock is
//! entirely NTP-disciplined: [`ClockState`] tracks an offset from the
//! task's own tick counter, set by `ntp_update`, and reports itself
//! degraded until the first update arrives or after too long without
//! one.

#![no_std]
#![no_main]

use boiler_schedule::{decompose, minutes_of, Window};
use drv_store_api::{Area, Store};
use idol_runtime::{ClientError, Leased, NotificationHandler, RequestError, R};
use multitimer::{Multitimer, Repeat};
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use task_burner_api::{Burner, Circuit};
use task_scheduler_api::{
    ScheduleKind, ScheduleRecord, SchedulerError, SpaceAction, SpaceMode, WaterAction,
    MAX_SCHEDULES, RECORD_LEN,
};
use userlib::*;

include!(concat!(env!("OUT_DIR"), "/scheduler_config.rs"));

task_slot!(BURNER, task_burner);
task_slot!(STORE, drv_store);

const TICKS_PER_SEC: u64 = 1_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, enum_map::Enum)]
enum TimerName {
    Eval,
    Persist,
}

mod notifications {
    pub const TIMER_BIT: u8 = 0;
    pub const TIMER_MASK: u32 = 1 << TIMER_BIT;
}

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    ScheduleAdded(u8),
    ScheduleRemoved(u8),
    ScheduleStarted(u8),
    ScheduleEnded(u8),
    PreheatingStarted(u8, u16),
    RtcImplausible,
    ClockDegraded,
    NtpUpdated(u32),
    BurnerBusError(u8),
    StoreBusError(u8),
    StorePersisted(u8),
}

counted_ringbuf!(Trace, 64, Trace::None);

/// Dispatch table for a schedule kind. A "deep virtual hierarchy" here
/// would buy nothing: there are exactly two kinds, known at compile
/// time, so a small `static` of function pointers keyed by
/// [`ScheduleKind`] does the job without a vtable.
struct ActionHandler {
    type_name: &'static str,
    preheating_minutes: Option<u16>,
    on_start: fn(&ScheduleRecord),
    on_end: fn(&ScheduleRecord),
    on_preheating_start: Option<fn(&ScheduleRecord, u16)>,
}

fn handler_for(kind: ScheduleKind) -> &'static ActionHandler {
    match kind {
        ScheduleKind::Water => &WATER_HANDLER,
        ScheduleKind::Space => &SPACE_HANDLER,
    }
}

fn water_on_start(record: &ScheduleRecord) {
    let action = WaterAction::decode(&record.action_data);
    let burner = Burner::from(BURNER.get_task_id());
    if burner
        .set_demand(Circuit::Water as u8, true, action.target_tenths, action.priority)
        .is_err()
    {
        ringbuf_entry!(Trace::BurnerBusError(record.id));
    }
}

fn water_on_end(record: &ScheduleRecord) {
    let burner = Burner::from(BURNER.get_task_id());
    if burner.set_demand(Circuit::Water as u8, false, 0, false).is_err() {
        ringbuf_entry!(Trace::BurnerBusError(record.id));
    }
}

fn water_on_preheating_start(record: &ScheduleRecord, minutes_until_start: u16) {
    ringbuf_entry!(Trace::PreheatingStarted(record.id, minutes_until_start));
}

static WATER_HANDLER: ActionHandler = ActionHandler {
    type_name: "water",
    preheating_minutes: Some(10),
    on_start: water_on_start,
    on_end: water_on_end,
    on_preheating_start: Some(water_on_preheating_start),
};

fn space_on_start(record: &ScheduleRecord) {
    let Some(action) = SpaceAction::decode(&record.action_data) else {
        return;
    };
    let burner = Burner::from(BURNER.get_task_id());
    let active = !matches!(action.mode, SpaceMode::Frost);
    if burner
        .set_demand(Circuit::Heating as u8, active, action.target_tenths, false)
        .is_err()
    {
        ringbuf_entry!(Trace::BurnerBusError(record.id));
    }
}

fn space_on_end(record: &ScheduleRecord) {
    let burner = Burner::from(BURNER.get_task_id());
    if burner.set_demand(Circuit::Heating as u8, false, 0, false).is_err() {
        ringbuf_entry!(Trace::BurnerBusError(record.id));
    }
}

fn space_on_preheating_start(record: &ScheduleRecord, minutes_until_start: u16) {
    // Pull the room gently toward setpoint ahead of the scheduled start,
    // at low priority so an active water demand still wins the arbiter.
    let Some(action) = SpaceAction::decode(&record.action_data) else {
        return;
    };
    let burner = Burner::from(BURNER.get_task_id());
    if burner
        .set_demand(Circuit::Heating as u8, true, action.target_tenths, false)
        .is_err()
    {
        ringbuf_entry!(Trace::BurnerBusError(record.id));
    }
    ringbuf_entry!(Trace::PreheatingStarted(record.id, minutes_until_start));
}

static SPACE_HANDLER: ActionHandler = ActionHandler {
    type_name: "space",
    preheating_minutes: Some(30),
    on_start: space_on_start,
    on_end: space_on_end,
    on_preheating_start: Some(space_on_preheating_start),
};

fn window_of(record: &ScheduleRecord) -> Window {
    Window {
        day_mask: record.day_mask,
        start: minutes_of(record.start_hour, record.start_minute),
        end: minutes_of(record.end_hour, record.end_minute),
    }
}

#[derive(Copy, Clone)]
struct ScheduleSlot {
    record: ScheduleRecord,
    was_active: bool,
    preheat_fired: bool,
}

/// NTP-disciplined wall clock. There's no RTC in this workspace, so
/// until the first `ntp_update` arrives the clock reads as the Unix
/// epoch, which the RTC-plausibility check correctly treats as
/// implausible and suspends schedules over.
struct ClockState {
    unix_at_anchor: u32,
    anchor_ticks: u64,
    silent_evals: u32,
    degraded: bool,
}

impl ClockState {
    const fn new() -> Self {
        ClockState {
            unix_at_anchor: 0,
            anchor_ticks: 0,
            silent_evals: 0,
            degraded: true,
        }
    }

    fn now_unix(&self, now_ticks: u64) -> u32 {
        let elapsed_s = now_ticks.saturating_sub(self.anchor_ticks) / TICKS_PER_SEC;
        self.unix_at_anchor.saturating_add(elapsed_s as u32)
    }

    fn set(&mut self, unix_seconds: u32, now_ticks: u64) {
        self.unix_at_anchor = unix_seconds;
        self.anchor_ticks = now_ticks;
        self.silent_evals = 0;
        self.degraded = false;
    }

    /// Called once per eval tick; returns whether the clock just
    /// crossed into degraded (RTC-only) operation.
    fn tick(&mut self) -> bool {
        if self.degraded {
            return false;
        }
        self.silent_evals += 1;
        if self.silent_evals >= MAX_NTP_SILENT_EVALS {
            self.degraded = true;
            return true;
        }
        false
    }
}

struct ServerImpl {
    timer: Multitimer<TimerName>,
    clock: ClockState,
    schedules: [Option<ScheduleSlot>; MAX_SCHEDULES],
    dirty: [bool; MAX_SCHEDULES],
    rtc_bad_evals: u32,
}

impl ServerImpl {
    fn mark_dirty(&mut self, id: u8) {
        self.dirty[id as usize] = true;
        let now = sys_get_timer().now;
        self.timer
            .set_timer(TimerName::Persist, now + PERSIST_DEBOUNCE_MS, None);
    }

    fn persist_dirty(&mut self) {
        let store = Store::from(STORE.get_task_id());
        for id in 0..MAX_SCHEDULES {
            if !self.dirty[id] {
                continue;
            }
            let buf = match &self.schedules[id] {
                Some(slot) => slot.record.encode(),
                None => [0u8; RECORD_LEN],
            };
            if store.write_area(Area::Schedules as u8, id as u8, &buf).is_err() {
                ringbuf_entry!(Trace::StoreBusError(id as u8));
                continue;
            }
            ringbuf_entry!(Trace::StorePersisted(id as u8));
            self.dirty[id] = false;
        }
    }

    fn on_eval(&mut self) {
        if self.clock.tick() {
            ringbuf_entry!(Trace::ClockDegraded);
        }

        let now_ticks = sys_get_timer().now;
        let unix = self.clock.now_unix(now_ticks);
        let clock = decompose(unix);

        if clock.year < 2020 {
            if self.rtc_bad_evals % RTC_WARNING_REPEAT_EVALS == 0 {
                ringbuf_entry!(Trace::RtcImplausible);
            }
            self.rtc_bad_evals += 1;
            return;
        }
        self.rtc_bad_evals = 0;

        for slot in self.schedules.iter_mut().flatten() {
            let window = window_of(&slot.record);
            let active = slot.record.enabled
                && window.is_active(clock.weekday, clock.minutes_since_midnight);
            let handler = handler_for(slot.record.kind);

            if active && !slot.was_active {
                (handler.on_start)(&slot.record);
                ringbuf_entry!(Trace::ScheduleStarted(slot.record.id));
                slot.preheat_fired = false;
            } else if !active && slot.was_active {
                (handler.on_end)(&slot.record);
                ringbuf_entry!(Trace::ScheduleEnded(slot.record.id));
            } else if !active && !slot.preheat_fired {
                if let (Some(lead), Some(cb)) =
                    (handler.preheating_minutes, handler.on_preheating_start)
                {
                    if let Some(until) =
                        window.minutes_until_start(clock.weekday, clock.minutes_since_midnight)
                    {
                        if until <= lead {
                            cb(&slot.record, until);
                            slot.preheat_fired = true;
                        }
                    }
                }
            }
            slot.was_active = active;
        }
    }
}

fn load_schedules() -> [Option<ScheduleSlot>; MAX_SCHEDULES] {
    let store = Store::from(STORE.get_task_id());
    let mut schedules: [Option<ScheduleSlot>; MAX_SCHEDULES] = [None; MAX_SCHEDULES];
    for id in 0..MAX_SCHEDULES {
        let mut buf = [0u8; RECORD_LEN];
        if store.read_area(Area::Schedules as u8, id as u8, &mut buf).is_err() {
            continue;
        }
        if let Ok(record) = ScheduleRecord::decode(&buf) {
            if record.id as usize == id {
                schedules[id] = Some(ScheduleSlot {
                    record,
                    was_active: false,
                    preheat_fired: false,
                });
            }
        }
    }
    schedules
}

#[export_name = "main"]
fn main() -> ! {
    let mut timer = Multitimer::<TimerName>::new(notifications::TIMER_BIT);
    timer.set_timer(
        TimerName::Eval,
        sys_get_timer().now + EVAL_PERIOD_MS,
        Some(Repeat::AfterDeadline(EVAL_PERIOD_MS)),
    );

    let mut server = ServerImpl {
        timer,
        clock: ClockState::new(),
        schedules: load_schedules(),
        dirty: [false; MAX_SCHEDULES],
        rtc_bad_evals: 0,
    };

    let mut buf = [0u8; idl::INCOMING_SIZE];
    loop {
        idol_runtime::dispatch(&mut buf, &mut server);
    }
}

impl idl::InOrderSchedulerImpl for ServerImpl {
    fn add_schedule(
        &mut self,
        _msg: &RecvMessage,
        id: u8,
        record: Leased<R, [u8]>,
    ) -> Result<(), RequestError<SchedulerError>> {
        if id as usize >= MAX_SCHEDULES {
            return Err(SchedulerError::InvalidId.into());
        }
        if record.len() != RECORD_LEN {
            return Err(SchedulerError::BadLength.into());
        }
        let mut buf = [0u8; RECORD_LEN];
        record
            .read_range(0..RECORD_LEN, &mut buf)
            .map_err(|_| RequestError::Fail(ClientError::WentAway))?;
        let decoded = ScheduleRecord::decode(&buf).map_err(RequestError::from)?;
        if decoded.id != id {
            return Err(SchedulerError::InvalidId.into());
        }

        self.schedules[id as usize] = Some(ScheduleSlot {
            record: decoded,
            was_active: false,
            preheat_fired: false,
        });
        self.mark_dirty(id);
        ringbuf_entry!(Trace::ScheduleAdded(id));
        Ok(())
    }

    fn remove_schedule(
        &mut self,
        _msg: &RecvMessage,
        id: u8,
    ) -> Result<(), RequestError<SchedulerError>> {
        if id as usize >= MAX_SCHEDULES {
            return Err(SchedulerError::InvalidId.into());
        }
        if self.schedules[id as usize].take().is_none() {
            return Err(SchedulerError::InvalidId.into());
        }
        self.mark_dirty(id);
        ringbuf_entry!(Trace::ScheduleRemoved(id));
        Ok(())
    }

    fn ntp_update(
        &mut self,
        _msg: &RecvMessage,
        utc_unix_seconds: u32,
    ) -> Result<(), RequestError<core::convert::Infallible>> {
        self.clock.set(utc_unix_seconds, sys_get_timer().now);
        ringbuf_entry!(Trace::NtpUpdated(utc_unix_seconds));
        Ok(())
    }
}

impl NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        notifications::TIMER_MASK
    }

    fn handle_notification(&mut self, bits: u32) {
        self.timer.handle_notification(bits);
        for which in self.timer.iter_fired() {
            match which {
                TimerName::Eval => self.on_eval(),
                TimerName::Persist => self.persist_dirty(),
            }
        }
    }
}

mod idl {
    use task_scheduler_api::SchedulerError;
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
