// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pump control (C9).
//!
//! Two identical instances (index 0 = heating circulator, index 1 = DHW
//! pump by default config). Each instance is ON iff its mode flag is
//! active or it is still in its post-mode cooldown; while the return
//! preheater is PREHEATING, both instances instead follow its
//! [`pump_should_run`](task_preheater_api) signal directly, since the
//! data model does not distinguish which of the two instances does
//! boiler recirculation. Every OFF-to-ON transition bumps a persistent
//! start counter in `drv-store`.

#![no_std]
#![no_main]

use drv_relay_api::Relay;
use drv_store_api::Store;
use idol_runtime::{NotificationHandler, RequestError};
use multitimer::{Multitimer, Repeat};
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use task_pump_api::{PumpError, NUM_PUMPS};
use task_preheater_api::{Preheater, PreheaterState};
use userlib::*;

include!(concat!(env!("OUT_DIR"), "/pump_config.rs"));

task_slot!(RELAY, drv_relay);
task_slot!(STORE, drv_store);
task_slot!(PREHEATER, task_preheater);

const TICK_MS: u32 = 1_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, enum_map::Enum)]
enum TimerName {
    Tick,
}

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    TurnedOn(u8),
    TurnedOff(u8),
    CooldownStarted(u8),
    RelayBusError(u8),
    StoreBusError(u8),
}

counted_ringbuf!(Trace, 32, Trace::None);

struct ServerImpl {
    timer: Multitimer<TimerName>,
    mode_active: [bool; NUM_PUMPS],
    prev_mode_active: [bool; NUM_PUMPS],
    cooldown_remaining_ms: [u32; NUM_PUMPS],
    pump_on: [bool; NUM_PUMPS],
}

impl ServerImpl {
    fn new() -> Self {
        let mut timer = Multitimer::<TimerName>::new(notifications::TIMER_BIT);
        timer.set_timer(
            TimerName::Tick,
            sys_get_timer().now + TICK_MS as u64,
            Some(Repeat::AfterDeadline(TICK_MS as u64)),
        );
        ServerImpl {
            timer,
            mode_active: [false; NUM_PUMPS],
            prev_mode_active: [false; NUM_PUMPS],
            cooldown_remaining_ms: [0; NUM_PUMPS],
            pump_on: [false; NUM_PUMPS],
        }
    }

    fn preheating(&self) -> Option<bool> {
        let preheater = Preheater::from(PREHEATER.get_task_id());
        if preheater.state() == PreheaterState::Preheating as u8 {
            Some(preheater.pump_should_run())
        } else {
            None
        }
    }

    fn on_tick(&mut self) {
        let preheating = self.preheating();

        for i in 0..NUM_PUMPS {
            if self.prev_mode_active[i] && !self.mode_active[i] {
                self.cooldown_remaining_ms[i] = COOLDOWN_MS;
                ringbuf_entry!(Trace::CooldownStarted(i as u8));
            }
            self.prev_mode_active[i] = self.mode_active[i];

            if self.mode_active[i] {
                self.cooldown_remaining_ms[i] = 0;
            } else if self.cooldown_remaining_ms[i] > 0 {
                self.cooldown_remaining_ms[i] =
                    self.cooldown_remaining_ms[i].saturating_sub(TICK_MS);
            }

            let desired = match preheating {
                Some(run) => run,
                None => self.mode_active[i] || self.cooldown_remaining_ms[i] > 0,
            };

            if desired && !self.pump_on[i] {
                ringbuf_entry!(Trace::TurnedOn(i as u8));
                self.bump_start_counter(i as u8);
            } else if !desired && self.pump_on[i] {
                ringbuf_entry!(Trace::TurnedOff(i as u8));
            }
            self.pump_on[i] = desired;
            self.drive_relay(i as u8, desired);
        }
    }

    fn drive_relay(&mut self, pump: u8, on: bool) {
        let relay = Relay::from(RELAY.get_task_id());
        if relay.set_desired(RELAY_INDEX[pump as usize], on).is_err() {
            ringbuf_entry!(Trace::RelayBusError(pump));
        }
    }

    fn bump_start_counter(&mut self, pump: u8) {
        let store = Store::from(STORE.get_task_id());
        if store.increment_counter(COUNTER_ID[pump as usize]).is_err() {
            ringbuf_entry!(Trace::StoreBusError(pump));
        }
    }
}

#[export_name = "main"]
fn main() -> ! {
    let mut server = ServerImpl::new();
    let mut buf = [0u8; idl::INCOMING_SIZE];
    loop {
        idol_runtime::dispatch(&mut buf, &mut server);
    }
}

impl idl::InOrderPumpImpl for ServerImpl {
    fn set_mode(
        &mut self,
        _msg: &RecvMessage,
        pump: u8,
        active: bool,
    ) -> Result<(), RequestError<PumpError>> {
        if pump as usize >= NUM_PUMPS {
            return Err(PumpError::InvalidPump.into());
        }
        self.mode_active[pump as usize] = active;
        Ok(())
    }

    fn is_running(
        &mut self,
        _msg: &RecvMessage,
        pump: u8,
    ) -> Result<bool, RequestError<PumpError>> {
        if pump as usize >= NUM_PUMPS {
            return Err(PumpError::InvalidPump.into());
        }
        Ok(self.pump_on[pump as usize])
    }
}

impl NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        notifications::TIMER_MASK
    }

    fn handle_notification(&mut self, bits: u32) {
        self.timer.handle_notification(bits);
        for _ in self.timer.iter_fired() {
            self.on_tick();
        }
    }
}

mod notifications {
    pub const TIMER_BIT: u8 = 0;
    pub const TIMER_MASK: u32 = 1 << TIMER_BIT;
}

mod idl {
    use task_pump_api::PumpError;
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
