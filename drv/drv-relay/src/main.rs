// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay command layer (C4).
//!
//! Holds the `desired`/`sent`/`actual` relay masks. Any task may write
//! `desired`; this task is the sole writer of `sent` and the sole reader
//! that acts on the actual hardware. At steady state
//! `desired == sent == actual`.
//!
//! On the write tick, a pending state change is sent first; absent a
//! change, any relay that should be ON gets its hardware watchdog
//! refreshed (a DELAY-N command) at half the watchdog period. On the
//! verify tick the actual mask is read back; a mismatch still inside its
//! watchdog countdown is an "expected mismatch" and is ignored, anything
//! else increments a per-relay counter and after two consecutive real
//! mismatches is surfaced as a persistent error.

#![no_std]
#![no_main]

use core::convert::Infallible;
use drv_fieldbus_api::{Fieldbus, OpKind};
use drv_relay_api::{RelayError, NUM_RELAYS, WATCHDOG_PERIOD_MS};
use idol_runtime::{NotificationHandler, RequestError};
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use userlib::*;

include!(concat!(env!("OUT_DIR"), "/relay_config.rs"));

task_slot!(FIELDBUS, drv_fieldbus);

const WRITE_BIT: u8 = 0;
const VERIFY_BIT: u8 = 1;
const WRITE_MASK: u32 = 1 << WRITE_BIT;
const VERIFY_MASK: u32 = 1 << VERIFY_BIT;

/// DELAY-N relay command: refresh the hardware watchdog so the relay
/// stays on for another `WATCHDOG_PERIOD_MS`, rather than sending a bare
/// ON that would need no further attention (and so would never time out
/// safe if this task died).
const WATCHDOG_REFRESH_SECONDS: u8 = (WATCHDOG_PERIOD_MS / 1000) as u8;

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    Write(u8),
    WatchdogRefresh(u8),
    ExpectedMismatch(u8),
    RealMismatch(u8),
    PersistentMismatch(u8),
    BusError,
    Deferred(u8),
}

counted_ringbuf!(Trace, 32, Trace::None);

struct ServerImpl {
    desired: u8,
    sent: u8,
    actual: u8,
    /// Pending target for a relay whose change request arrived before its
    /// minimum state-change interval elapsed.
    deferred: [Option<bool>; NUM_RELAYS],
    last_change_ms: [u64; NUM_RELAYS],
    last_refresh_ms: [u64; NUM_RELAYS],
    mismatch_count: [u32; NUM_RELAYS],
    write_ticks: u32,
    persistent_mismatch: bool,
}

impl ServerImpl {
    fn new() -> Self {
        ServerImpl {
            desired: 0,
            sent: 0,
            actual: 0,
            deferred: [None; NUM_RELAYS],
            last_change_ms: [0; NUM_RELAYS],
            last_refresh_ms: [0; NUM_RELAYS],
            mismatch_count: [0; NUM_RELAYS],
            write_ticks: 0,
            persistent_mismatch: false,
        }
    }

    fn is_guarded(relay: u8) -> bool {
        GUARDED_MASK & (1 << relay) != 0
    }

    fn apply_deferred(&mut self, now: u64) {
        for relay in 0..NUM_RELAYS as u8 {
            if let Some(target) = self.deferred[relay as usize] {
                let ready = now.saturating_sub(self.last_change_ms[relay as usize])
                    >= MIN_CHANGE_INTERVAL_MS;
                if ready {
                    self.set_bit(relay, target);
                    self.last_change_ms[relay as usize] = now;
                    self.deferred[relay as usize] = None;
                }
            }
        }
    }

    fn set_bit(&mut self, relay: u8, on: bool) {
        let mask = 1u8 << relay;
        if on {
            self.desired |= mask;
        } else {
            self.desired &= !mask;
        }
    }

    fn on_write_tick(&mut self, fieldbus: &Fieldbus) {
        let now = sys_get_timer().now;
        self.apply_deferred(now);
        self.write_ticks = self.write_ticks.wrapping_add(1);

        if self.desired != self.sent {
            ringbuf_entry!(Trace::Write(self.desired));
            let tx = [0x01, self.desired];
            let mut rx = [0u8; 1];
            match fieldbus.transact(0, &tx, &mut rx) {
                Ok(()) => {
                    self.sent = self.desired;
                    for relay in 0..NUM_RELAYS as u8 {
                        if self.desired & (1 << relay) != 0 {
                            self.last_refresh_ms[relay as usize] = now;
                        }
                    }
                }
                Err(_) => ringbuf_entry!(Trace::BusError),
            }
            return;
        }

        // No change pending: refresh the watchdog on any ON relay, at
        // half the watchdog period, split into contiguous ON blocks.
        if self.sent != 0 && self.write_ticks % 2 == 0 {
            ringbuf_entry!(Trace::WatchdogRefresh(self.sent));
            let tx = [0x02, self.sent, WATCHDOG_REFRESH_SECONDS];
            let mut rx = [0u8; 1];
            match fieldbus.transact(0, &tx, &mut rx) {
                Ok(()) => {
                    for relay in 0..NUM_RELAYS as u8 {
                        if self.sent & (1 << relay) != 0 {
                            self.last_refresh_ms[relay as usize] = now;
                        }
                    }
                }
                Err(_) => ringbuf_entry!(Trace::BusError),
            }
        }
    }

    fn on_verify_tick(&mut self, fieldbus: &Fieldbus) {
        let now = sys_get_timer().now;
        let tx = [0x03];
        let mut rx = [0u8; 1];
        let actual = match fieldbus.transact(0, &tx, &mut rx) {
            Ok(()) => rx[0],
            Err(_) => {
                ringbuf_entry!(Trace::BusError);
                return;
            }
        };
        self.actual = actual;

        let mismatch = self.actual ^ self.sent;
        for relay in 0..NUM_RELAYS as u8 {
            if mismatch & (1 << relay) == 0 {
                self.mismatch_count[relay as usize] = 0;
                continue;
            }
            let watchdog_active =
                now.saturating_sub(self.last_refresh_ms[relay as usize]) < WATCHDOG_PERIOD_MS;
            if watchdog_active {
                ringbuf_entry!(Trace::ExpectedMismatch(relay));
                continue;
            }
            ringbuf_entry!(Trace::RealMismatch(relay));
            self.mismatch_count[relay as usize] += 1;
            if self.mismatch_count[relay as usize] >= 2 {
                ringbuf_entry!(Trace::PersistentMismatch(relay));
                self.persistent_mismatch = true;
            }
        }
    }
}

#[export_name = "main"]
fn main() -> ! {
    let fieldbus = Fieldbus::from(FIELDBUS.get_task_id());

    // Registration is idempotent from our point of view: if the scheduler
    // restarted before we did, this just re-establishes our slot.
    while fieldbus
        .register(OpKind::RelayWrite as u8, WRITE_MASK)
        .is_err()
    {
        hl::sleep_for(10);
    }
    while fieldbus
        .register(OpKind::RelayVerify as u8, VERIFY_MASK)
        .is_err()
    {
        hl::sleep_for(10);
    }

    let mut server = ServerImpl::new();
    let mut buf = [0u8; idl::INCOMING_SIZE];
    loop {
        idol_runtime::dispatch(&mut buf, &mut server);
    }
}

impl idl::InOrderRelayImpl for ServerImpl {
    fn set_desired(
        &mut self,
        _msg: &RecvMessage,
        relay: u8,
        on: bool,
    ) -> Result<(), RequestError<RelayError>> {
        if relay as usize >= NUM_RELAYS {
            return Err(RelayError::InvalidRelay.into());
        }

        let now = sys_get_timer().now;
        let current = self.desired & (1 << relay) != 0;
        if current == on {
            self.deferred[relay as usize] = None;
            return Ok(());
        }

        if Self::is_guarded(relay)
            && now.saturating_sub(self.last_change_ms[relay as usize]) < MIN_CHANGE_INTERVAL_MS
        {
            ringbuf_entry!(Trace::Deferred(relay));
            self.deferred[relay as usize] = Some(on);
            return Ok(());
        }

        self.set_bit(relay, on);
        self.last_change_ms[relay as usize] = now;
        self.deferred[relay as usize] = None;
        Ok(())
    }

    fn actual_mask(&mut self, _msg: &RecvMessage) -> Result<u8, RequestError<Infallible>> {
        Ok(self.actual)
    }

    fn desired_mask(&mut self, _msg: &RecvMessage) -> Result<u8, RequestError<Infallible>> {
        Ok(self.desired)
    }

    fn mismatch_count(
        &mut self,
        _msg: &RecvMessage,
        relay: u8,
    ) -> Result<u32, RequestError<RelayError>> {
        if relay as usize >= NUM_RELAYS {
            return Err(RelayError::InvalidRelay.into());
        }
        Ok(self.mismatch_count[relay as usize])
    }
}

impl NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        WRITE_MASK | VERIFY_MASK
    }

    fn handle_notification(&mut self, bits: u32) {
        let fieldbus = Fieldbus::from(FIELDBUS.get_task_id());
        if bits & WRITE_MASK != 0 {
            self.on_write_tick(&fieldbus);
        }
        if bits & VERIFY_MASK != 0 {
            self.on_verify_tick(&fieldbus);
        }
    }
}

mod idl {
    use drv_relay_api::RelayError;
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
