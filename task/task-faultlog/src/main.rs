// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fault taxonomy and rate-limited error log (C13).
//!
//! Each fault kind backs off exponentially between an initial 1s and a
//! maximum 5-minute log interval; a quiet period at least as long as
//! the maximum interval counts as a fresh episode and resets the
//! backoff. Criticals are written to both the general (50-slot) and
//! critical (5-slot) rings in `drv-store`; everything else only to the
//! general ring. The ring cursor itself lives in RAM, not NVM, so a
//! reboot restarts each ring at slot 0.

#![no_std]
#![no_main]

use drv_store_api::{Area, Store};
use idol_runtime::NotificationHandler;
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use task_faultlog_api::{FaultKind, INITIAL_LOG_INTERVAL_MS, MAX_LOG_INTERVAL_MS, NUM_FAULT_KINDS};
use userlib::*;

task_slot!(STORE, drv_store);

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    Reported(FaultKind),
    RateLimited(FaultKind),
    StoreBusError(FaultKind),
}

counted_ringbuf!(Trace, 32, Trace::None);

fn decode_kind(kind: u8) -> Option<FaultKind> {
    match kind {
        0 => Some(FaultKind::SensorInvalid),
        1 => Some(FaultKind::SensorStale),
        2 => Some(FaultKind::BusError),
        3 => Some(FaultKind::RelayMismatch),
        4 => Some(FaultKind::FlameFailure),
        5 => Some(FaultKind::OverTemperature),
        6 => Some(FaultKind::UnderPressure),
        7 => Some(FaultKind::OverPressure),
        8 => Some(FaultKind::MutexTimeout),
        9 => Some(FaultKind::MemoryAllocation),
        10 => Some(FaultKind::StorageCorruption),
        11 => Some(FaultKind::WatchdogTimeout),
        12 => Some(FaultKind::DependencyFailed),
        _ => None,
    }
}

fn encode_record(kind: FaultKind, critical: bool, context: u32, now: u32) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[0] = kind as u8;
    buf[1] = critical as u8;
    buf[4..8].copy_from_slice(&context.to_le_bytes());
    buf[8..12].copy_from_slice(&now.to_le_bytes());
    buf
}

struct ServerImpl {
    logged_once: [bool; NUM_FAULT_KINDS],
    last_log_ms: [u32; NUM_FAULT_KINDS],
    current_interval_ms: [u32; NUM_FAULT_KINDS],
    general_next_slot: u8,
    critical_next_slot: u8,
    general_logged_count: u32,
    critical_logged_count: u32,
}

impl ServerImpl {
    fn new() -> Self {
        ServerImpl {
            logged_once: [false; NUM_FAULT_KINDS],
            last_log_ms: [0; NUM_FAULT_KINDS],
            current_interval_ms: [INITIAL_LOG_INTERVAL_MS; NUM_FAULT_KINDS],
            general_next_slot: 0,
            critical_next_slot: 0,
            general_logged_count: 0,
            critical_logged_count: 0,
        }
    }

    fn write_ring(
        &mut self,
        area: Area,
        slot: &mut u8,
        count: &mut u32,
        record: &[u8; 16],
        kind: FaultKind,
    ) {
        let store = Store::from(STORE.get_task_id());
        let (max_slots, _) = area.layout();
        if store.write_area(area as u8, *slot, record).is_err() {
            ringbuf_entry!(Trace::StoreBusError(kind));
            return;
        }
        *count += 1;
        *slot = (*slot + 1) % max_slots;
    }

    fn record_fault(&mut self, kind: FaultKind, critical: bool, context: u32) {
        let idx = kind as usize;
        let now = sys_get_timer().now as u32;

        if self.logged_once[idx] {
            let elapsed = now.wrapping_sub(self.last_log_ms[idx]);
            if elapsed < self.current_interval_ms[idx] {
                ringbuf_entry!(Trace::RateLimited(kind));
                return;
            }
            if elapsed >= MAX_LOG_INTERVAL_MS {
                self.current_interval_ms[idx] = INITIAL_LOG_INTERVAL_MS;
            }
        }

        let record = encode_record(kind, critical, context, now);
        let mut general_slot = self.general_next_slot;
        let mut general_count = self.general_logged_count;
        self.write_ring(
            Area::ErrorLogGeneral,
            &mut general_slot,
            &mut general_count,
            &record,
            kind,
        );
        self.general_next_slot = general_slot;
        self.general_logged_count = general_count;

        if critical {
            let mut critical_slot = self.critical_next_slot;
            let mut critical_count = self.critical_logged_count;
            self.write_ring(
                Area::ErrorLogCritical,
                &mut critical_slot,
                &mut critical_count,
                &record,
                kind,
            );
            self.critical_next_slot = critical_slot;
            self.critical_logged_count = critical_count;
        }

        self.last_log_ms[idx] = now;
        self.logged_once[idx] = true;
        self.current_interval_ms[idx] = (self.current_interval_ms[idx] * 2).min(MAX_LOG_INTERVAL_MS);
        ringbuf_entry!(Trace::Reported(kind));
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

impl idl::InOrderFaultlogImpl for ServerImpl {
    fn report(
        &mut self,
        _msg: &RecvMessage,
        kind: u8,
        critical: bool,
        context: u32,
    ) -> Result<(), idol_runtime::RequestError<core::convert::Infallible>> {
        if let Some(kind) = decode_kind(kind) {
            self.record_fault(kind, critical, context);
        }
        Ok(())
    }

    fn general_count(
        &mut self,
        _msg: &RecvMessage,
    ) -> Result<u32, idol_runtime::RequestError<core::convert::Infallible>> {
        Ok(self.general_logged_count)
    }

    fn critical_count(
        &mut self,
        _msg: &RecvMessage,
    ) -> Result<u32, idol_runtime::RequestError<core::convert::Infallible>> {
        Ok(self.critical_logged_count)
    }
}

impl NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        0
    }

    fn handle_notification(&mut self, _bits: u32) {}
}

mod idl {
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
