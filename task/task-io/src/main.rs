// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared readings store (C2) and its bus-driven publication (C3's
//! consumer side).
//!
//! Registers for the `RoomRead` and `BoilerRead` ticks and parses the
//! resulting frames into per-channel readings. A publish is only marked
//! `valid` if the raw value lies inside that channel's compile-time
//! range; callers additionally see a reading as invalid once it hasn't
//! been refreshed within `STALE_THRESHOLD_MS`, so staleness is evaluated
//! at read time rather than latched at publish time.

#![no_std]
#![no_main]

use core::convert::Infallible;
use drv_fieldbus_api::{Fieldbus, OpKind};
use idol_runtime::{NotificationHandler, RequestError};
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use task_io_api::{Channel, IoError, NUM_CHANNELS, STALE_THRESHOLD_MS};
use userlib::*;

include!(concat!(env!("OUT_DIR"), "/io_config.rs"));

task_slot!(FIELDBUS, drv_fieldbus);

const ROOM_BIT: u8 = 0;
const BOILER_BIT: u8 = 1;
const ROOM_MASK: u32 = 1 << ROOM_BIT;
const BOILER_MASK: u32 = 1 << BOILER_BIT;

/// Channels read off the boiler sensor block, in wire order.
const BOILER_CHANNELS: [Channel; 7] = [
    Channel::BoilerOutput,
    Channel::BoilerReturn,
    Channel::DhwTank,
    Channel::DhwReturn,
    Channel::HeatingReturn,
    Channel::Outside,
    Channel::Pressure,
];

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    Published(Channel),
    OutOfRange(Channel, i16),
    BusError(OpKind),
    FirstReadComplete,
}

counted_ringbuf!(Trace, 32, Trace::None);

#[derive(Copy, Clone, Default)]
struct Reading {
    value: i16,
    valid: bool,
    timestamp_ms: u32,
    ever_valid: bool,
}

struct ServerImpl {
    readings: [Reading; NUM_CHANNELS],
    first_read_complete: bool,
}

impl ServerImpl {
    fn new() -> Self {
        ServerImpl {
            readings: [Reading::default(); NUM_CHANNELS],
            first_read_complete: false,
        }
    }

    fn publish(&mut self, channel: Channel, raw: i16, now: u32) {
        let (lo, hi) = channel.valid_range();
        let idx = channel as usize;
        let valid = raw >= lo && raw <= hi;
        self.readings[idx] = Reading {
            value: raw,
            valid,
            timestamp_ms: now,
            ever_valid: self.readings[idx].ever_valid || valid,
        };
        if valid {
            ringbuf_entry!(Trace::Published(channel));
        } else {
            ringbuf_entry!(Trace::OutOfRange(channel, raw));
        }

        if !self.first_read_complete && Channel::ALL.iter().all(|c| self.readings[*c as usize].ever_valid) {
            self.first_read_complete = true;
            ringbuf_entry!(Trace::FirstReadComplete);
        }
    }

    fn on_room_tick(&mut self, fieldbus: &Fieldbus) {
        let tx = [0x10u8];
        let mut rx = [0u8; 2];
        match fieldbus.transact(STATION_ROOM, &tx, &mut rx) {
            Ok(()) => {
                let raw = i16::from_le_bytes([rx[0], rx[1]]);
                self.publish(Channel::Room, raw, sys_get_timer().now as u32);
            }
            Err(_) => ringbuf_entry!(Trace::BusError(OpKind::RoomRead)),
        }
    }

    fn on_boiler_tick(&mut self, fieldbus: &Fieldbus) {
        let tx = [0x10u8];
        let mut rx = [0u8; 14];
        match fieldbus.transact(STATION_BOILER, &tx, &mut rx) {
            Ok(()) => {
                let now = sys_get_timer().now as u32;
                for (i, channel) in BOILER_CHANNELS.iter().enumerate() {
                    let raw = i16::from_le_bytes([rx[2 * i], rx[2 * i + 1]]);
                    self.publish(*channel, raw, now);
                }
            }
            Err(_) => ringbuf_entry!(Trace::BusError(OpKind::BoilerRead)),
        }
    }

    fn effective_valid(&self, idx: usize, now: u32) -> bool {
        let r = self.readings[idx];
        r.valid && now.wrapping_sub(r.timestamp_ms) < STALE_THRESHOLD_MS
    }
}

#[export_name = "main"]
fn main() -> ! {
    let fieldbus = Fieldbus::from(FIELDBUS.get_task_id());

    while fieldbus.register(OpKind::RoomRead as u8, ROOM_MASK).is_err() {
        hl::sleep_for(10);
    }
    while fieldbus
        .register(OpKind::BoilerRead as u8, BOILER_MASK)
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

impl idl::InOrderIoImpl for ServerImpl {
    fn reading(
        &mut self,
        _msg: &RecvMessage,
        channel: u8,
    ) -> Result<(i16, bool, u32), RequestError<IoError>> {
        if channel as usize >= NUM_CHANNELS {
            return Err(IoError::InvalidChannel.into());
        }
        let now = sys_get_timer().now as u32;
        let r = self.readings[channel as usize];
        Ok((r.value, self.effective_valid(channel as usize, now), r.timestamp_ms))
    }

    fn all_ready(&mut self, _msg: &RecvMessage) -> Result<bool, RequestError<Infallible>> {
        Ok(self.first_read_complete)
    }
}

impl NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        ROOM_MASK | BOILER_MASK
    }

    fn handle_notification(&mut self, bits: u32) {
        let fieldbus = Fieldbus::from(FIELDBUS.get_task_id());
        if bits & ROOM_MASK != 0 {
            self.on_room_tick(&fieldbus);
        }
        if bits & BOILER_MASK != 0 {
            self.on_boiler_tick(&fieldbus);
        }
    }
}

mod idl {
    use task_io_api::IoError;
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
