// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The time-division field bus scheduler.
//!
//! Owns the single half-duplex serial bus shared by the room sensor, the
//! boiler sensor block and the relay module. Time is divided into 500 ms
//! ticks grouped into 10-tick (5 s) cycles; each tick is either idle or
//! assigned to exactly one [`OpKind`]. A task registers interest in an
//! op kind and is notified on the tick that owns it; ticks 4 and 9 are
//! deliberately left unassigned as bus-turnaround margin.
//!
//! Mapping peripherals to fixed slots instead of a bus mutex makes
//! collisions impossible by construction and the schedule observable on
//! a logic analyzer.

#![no_std]
#![no_main]

mod transport;

use core::convert::Infallible;
use drv_fieldbus_api::{FieldbusError, OpKind};
use idol_runtime::{ClientError, Leased, NotificationHandler, RequestError, R, W};
use multitimer::{Multitimer, Repeat};
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use userlib::*;

include!(concat!(env!("OUT_DIR"), "/bus_config.rs"));

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    Tick(u8),
    Notify(OpKind),
    DeadTask(OpKind),
    BusError(u8),
}

counted_ringbuf!(Trace, 32, Trace::None);

const TICK_MS: u64 = 500;
const CYCLE_LEN: usize = 10;

/// tick index -> op kind owning that tick, or `None` if idle.
const SCHEDULE: [Option<OpKind>; CYCLE_LEN] = [
    Some(OpKind::RoomRead),    // 0
    Some(OpKind::RelayWrite),  // 1
    Some(OpKind::BoilerRead),  // 2
    Some(OpKind::RelayVerify), // 3
    None,                      // 4
    Some(OpKind::BoilerRead),  // 5
    Some(OpKind::RelayWrite),  // 6
    None,                      // 7
    Some(OpKind::RelayVerify), // 8
    None,                      // 9
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, enum_map::Enum)]
enum TimerName {
    Tick,
}

#[derive(Copy, Clone, Default)]
struct Registration {
    task: Option<TaskId>,
    notification_mask: u32,
}

struct ServerImpl {
    timer: Multitimer<TimerName>,
    tick: usize,
    registrations: [Registration; 4],
}

fn op_index(op: OpKind) -> usize {
    op as u8 as usize
}

#[export_name = "main"]
fn main() -> ! {
    let mut timer = Multitimer::<TimerName>::new(notifications::TIMER_BIT);
    timer.set_timer(
        TimerName::Tick,
        sys_get_timer().now + TICK_MS,
        Some(Repeat::AfterDeadline(TICK_MS)),
    );

    let mut server = ServerImpl {
        timer,
        tick: 0,
        registrations: [Registration::default(); 4],
    };

    let mut buf = [0u8; idl::INCOMING_SIZE];
    loop {
        idol_runtime::dispatch(&mut buf, &mut server);
    }
}

impl ServerImpl {
    fn advance_tick(&mut self) {
        ringbuf_entry!(Trace::Tick(self.tick as u8));
        if let Some(op) = SCHEDULE[self.tick] {
            self.notify(op);
        }
        self.tick = (self.tick + 1) % CYCLE_LEN;
    }

    fn notify(&mut self, op: OpKind) {
        let idx = op_index(op);
        let Registration {
            task,
            notification_mask,
        } = self.registrations[idx];
        if let Some(task) = task {
            let refreshed = sys_refresh_task_id(task);
            if refreshed.generation() != task.generation() {
                // The registered task has been restarted since it
                // registered; drop it rather than notify a stranger.
                ringbuf_entry!(Trace::DeadTask(op));
                self.registrations[idx] = Registration::default();
                return;
            }
            ringbuf_entry!(Trace::Notify(op));
            sys_post(refreshed, notification_mask);
        }
    }
}

impl idl::InOrderFieldbusImpl for ServerImpl {
    fn register(
        &mut self,
        msg: &RecvMessage,
        op_kind: u8,
        notification_mask: u32,
    ) -> Result<(), RequestError<FieldbusError>> {
        let op = decode_op(op_kind)?;
        let idx = op_index(op);
        if self.registrations[idx].task.is_some() {
            return Err(FieldbusError::AlreadyRegistered.into());
        }
        self.registrations[idx] = Registration {
            task: Some(msg.sender),
            notification_mask,
        };
        Ok(())
    }

    fn unregister(
        &mut self,
        msg: &RecvMessage,
        op_kind: u8,
    ) -> Result<(), RequestError<Infallible>> {
        let idx = match decode_op(op_kind) {
            Ok(op) => op_index(op),
            Err(_) => return Ok(()),
        };
        if self.registrations[idx]
            .task
            .map(|t| t.index() == msg.sender.index())
            .unwrap_or(false)
        {
            self.registrations[idx] = Registration::default();
        }
        Ok(())
    }

    fn transact(
        &mut self,
        _msg: &RecvMessage,
        station: u8,
        tx: Leased<R, [u8]>,
        rx: Leased<W, [u8]>,
    ) -> Result<(), RequestError<FieldbusError>> {
        let mut tx_buf = [0u8; 64];
        let tx_len = tx.len().min(tx_buf.len());
        tx.read_range(0..tx_len, &mut tx_buf[..tx_len])
            .map_err(|_| RequestError::Fail(ClientError::WentAway))?;

        let mut rx_buf = [0u8; 64];
        let rx_len = rx.len().min(rx_buf.len());

        let mut hw = transport::hw::Uart;
        match transport::transact_with_retries(
            &mut hw,
            station,
            &tx_buf[..tx_len],
            &mut rx_buf[..rx_len],
            MAX_RETRIES,
            INTER_FRAME_DELAY_MS,
        ) {
            Ok(n) => {
                rx.write_range(0..n, &rx_buf[..n])
                    .map_err(|_| RequestError::Fail(ClientError::WentAway))?;
                Ok(())
            }
            Err(_) => {
                ringbuf_entry!(Trace::BusError(station));
                Err(FieldbusError::BusError.into())
            }
        }
    }
}

fn decode_op(op_kind: u8) -> Result<OpKind, RequestError<FieldbusError>> {
    match op_kind {
        0 => Ok(OpKind::RoomRead),
        1 => Ok(OpKind::BoilerRead),
        2 => Ok(OpKind::RelayWrite),
        3 => Ok(OpKind::RelayVerify),
        _ => Err(FieldbusError::NotRegistered.into()),
    }
}

impl NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        notifications::TIMER_MASK
    }

    fn handle_notification(&mut self, bits: u32) {
        self.timer.handle_notification(bits);
        for _ in self.timer.iter_fired() {
            self.advance_tick();
        }
    }
}

mod notifications {
    pub const TIMER_BIT: u8 = 0;
    pub const TIMER_MASK: u32 = 1 << TIMER_BIT;
}

mod idl {
    use drv_fieldbus_api::FieldbusError;
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
