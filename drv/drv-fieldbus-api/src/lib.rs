// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the time-division field bus scheduler.
//!
//! The scheduler owns the single half-duplex serial bus shared by the
//! room sensor, the boiler sensor block and the relay module. Callers
//! never touch the transport directly; they register interest in an
//! [`OpKind`] and are notified on the tick that owns it.

#![no_std]

use derive_idol_err::IdolError;
use serde::{Deserialize, Serialize};
use userlib::*;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, counters::Count)]
#[repr(u8)]
pub enum OpKind {
    RoomRead = 0,
    BoilerRead = 1,
    RelayWrite = 2,
    RelayVerify = 3,
}

/// A peripheral's station address on the bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Station(pub u8);

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IdolError, Serialize, Deserialize, counters::Count,
)]
#[repr(u32)]
pub enum FieldbusError {
    /// The transport reported a framing or timeout error after retries.
    BusError = 1,
    /// No task registered interest in this op kind.
    NotRegistered = 2,
    /// A second task tried to register the same op kind.
    AlreadyRegistered = 3,
    /// A transaction exceeded its 500 ms per-transaction timeout.
    Timeout = 4,
}

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
