// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the burner state machine and demand arbiter (C6/C7).

#![no_std]

use derive_idol_err::IdolError;
use serde::{Deserialize, Serialize};
use userlib::*;

/// The two demand sources the arbiter chooses between.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Circuit {
    Heating = 0,
    Water = 1,
}

pub const NUM_CIRCUITS: usize = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum BurnerState {
    Idle = 0,
    PrePurge = 1,
    Ignition = 2,
    BurningLow = 3,
    BurningHigh = 4,
    PostPurge = 5,
    Lockout = 6,
    Error = 7,
    EmergencyStop = 8,
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IdolError, Serialize, Deserialize, counters::Count,
)]
#[repr(u32)]
pub enum BurnerError {
    InvalidCircuit = 1,
    /// `reset_lockout` called while not in `LOCKOUT` or `EMERGENCY_STOP`.
    NotInLockout = 2,
    /// Reset from `EMERGENCY_STOP` requested but the pre-ignition
    /// interlocks (§4.7) still fail.
    InterlocksNotMet = 3,
    InvalidMethod = 4,
    /// `start_autotune` requested a circuit that isn't the one the
    /// burner is currently burning for.
    AutotuneNotAllowed = 5,
    AutotuneBusy = 6,
}

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
