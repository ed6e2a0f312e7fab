// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the task supervisor (C12).

#![no_std]

use derive_idol_err::IdolError;
use serde::{Deserialize, Serialize};
use userlib::*;

/// Health as tracked by the supervisor's own bookkeeping, which is
/// coarser than the kernel's scheduling state: a task waiting out its
/// backoff window between restarts reports `Restarting`, not `Held`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum TaskHealth {
    Running = 0,
    Restarting = 1,
    Held = 2,
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IdolError, Serialize, Deserialize, counters::Count,
)]
#[repr(u32)]
pub enum JefeError {
    InvalidTask = 1,
}

/// Bit in the supervisor's broadcast state word (`set_state`/`get_state`)
/// that gets set once an emergency stop has been declared, whether by an
/// explicit `emergency_stop` call or by a critical task exhausting its
/// restart budget. Never cleared short of a controller reset — §5 says a
/// reboot is the only way out of a persistent critical fault.
pub const EMERGENCY_STOP_BIT: u16 = 1 << 15;

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
