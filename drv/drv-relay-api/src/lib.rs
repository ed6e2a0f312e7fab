// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the relay command layer (C4).
//!
//! Any task may write a relay's desired state and read back the last
//! confirmed actual state; the relay task itself is the sole writer of
//! the intermediate "sent" state and the sole agent that talks to the
//! hardware.

#![no_std]

use derive_idol_err::IdolError;
use serde::{Deserialize, Serialize};
use userlib::*;

/// Number of relays on the 8-channel relay module.
pub const NUM_RELAYS: usize = 8;

/// Relays whose motors need protection from rapid cycling enforce a
/// minimum state-change interval (default 30 s); a request that arrives
/// sooner is deferred, not dropped.
pub const DEFAULT_MIN_CHANGE_INTERVAL_MS: u64 = 30_000;

/// Hardware watchdog: a relay commanded ON auto-turns-off this long
/// after its last refresh if the controller stops refreshing it.
pub const WATCHDOG_PERIOD_MS: u64 = 10_000;

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IdolError, Serialize, Deserialize, counters::Count,
)]
#[repr(u32)]
pub enum RelayError {
    InvalidRelay = 1,
    BusError = 2,
    PersistentMismatch = 3,
}

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
