// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for pump control (C9).

#![no_std]

use derive_idol_err::IdolError;
use serde::{Deserialize, Serialize};
use userlib::*;

/// Two identical, independently parameterised pump instances (the
/// heating circulator and the DHW pump).
pub const NUM_PUMPS: usize = 2;

/// Default post-mode-off cooldown, in milliseconds.
pub const DEFAULT_COOLDOWN_MS: u64 = 180_000;

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IdolError, Serialize, Deserialize, counters::Count,
)]
#[repr(u32)]
pub enum PumpError {
    InvalidPump = 1,
}

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
