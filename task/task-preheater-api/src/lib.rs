// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the return preheater (C8).

#![no_std]

use serde::{Deserialize, Serialize};
use userlib::*;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum PreheaterState {
    Idle = 0,
    Preheating = 1,
    Complete = 2,
    Timeout = 3,
}

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
