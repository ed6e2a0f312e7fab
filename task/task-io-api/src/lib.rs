// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the shared readings store (C2) and its bus-driven
//! publication (C3's consumer side).

#![no_std]

use derive_idol_err::IdolError;
use serde::{Deserialize, Serialize};
use userlib::*;

/// A sensor reading goes stale (and so invalid) if it hasn't been
/// refreshed within this long.
pub const STALE_THRESHOLD_MS: u32 = 15_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    BoilerOutput = 0,
    BoilerReturn = 1,
    DhwTank = 2,
    DhwReturn = 3,
    HeatingReturn = 4,
    Outside = 5,
    Room = 6,
    Pressure = 7,
}

pub const NUM_CHANNELS: usize = 8;

impl Channel {
    pub const ALL: [Channel; NUM_CHANNELS] = [
        Channel::BoilerOutput,
        Channel::BoilerReturn,
        Channel::DhwTank,
        Channel::DhwReturn,
        Channel::HeatingReturn,
        Channel::Outside,
        Channel::Room,
        Channel::Pressure,
    ];

    /// Compile-time valid range for this channel, in the raw i16 units
    /// the channel is stored in (tenths of \u{b0}C, or hundredths of bar for
    /// `Pressure`). A published value outside this range is rejected.
    pub const fn valid_range(self) -> (i16, i16) {
        match self {
            Channel::BoilerOutput | Channel::BoilerReturn | Channel::HeatingReturn => {
                (-500, 1500)
            }
            Channel::DhwTank | Channel::DhwReturn => (-500, 1000),
            Channel::Outside => (-400, 600),
            Channel::Room => (-100, 500),
            // 0.00 to 6.00 bar.
            Channel::Pressure => (0, 600),
        }
    }
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IdolError, Serialize, Deserialize, counters::Count,
)]
#[repr(u32)]
pub enum IoError {
    InvalidChannel = 1,
}

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
