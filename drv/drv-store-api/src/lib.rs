// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the persistent NVM record store (C10).
//!
//! The store is organized into a fixed set of [`Area`]s, each a header
//! followed by a fixed number of fixed-size slots. Callers address a
//! record by `(area, slot)`; `drv-store` handles the CRC-32 framing and
//! bad-header/bad-slot recovery underneath.

#![no_std]

use derive_idol_err::IdolError;
use serde::{Deserialize, Serialize};
use userlib::*;

/// Magic value stamped in every area's header.
pub const STORE_MAGIC: u32 = 0x424F_494C;
pub const STORE_VERSION: u8 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Area {
    /// PID controller state, one slot per controller id (§4.7).
    PidState = 0,
    /// Calendar schedule entries.
    Schedules = 1,
    /// Long-lived counters (pump/burner start counts, etc.), one slot
    /// per counter id.
    Counters = 2,
    /// Safety configuration (lockout thresholds, guarded-relay list).
    SafetyConfig = 3,
    /// General fault log ring.
    ErrorLogGeneral = 4,
    /// Critical fault log ring.
    ErrorLogCritical = 5,
}

pub const NUM_AREAS: usize = 6;

impl Area {
    pub const ALL: [Area; NUM_AREAS] = [
        Area::PidState,
        Area::Schedules,
        Area::Counters,
        Area::SafetyConfig,
        Area::ErrorLogGeneral,
        Area::ErrorLogCritical,
    ];

    /// `(slot count, payload bytes per slot)` for this area. The
    /// schedules area is sized to the data model's "at most 20 slots of
    /// at most 56 bytes"; the others are sized to what their record
    /// shape needs.
    pub const fn layout(self) -> (u8, usize) {
        match self {
            Area::PidState => (4, 24),
            Area::Schedules => (20, 56),
            Area::Counters => (16, 4),
            Area::SafetyConfig => (1, 64),
            Area::ErrorLogGeneral => (50, 16),
            Area::ErrorLogCritical => (5, 16),
        }
    }
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IdolError, Serialize, Deserialize, counters::Count,
)]
#[repr(u32)]
pub enum StoreError {
    InvalidArea = 1,
    InvalidSlot = 2,
    BusError = 3,
    /// Caller's lease didn't match the area's slot payload length.
    BadLength = 4,
}

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
