// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the fault taxonomy and rate-limited error log (C13).

#![no_std]

use serde::{Deserialize, Serialize};
use userlib::*;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize, counters::Count)]
#[repr(u8)]
pub enum FaultKind {
    SensorInvalid = 0,
    SensorStale = 1,
    BusError = 2,
    RelayMismatch = 3,
    FlameFailure = 4,
    OverTemperature = 5,
    UnderPressure = 6,
    OverPressure = 7,
    MutexTimeout = 8,
    MemoryAllocation = 9,
    StorageCorruption = 10,
    WatchdogTimeout = 11,
    DependencyFailed = 12,
}

pub const NUM_FAULT_KINDS: usize = 13;

impl FaultKind {
    pub const ALL: [FaultKind; NUM_FAULT_KINDS] = [
        FaultKind::SensorInvalid,
        FaultKind::SensorStale,
        FaultKind::BusError,
        FaultKind::RelayMismatch,
        FaultKind::FlameFailure,
        FaultKind::OverTemperature,
        FaultKind::UnderPressure,
        FaultKind::OverPressure,
        FaultKind::MutexTimeout,
        FaultKind::MemoryAllocation,
        FaultKind::StorageCorruption,
        FaultKind::WatchdogTimeout,
        FaultKind::DependencyFailed,
    ];
}

/// Log interval bounds, in milliseconds, between which a repeatedly
/// reported fault of the same kind backs off exponentially.
pub const INITIAL_LOG_INTERVAL_MS: u32 = 1_000;
pub const MAX_LOG_INTERVAL_MS: u32 = 300_000;

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
