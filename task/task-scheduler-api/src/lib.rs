// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the calendar scheduler (C11).
//!
//! `add_schedule`'s lease carries an opaque [`RECORD_LEN`]-byte record;
//! this crate owns that layout so any caller can build one without
//! reaching into `task-scheduler`'s internals.

#![no_std]

use derive_idol_err::IdolError;
use serde::{Deserialize, Serialize};
use userlib::*;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum ScheduleKind {
    Water = 0,
    Space = 1,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum SpaceMode {
    Comfort = 0,
    Eco = 1,
    Frost = 2,
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IdolError, Serialize, Deserialize, counters::Count,
)]
#[repr(u32)]
pub enum SchedulerError {
    InvalidId = 1,
    InvalidKind = 2,
    TooManySchedules = 3,
    /// Lease length didn't match [`RECORD_LEN`].
    BadLength = 4,
    /// Record's own CRC-32 didn't check out.
    BadRecord = 5,
    StoreError = 6,
}

/// Byte length of an on-the-wire schedule record, matching `drv-store`'s
/// `Area::Schedules` slot size.
pub const RECORD_LEN: usize = 56;
pub const MAX_SCHEDULES: usize = 20;
pub const NAME_LEN: usize = 24;
pub const ACTION_DATA_LEN: usize = 16;

/// A `TimerSchedule`, decoded from (or ready to encode into) a raw
/// [`RECORD_LEN`]-byte slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScheduleRecord {
    pub id: u8,
    pub kind: ScheduleKind,
    pub day_mask: u8,
    pub start_hour: u8,
    pub start_minute: u8,
    pub end_hour: u8,
    pub end_minute: u8,
    pub enabled: bool,
    pub name: [u8; NAME_LEN],
    pub action_data: [u8; ACTION_DATA_LEN],
}

fn crc32(data: &[u8]) -> u32 {
    const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
    CRC.checksum(data)
}

impl ScheduleRecord {
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0] = self.id;
        buf[1] = self.kind as u8;
        buf[2] = self.day_mask;
        buf[3] = self.start_hour;
        buf[4] = self.start_minute;
        buf[5] = self.end_hour;
        buf[6] = self.end_minute;
        buf[7] = self.enabled as u8;
        buf[8..8 + NAME_LEN].copy_from_slice(&self.name);
        let action_start = 8 + NAME_LEN;
        buf[action_start..action_start + ACTION_DATA_LEN].copy_from_slice(&self.action_data);
        let crc_start = action_start + ACTION_DATA_LEN;
        let crc = crc32(&buf[..crc_start]);
        buf[crc_start..crc_start + 4].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; RECORD_LEN]) -> Result<Self, SchedulerError> {
        let action_start = 8 + NAME_LEN;
        let crc_start = action_start + ACTION_DATA_LEN;
        let stored_crc = u32::from_le_bytes(buf[crc_start..crc_start + 4].try_into().unwrap());
        if crc32(&buf[..crc_start]) != stored_crc {
            return Err(SchedulerError::BadRecord);
        }
        let kind = ScheduleKind::from_u8(buf[1]).ok_or(SchedulerError::InvalidKind)?;
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&buf[8..8 + NAME_LEN]);
        let mut action_data = [0u8; ACTION_DATA_LEN];
        action_data.copy_from_slice(&buf[action_start..action_start + ACTION_DATA_LEN]);
        Ok(ScheduleRecord {
            id: buf[0],
            kind,
            day_mask: buf[2],
            start_hour: buf[3],
            start_minute: buf[4],
            end_hour: buf[5],
            end_minute: buf[6],
            enabled: buf[7] != 0,
            name,
            action_data,
        })
    }
}

/// `actionData` payload for a [`ScheduleKind::Water`] schedule.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WaterAction {
    pub target_tenths: i16,
    pub priority: bool,
}

impl WaterAction {
    pub fn encode(&self) -> [u8; ACTION_DATA_LEN] {
        let mut buf = [0u8; ACTION_DATA_LEN];
        buf[0..2].copy_from_slice(&self.target_tenths.to_le_bytes());
        buf[2] = self.priority as u8;
        buf
    }

    pub fn decode(buf: &[u8; ACTION_DATA_LEN]) -> Self {
        WaterAction {
            target_tenths: i16::from_le_bytes(buf[0..2].try_into().unwrap()),
            priority: buf[2] != 0,
        }
    }
}

/// `actionData` payload for a [`ScheduleKind::Space`] schedule.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SpaceAction {
    pub target_tenths: i16,
    pub mode: SpaceMode,
    pub zones: u8,
}

impl SpaceAction {
    pub fn encode(&self) -> [u8; ACTION_DATA_LEN] {
        let mut buf = [0u8; ACTION_DATA_LEN];
        buf[0..2].copy_from_slice(&self.target_tenths.to_le_bytes());
        buf[2] = self.mode as u8;
        buf[3] = self.zones;
        buf
    }

    pub fn decode(buf: &[u8; ACTION_DATA_LEN]) -> Option<Self> {
        Some(SpaceAction {
            target_tenths: i16::from_le_bytes(buf[0..2].try_into().unwrap()),
            mode: SpaceMode::from_u8(buf[2])?,
            zones: buf[3],
        })
    }
}

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
