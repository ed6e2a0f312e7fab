// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CRC-32 checked record framing for `drv-store`'s NVM areas.
//!
//! An area is a header followed by a fixed number of equal-size slots.
//! Both the header and each slot carry their own trailing CRC-32 so a
//! torn or corrupted write is detected independently at whichever
//! granularity it happened. Everything here operates on plain byte
//! buffers; `drv-store` owns the actual I2C transport.

#![no_std]
#[cfg(test)]
extern crate std;

use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

/// Size in bytes of an encoded [`AreaHeader`].
pub const HEADER_LEN: usize = 12;

/// Number of trailing CRC-32 bytes appended to every slot.
pub const SLOT_CRC_LEN: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordError {
    /// Buffer too small to hold the header or slot it was asked to hold.
    ShortBuffer,
    /// Header magic, version, or CRC did not check out; the area should
    /// be treated as uninitialized and reformatted.
    BadHeader,
    /// Slot CRC did not check out; the slot should be skipped.
    BadSlot,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoBytes, FromBytes, Immutable, Unaligned)]
struct RawHeader {
    magic: [u8; 4],
    version: u8,
    count: u8,
    reserved: [u8; 2],
    crc: [u8; 4],
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AreaHeader {
    pub version: u8,
    pub count: u8,
}

fn crc32(data: &[u8]) -> u32 {
    const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
    CRC.checksum(data)
}

/// Encodes an area header with `magic`, `version`, and `count` into
/// `buf`, which must be at least [`HEADER_LEN`] bytes.
pub fn encode_header(buf: &mut [u8], magic: u32, version: u8, count: u8) -> Result<(), RecordError> {
    if buf.len() < HEADER_LEN {
        return Err(RecordError::ShortBuffer);
    }
    let mut raw = RawHeader {
        magic: magic.to_le_bytes(),
        version,
        count,
        reserved: [0; 2],
        crc: [0; 4],
    };
    let crc = crc32(&raw.as_bytes()[..8]);
    raw.crc = crc.to_le_bytes();
    buf[..HEADER_LEN].copy_from_slice(raw.as_bytes());
    Ok(())
}

/// Decodes and validates the area header in `buf` against the expected
/// `magic`. A [`RecordError::BadHeader`] means the area is either blank
/// flash/FRAM or corrupted, and the caller should reinitialize it with
/// [`encode_header`].
pub fn decode_header(buf: &[u8], magic: u32) -> Result<AreaHeader, RecordError> {
    if buf.len() < HEADER_LEN {
        return Err(RecordError::ShortBuffer);
    }
    let raw = RawHeader::read_from_bytes(&buf[..HEADER_LEN]).map_err(|_| RecordError::BadHeader)?;
    if u32::from_le_bytes(raw.magic) != magic {
        return Err(RecordError::BadHeader);
    }
    if crc32(&raw.as_bytes()[..8]) != u32::from_le_bytes(raw.crc) {
        return Err(RecordError::BadHeader);
    }
    Ok(AreaHeader {
        version: raw.version,
        count: raw.count,
    })
}

/// Encodes `payload` into `buf` followed by its CRC-32. `buf` must be
/// exactly `payload.len() + SLOT_CRC_LEN` bytes.
pub fn encode_slot(buf: &mut [u8], payload: &[u8]) -> Result<(), RecordError> {
    if buf.len() != payload.len() + SLOT_CRC_LEN {
        return Err(RecordError::ShortBuffer);
    }
    let (data, trailer) = buf.split_at_mut(payload.len());
    data.copy_from_slice(payload);
    trailer.copy_from_slice(&crc32(payload).to_le_bytes());
    Ok(())
}

/// Validates and returns the payload portion of an encoded slot. A
/// [`RecordError::BadSlot`] means the slot should be skipped, not
/// propagated as a fault.
pub fn decode_slot(buf: &[u8]) -> Result<&[u8], RecordError> {
    if buf.len() < SLOT_CRC_LEN {
        return Err(RecordError::ShortBuffer);
    }
    let (payload, trailer) = buf.split_at(buf.len() - SLOT_CRC_LEN);
    let stored = u32::from_le_bytes(trailer.try_into().unwrap());
    if crc32(payload) != stored {
        return Err(RecordError::BadSlot);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x424F_494C;

    #[test]
    fn header_round_trips() {
        let mut buf = [0u8; HEADER_LEN];
        encode_header(&mut buf, MAGIC, 3, 20).unwrap();
        let hdr = decode_header(&buf, MAGIC).unwrap();
        assert_eq!(hdr.version, 3);
        assert_eq!(hdr.count, 20);
    }

    #[test]
    fn header_wrong_magic_is_blank_area() {
        let mut buf = [0u8; HEADER_LEN];
        encode_header(&mut buf, MAGIC, 1, 1).unwrap();
        assert_eq!(decode_header(&buf, 0xDEAD_BEEF), Err(RecordError::BadHeader));
    }

    #[test]
    fn header_bit_flip_is_detected() {
        let mut buf = [0u8; HEADER_LEN];
        encode_header(&mut buf, MAGIC, 1, 1).unwrap();
        buf[5] ^= 0x01;
        assert_eq!(decode_header(&buf, MAGIC), Err(RecordError::BadHeader));
    }

    #[test]
    fn all_zero_buffer_is_blank_area() {
        let buf = [0u8; HEADER_LEN];
        assert_eq!(decode_header(&buf, MAGIC), Err(RecordError::BadHeader));
    }

    #[test]
    fn slot_round_trips() {
        let payload = [1u8, 2, 3, 4, 5];
        let mut buf = [0u8; 9];
        encode_slot(&mut buf, &payload).unwrap();
        assert_eq!(decode_slot(&buf).unwrap(), &payload);
    }

    #[test]
    fn slot_corruption_is_detected() {
        let payload = [1u8, 2, 3, 4, 5];
        let mut buf = [0u8; 9];
        encode_slot(&mut buf, &payload).unwrap();
        buf[2] ^= 0xFF;
        assert_eq!(decode_slot(&buf), Err(RecordError::BadSlot));
    }

    #[test]
    fn slot_wrong_buffer_size_is_rejected() {
        let payload = [1u8, 2, 3];
        let mut buf = [0u8; 10];
        assert_eq!(encode_slot(&mut buf, &payload), Err(RecordError::ShortBuffer));
    }
}
