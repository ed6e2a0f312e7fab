// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The half-duplex serial transport underneath the bus scheduler.
//!
//! On target this would drive a UART peripheral directly; that register
//! map is board-specific and out of scope here, so `Transport` is the
//! seam a board support crate would fill in.

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    Timeout,
    Framing,
}

pub trait Transport {
    /// Send `tx` to `station` and read back into `rx`, returning the
    /// number of bytes received.
    fn exchange(
        &mut self,
        station: u8,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<usize, TransportError>;

    fn delay_ms(&mut self, ms: u64);
}

/// Runs a single bus transaction with the configured retry policy.
pub fn transact_with_retries(
    transport: &mut impl Transport,
    station: u8,
    tx: &[u8],
    rx: &mut [u8],
    max_retries: u8,
    inter_frame_delay_ms: u64,
) -> Result<usize, TransportError> {
    let mut last_err = TransportError::Timeout;
    for attempt in 0..=max_retries {
        match transport.exchange(station, tx, rx) {
            Ok(n) => return Ok(n),
            Err(e) => {
                last_err = e;
                if attempt < max_retries {
                    transport.delay_ms(inter_frame_delay_ms);
                }
            }
        }
    }
    Err(last_err)
}

pub mod hw {
    //! Placeholder for the on-target UART transport. Real register access
    //! belongs to a board support crate; this exists so the scheduler task
    //! links.

    use super::{Transport, TransportError};

    pub struct Uart;

    impl Transport for Uart {
        fn exchange(
            &mut self,
            _station: u8,
            _tx: &[u8],
            _rx: &mut [u8],
        ) -> Result<usize, TransportError> {
            Err(TransportError::Timeout)
        }

        fn delay_ms(&mut self, ms: u64) {
            userlib::hl::sleep_for(ms);
        }
    }
}
