// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flame-rectification sensing.
//!
//! A single digital input wired directly to the controller rather than
//! carried on the shared field bus (§4.3), so it can answer inside the
//! burner state machine's sub-second ignition timing windows. A read
//! failure is reported as "no flame" — the safe assumption — rather
//! than propagated, since the burner's ignition-retry and flame-loss
//! handling already treat "no flame" as the conservative default.

#![no_std]
#![no_main]

use idol_runtime::NotificationHandler;
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use userlib::*;

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    Detected,
    NotDetected,
    BusError,
}

counted_ringbuf!(Trace, 16, Trace::None);

mod backing {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct BusError;

    pub trait FlameInput {
        fn read(&mut self) -> Result<bool, BusError>;
    }

    pub struct GpioPin;

    impl FlameInput for GpioPin {
        fn read(&mut self) -> Result<bool, BusError> {
            Err(BusError)
        }
    }
}

struct ServerImpl {
    input: backing::GpioPin,
}

impl ServerImpl {
    fn new() -> Self {
        ServerImpl { input: backing::GpioPin }
    }
}

#[export_name = "main"]
fn main() -> ! {
    let mut server = ServerImpl::new();
    let mut buf = [0u8; idl::INCOMING_SIZE];
    loop {
        idol_runtime::dispatch(&mut buf, &mut server);
    }
}

impl idl::InOrderFlameImpl for ServerImpl {
    fn detected(
        &mut self,
        _msg: &RecvMessage,
    ) -> Result<bool, idol_runtime::RequestError<core::convert::Infallible>> {
        use backing::FlameInput;
        match self.input.read() {
            Ok(true) => {
                ringbuf_entry!(Trace::Detected);
                Ok(true)
            }
            Ok(false) => {
                ringbuf_entry!(Trace::NotDetected);
                Ok(false)
            }
            Err(_) => {
                ringbuf_entry!(Trace::BusError);
                Ok(false)
            }
        }
    }
}

impl NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        0
    }

    fn handle_notification(&mut self, _bits: u32) {}
}

mod idl {
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
