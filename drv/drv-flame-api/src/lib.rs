// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for flame-rectification sensing.
//!
//! Flame detection is a digital input wired directly to the controller
//! rather than a reading on the shared field bus (§4.3): it must answer
//! within the burner state machine's sub-second timing windows, which a
//! 500 ms-sliced bus cannot guarantee.

#![no_std]

include!(concat!(env!("OUT_DIR"), "/client_stub.rs"));
