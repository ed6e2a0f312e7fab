// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Return preheater (C8).
//!
//! Runs independently of the burner state machine, polling the boiler
//! output/return differential once a second. Once the differential
//! crosses the block threshold it progressively cycles the pump on and
//! off, shortening the OFF time and lengthening the ON time each cycle,
//! until the differential is safe again, eight cycles have run, or ten
//! minutes have elapsed. `task-pump` defers to [`pump_should_run`] while
//! this is PREHEATING instead of driving the pump off its own mode flag.

#![no_std]
#![no_main]

use boiler_types::Temperature;
use multitimer::{Multitimer, Repeat};
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use task_io_api::{Channel, Io};
use task_preheater_api::PreheaterState;
use userlib::*;

task_slot!(IO, task_io);

/// Differential above which preheating is required.
const BLOCK_THRESHOLD: Temperature = Temperature::from_tenths(350);
/// Differential below which preheating is considered resolved.
const EXIT_THRESHOLD: Temperature = Temperature::from_tenths(250);

const MAX_CYCLES: u8 = 8;
const OVERALL_TIMEOUT_S: u32 = 600;
const ON_DURATIONS_S: [u32; 5] = [3, 5, 8, 12, 15];
const OFF_DURATIONS_S: [u32; 5] = [25, 20, 15, 10, 5];

fn on_duration(cycle: u8) -> u32 {
    ON_DURATIONS_S[(cycle as usize).min(ON_DURATIONS_S.len() - 1)]
}

fn off_duration(cycle: u8) -> u32 {
    OFF_DURATIONS_S[(cycle as usize).min(OFF_DURATIONS_S.len() - 1)]
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, enum_map::Enum)]
enum TimerName {
    Tick,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Phase {
    On,
    Off,
}

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    Started,
    CycleAdvance(u8),
    Complete,
    Timeout,
    Rearmed,
    SensorsNotReady,
}

counted_ringbuf!(Trace, 32, Trace::None);

struct ServerImpl {
    timer: Multitimer<TimerName>,
    state: PreheaterState,
    cycle: u8,
    phase: Phase,
    phase_elapsed_s: u32,
    total_elapsed_s: u32,
}

impl ServerImpl {
    fn differential(&self) -> Option<Temperature> {
        let io = Io::from(IO.get_task_id());
        let output = io.reading(Channel::BoilerOutput as u8).ok()?;
        let return_ = io.reading(Channel::BoilerReturn as u8).ok()?;
        let (out_raw, out_valid, _) = output;
        let (ret_raw, ret_valid, _) = return_;
        if !out_valid || !ret_valid {
            return None;
        }
        Some(Temperature::from_tenths(out_raw).abs_diff(Temperature::from_tenths(ret_raw)))
    }

    fn start(&mut self) {
        self.state = PreheaterState::Preheating;
        self.cycle = 0;
        self.phase = Phase::On;
        self.phase_elapsed_s = 0;
        self.total_elapsed_s = 0;
        ringbuf_entry!(Trace::Started);
    }

    fn on_tick(&mut self) {
        let differential = self.differential();
        if differential.is_none() {
            ringbuf_entry!(Trace::SensorsNotReady);
        }

        match self.state {
            PreheaterState::Idle => {
                if let Some(d) = differential {
                    if d >= BLOCK_THRESHOLD {
                        self.start();
                    }
                }
            }
            PreheaterState::Preheating => {
                self.total_elapsed_s += 1;
                self.phase_elapsed_s += 1;

                if let Some(d) = differential {
                    if d < EXIT_THRESHOLD {
                        self.state = PreheaterState::Complete;
                        ringbuf_entry!(Trace::Complete);
                        return;
                    }
                }
                if self.total_elapsed_s >= OVERALL_TIMEOUT_S {
                    self.state = PreheaterState::Timeout;
                    ringbuf_entry!(Trace::Timeout);
                    return;
                }

                let phase_len = match self.phase {
                    Phase::On => on_duration(self.cycle),
                    Phase::Off => off_duration(self.cycle),
                };
                if self.phase_elapsed_s >= phase_len {
                    self.phase_elapsed_s = 0;
                    self.phase = match self.phase {
                        Phase::On => Phase::Off,
                        Phase::Off => {
                            self.cycle += 1;
                            ringbuf_entry!(Trace::CycleAdvance(self.cycle));
                            if self.cycle >= MAX_CYCLES {
                                self.state = PreheaterState::Complete;
                                ringbuf_entry!(Trace::Complete);
                            }
                            Phase::On
                        }
                    };
                }
            }
            PreheaterState::Complete | PreheaterState::Timeout => {
                if let Some(d) = differential {
                    if d < EXIT_THRESHOLD {
                        self.state = PreheaterState::Idle;
                        ringbuf_entry!(Trace::Rearmed);
                    }
                }
            }
        }
    }
}

#[export_name = "main"]
fn main() -> ! {
    let mut timer = Multitimer::<TimerName>::new(notifications::TIMER_BIT);
    timer.set_timer(
        TimerName::Tick,
        sys_get_timer().now + 1_000,
        Some(Repeat::AfterDeadline(1_000)),
    );

    let mut server = ServerImpl {
        timer,
        state: PreheaterState::Idle,
        cycle: 0,
        phase: Phase::On,
        phase_elapsed_s: 0,
        total_elapsed_s: 0,
    };

    let mut buf = [0u8; idl::INCOMING_SIZE];
    loop {
        idol_runtime::dispatch(&mut buf, &mut server);
    }
}

impl idl::InOrderPreheaterImpl for ServerImpl {
    fn state(&mut self, _msg: &RecvMessage) -> Result<u8, idol_runtime::RequestError<core::convert::Infallible>> {
        Ok(self.state as u8)
    }

    fn pump_should_run(
        &mut self,
        _msg: &RecvMessage,
    ) -> Result<bool, idol_runtime::RequestError<core::convert::Infallible>> {
        Ok(self.state == PreheaterState::Preheating && self.phase == Phase::On)
    }
}

impl idol_runtime::NotificationHandler for ServerImpl {
    fn current_notification_mask(&self) -> u32 {
        notifications::TIMER_MASK
    }

    fn handle_notification(&mut self, bits: u32) {
        self.timer.handle_notification(bits);
        for _ in self.timer.iter_fired() {
            self.on_tick();
        }
    }
}

mod notifications {
    pub const TIMER_BIT: u8 = 0;
    pub const TIMER_MASK: u32 = 1 << TIMER_BIT;
}

mod idl {
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
