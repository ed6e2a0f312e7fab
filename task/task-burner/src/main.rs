// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Burner state machine and demand arbiter (C6/C7).
//!
//! Arbitrates between the heating and water demand sources, runs the
//! ignition sequence and anti-short-cycle timers, and validates every
//! tick against the pre-ignition interlocks and operating safety
//! checks before letting gas flow. The inner loop is a fixed-point PID
//! against the boiler output temperature; its sign is clamped to
//! non-negative since an atmospheric burner can only add heat, and its
//! magnitude only ever classifies the burner into the low/high firing
//! state and drives the anti-flap comparison — this single relay has
//! no continuous modulation output of its own.
//!
//! The relay-feedback auto-tuner may replace the PID output for the
//! circuit currently holding the burner; tuned gains are applied
//! atomically and persisted to `drv-store` immediately on completion.

#![no_std]
#![no_main]

use boiler_pid::{AutoTuneError, AutoTuner, Gains, Pid, TuneMethod};
use boiler_types::Temperature;
use drv_flame_api::Flame;
use drv_relay_api::Relay;
use drv_store_api::{Area, Store};
use idol_runtime::{NotificationHandler, RequestError};
use multitimer::{Multitimer, Repeat};
use ringbuf::{counted_ringbuf, ringbuf_entry, Count};
use task_burner_api::{BurnerError, BurnerState, Circuit, NUM_CIRCUITS};
use task_faultlog_api::{Faultlog, FaultKind};
use task_io_api::{Channel, Io};
use task_pump_api::Pump;
use userlib::*;

include!(concat!(env!("OUT_DIR"), "/burner_config.rs"));

task_slot!(IO, task_io);
task_slot!(RELAY, drv_relay);
task_slot!(FLAME, drv_flame);
task_slot!(STORE, drv_store);
task_slot!(PUMP, task_pump);
task_slot!(FAULTLOG, task_faultlog);

const TICK_MS: u32 = 100;

/// Critical shutdown ceiling (§4.7); the pre-ignition gate itself trips
/// 5 °C lower, at [`BOILER_OUTPUT_MAX`].
const BOILER_OUTPUT_CRITICAL: Temperature = Temperature::from_tenths(1150);
const BOILER_OUTPUT_MAX: Temperature = Temperature::from_tenths(1100);
const DHW_MAX: Temperature = Temperature::from_tenths(650);
const PREHEAT_BLOCK_THRESHOLD: Temperature = Temperature::from_tenths(350);

/// Pressure readings are hundredths of a bar (§4.2/task-io-api).
const PRESSURE_MIN: i16 = 100;
const PRESSURE_MAX: i16 = 350;
const PRESSURE_ALARM_MIN: i16 = 50;
const PRESSURE_ALARM_MAX: i16 = 400;

const RATE_OF_RISE_MAX_TENTHS_PER_S: i32 = 100;

const POWER_SPLIT_PCT: i32 = 50;
const POWER_CHANGE_THRESHOLD_PCT: i32 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq, enum_map::Enum)]
enum TimerName {
    Tick,
}

#[derive(Copy, Clone, PartialEq, Count)]
enum Trace {
    #[count(skip)]
    None,

    HolderPicked(Circuit),
    PrePurgeStarted,
    IgnitionStarted,
    IgnitionRetry(u8),
    FlameConfirmed,
    EnteredLockout,
    EnteredError(FaultKind),
    PostPurgeStarted,
    ReturnedIdle,
    PowerChanged(i32),
    AutotuneStarted(Circuit),
    AutotuneFinished,
    AutotuneRejected,
    RelayBusError,
    PumpBusError,
    StoreBusError,
}

counted_ringbuf!(Trace, 64, Trace::None);

fn decode_circuit(circuit: u8) -> Option<Circuit> {
    match circuit {
        0 => Some(Circuit::Heating),
        1 => Some(Circuit::Water),
        _ => None,
    }
}

fn decode_method(method: u8) -> Option<TuneMethod> {
    match method {
        0 => Some(TuneMethod::ZieglerNicholsPi),
        1 => Some(TuneMethod::ZieglerNicholsPid),
        2 => Some(TuneMethod::TyreusLuyben),
        3 => Some(TuneMethod::CohenCoon),
        4 => Some(TuneMethod::Lambda),
        _ => None,
    }
}

fn encode_pid_record(gains: Gains, integral: i32) -> [u8; 24] {
    let mut buf = [0u8; 24];
    buf[0..4].copy_from_slice(&gains.kp.to_le_bytes());
    buf[4..8].copy_from_slice(&gains.ki.to_le_bytes());
    buf[8..12].copy_from_slice(&gains.kd.to_le_bytes());
    buf[12..16].copy_from_slice(&integral.to_le_bytes());
    buf
}

fn decode_pid_record(buf: &[u8; 24]) -> (Gains, i32) {
    let kp = i32::from_le_bytes(buf[0..4].try_into().unwrap());
    let ki = i32::from_le_bytes(buf[4..8].try_into().unwrap());
    let kd = i32::from_le_bytes(buf[8..12].try_into().unwrap());
    let integral = i32::from_le_bytes(buf[12..16].try_into().unwrap());
    (Gains { kp, ki, kd }, integral)
}

/// Default gains used until an auto-tune or a persisted record replaces
/// them; modest values safe for an un-tuned atmospheric boiler loop.
const DEFAULT_GAINS: Gains = Gains {
    kp: 2_000,
    ki: 100,
    kd: 0,
};

#[derive(Copy, Clone)]
struct Demand {
    active: bool,
    target: Temperature,
    priority: bool,
    expires_at_ms: u32,
    became_active_at_ms: u32,
}

impl Demand {
    const fn new() -> Self {
        Demand {
            active: false,
            target: Temperature::INVALID,
            priority: false,
            expires_at_ms: 0,
            became_active_at_ms: 0,
        }
    }
}

struct ServerImpl {
    timer: Multitimer<TimerName>,
    state: BurnerState,
    demand: [Demand; NUM_CIRCUITS],
    holder: Option<Circuit>,
    state_entered_ms: u32,
    burn_started_ms: u32,
    ignition_attempts: u8,
    last_power_change_ms: u32,
    last_power_pct: i32,
    requested_power_pct: i32,
    rate_last_tenths: i16,
    rate_last_ms: u32,
    rate_has_last: bool,
    pid_heating: Pid,
    pid_water: Pid,
    autotune: Option<(Circuit, AutoTuner)>,
}

impl ServerImpl {
    fn new() -> Self {
        let mut timer = Multitimer::<TimerName>::new(notifications::TIMER_BIT);
        timer.set_timer(
            TimerName::Tick,
            sys_get_timer().now + TICK_MS as u64,
            Some(Repeat::AfterDeadline(TICK_MS as u64)),
        );

        let (heating_gains, heating_integral) = load_pid_record(0);
        let (water_gains, water_integral) = load_pid_record(1);

        ServerImpl {
            timer,
            state: BurnerState::Idle,
            demand: [Demand::new(); NUM_CIRCUITS],
            holder: None,
            state_entered_ms: 0,
            burn_started_ms: 0,
            ignition_attempts: 0,
            last_power_change_ms: 0,
            last_power_pct: 0,
            requested_power_pct: 0,
            rate_last_tenths: 0,
            rate_last_ms: 0,
            rate_has_last: false,
            pid_heating: Pid::from_state(heating_gains, {
                let mut s = boiler_pid::PidState::default();
                s.integral = heating_integral;
                s
            }),
            pid_water: Pid::from_state(water_gains, {
                let mut s = boiler_pid::PidState::default();
                s.integral = water_integral;
                s
            }),
            autotune: None,
        }
    }

    fn pid_mut(&mut self, circuit: Circuit) -> &mut Pid {
        match circuit {
            Circuit::Heating => &mut self.pid_heating,
            Circuit::Water => &mut self.pid_water,
        }
    }

    fn persist_pid(&mut self, circuit: Circuit) {
        let pid = self.pid_mut(circuit);
        let buf = encode_pid_record(pid.gains(), pid.snapshot().integral);
        let store = Store::from(STORE.get_task_id());
        if store.write_area(Area::PidState as u8, circuit as u8, &buf).is_err() {
            ringbuf_entry!(Trace::StoreBusError);
        }
    }

    fn effective_active(&self, circuit: Circuit) -> bool {
        match circuit {
            Circuit::Heating => {
                let heating = self.demand[Circuit::Heating as usize];
                let water = self.demand[Circuit::Water as usize];
                heating.active && !(water.active && water.priority)
            }
            Circuit::Water => self.demand[Circuit::Water as usize].active,
        }
    }

    fn expire_demands(&mut self, now: u32) {
        for d in self.demand.iter_mut() {
            if d.active && now.wrapping_sub(d.expires_at_ms) < u32::MAX / 2 && now >= d.expires_at_ms
            {
                d.active = false;
            }
        }
    }

    /// Pre-ignition interlocks (§4.7). Doesn't itself raise a fault:
    /// an unmet interlock just keeps the burner idle.
    fn interlocks_ok(&self, circuit: Circuit) -> bool {
        let io = Io::from(IO.get_task_id());

        let (out_raw, out_valid, _) = match io.reading(Channel::BoilerOutput as u8) {
            Ok(r) => r,
            Err(_) => return false,
        };
        if !out_valid {
            return false;
        }
        let output = Temperature::from_tenths(out_raw);
        if output >= BOILER_OUTPUT_MAX {
            return false;
        }

        if circuit == Circuit::Water {
            let (dhw_raw, dhw_valid, _) = match io.reading(Channel::DhwTank as u8) {
                Ok(r) => r,
                Err(_) => return false,
            };
            if !dhw_valid || Temperature::from_tenths(dhw_raw) >= DHW_MAX {
                return false;
            }
        }

        let (press_raw, press_valid, _) = match io.reading(Channel::Pressure as u8) {
            Ok(r) => r,
            Err(_) => return false,
        };
        if !press_valid || press_raw < PRESSURE_MIN || press_raw > PRESSURE_MAX {
            return false;
        }

        let (ret_raw, ret_valid, _) = match io.reading(Channel::BoilerReturn as u8) {
            Ok(r) => r,
            Err(_) => return false,
        };
        if !ret_valid || output.abs_diff(Temperature::from_tenths(ret_raw)) >= PREHEAT_BLOCK_THRESHOLD
        {
            return false;
        }

        self.state != BurnerState::Lockout
    }

    /// Same gate without a specific circuit's DHW constraint, used when
    /// resetting out of `ERROR`/`EMERGENCY_STOP` before a circuit has
    /// been re-selected.
    fn system_safe(&self) -> bool {
        let io = Io::from(IO.get_task_id());
        let (out_raw, out_valid, _) = match io.reading(Channel::BoilerOutput as u8) {
            Ok(r) => r,
            Err(_) => return false,
        };
        if !out_valid || Temperature::from_tenths(out_raw) >= BOILER_OUTPUT_MAX {
            return false;
        }
        let (press_raw, press_valid, _) = match io.reading(Channel::Pressure as u8) {
            Ok(r) => r,
            Err(_) => return false,
        };
        press_valid && press_raw >= PRESSURE_MIN && press_raw <= PRESSURE_MAX
    }

    fn check_operating_violation(&mut self, now: u32) -> Option<FaultKind> {
        let io = Io::from(IO.get_task_id());
        let (out_raw, out_valid, _) = match io.reading(Channel::BoilerOutput as u8) {
            Ok(r) => r,
            Err(_) => return Some(FaultKind::SensorInvalid),
        };
        if !out_valid {
            return Some(FaultKind::SensorInvalid);
        }
        if out_raw >= BOILER_OUTPUT_CRITICAL.raw_tenths() {
            return Some(FaultKind::OverTemperature);
        }

        if self.rate_has_last {
            let dt_ms = now.wrapping_sub(self.rate_last_ms).max(1) as i64;
            let delta = (out_raw as i32 - self.rate_last_tenths as i32).abs();
            let max_delta =
                ((RATE_OF_RISE_MAX_TENTHS_PER_S as i64 * dt_ms) / 1000).max(1) as i32;
            if delta > max_delta {
                return Some(FaultKind::OverTemperature);
            }
        }
        self.rate_last_tenths = out_raw;
        self.rate_last_ms = now;
        self.rate_has_last = true;

        let flame = Flame::from(FLAME.get_task_id()).detected();
        let expect_flame =
            matches!(self.state, BurnerState::BurningLow | BurnerState::BurningHigh);
        if expect_flame && !flame {
            return Some(FaultKind::FlameFailure);
        }

        let (press_raw, press_valid, _) = match io.reading(Channel::Pressure as u8) {
            Ok(r) => r,
            Err(_) => return Some(FaultKind::SensorInvalid),
        };
        if press_valid {
            if press_raw < PRESSURE_ALARM_MIN {
                return Some(FaultKind::UnderPressure);
            }
            if press_raw > PRESSURE_ALARM_MAX {
                return Some(FaultKind::OverPressure);
            }
        }

        None
    }

    fn report_fault(&self, kind: FaultKind, critical: bool, context: u32) {
        Faultlog::from(FAULTLOG.get_task_id()).report(kind as u8, critical, context);
    }

    fn enter_idle(&mut self, now: u32) {
        self.state = BurnerState::Idle;
        self.state_entered_ms = now;
        self.holder = None;
        ringbuf_entry!(Trace::ReturnedIdle);
    }

    fn enter_pre_purge(&mut self, circuit: Circuit, now: u32) {
        self.holder = Some(circuit);
        self.state = BurnerState::PrePurge;
        self.state_entered_ms = now;
        ringbuf_entry!(Trace::PrePurgeStarted);
    }

    fn enter_ignition(&mut self, now: u32) {
        self.state = BurnerState::Ignition;
        self.state_entered_ms = now;
        ringbuf_entry!(Trace::IgnitionStarted);
    }

    fn enter_burning(&mut self, power_pct: i32, now: u32) {
        self.state = if power_pct <= POWER_SPLIT_PCT {
            BurnerState::BurningLow
        } else {
            BurnerState::BurningHigh
        };
        self.state_entered_ms = now;
        self.burn_started_ms = now;
        self.ignition_attempts = 0;
        self.last_power_change_ms = now;
        self.last_power_pct = power_pct;
        ringbuf_entry!(Trace::FlameConfirmed);
    }

    fn enter_post_purge(&mut self, now: u32) {
        self.state = BurnerState::PostPurge;
        self.state_entered_ms = now;
        ringbuf_entry!(Trace::PostPurgeStarted);
    }

    fn enter_lockout(&mut self, now: u32) {
        self.state = BurnerState::Lockout;
        self.state_entered_ms = now;
        self.holder = None;
        self.autotune = None;
        ringbuf_entry!(Trace::EnteredLockout);
    }

    fn enter_error(&mut self, kind: FaultKind, now: u32) {
        self.report_fault(kind, true, 0);
        self.state = BurnerState::Error;
        self.state_entered_ms = now;
        self.holder = None;
        self.autotune = None;
        ringbuf_entry!(Trace::EnteredError(kind));
    }

    fn step_idle(&mut self, now: u32) {
        if self.holder.is_none() {
            let heating_active = self.effective_active(Circuit::Heating);
            let water_active = self.effective_active(Circuit::Water);
            let pick = if water_active
                && self.demand[Circuit::Water as usize].priority
            {
                Some(Circuit::Water)
            } else if heating_active && water_active {
                let h = self.demand[Circuit::Heating as usize].became_active_at_ms;
                let w = self.demand[Circuit::Water as usize].became_active_at_ms;
                if h.wrapping_sub(w) < u32::MAX / 2 && h != w {
                    if w <= h {
                        Some(Circuit::Water)
                    } else {
                        Some(Circuit::Heating)
                    }
                } else {
                    Some(Circuit::Heating)
                }
            } else if heating_active {
                Some(Circuit::Heating)
            } else if water_active {
                Some(Circuit::Water)
            } else {
                None
            };

            if let Some(circuit) = pick {
                if self.interlocks_ok(circuit) {
                    ringbuf_entry!(Trace::HolderPicked(circuit));
                    self.enter_pre_purge(circuit, now);
                }
            }
        }
    }

    fn step_pre_purge(&mut self, now: u32) {
        let circuit = match self.holder {
            Some(c) => c,
            None => return self.enter_idle(now),
        };
        if !self.effective_active(circuit) {
            return self.enter_idle(now);
        }
        if now.wrapping_sub(self.state_entered_ms) >= PRE_PURGE_MS {
            self.enter_ignition(now);
        }
    }

    fn step_ignition(&mut self, now: u32) {
        let circuit = match self.holder {
            Some(c) => c,
            None => return self.enter_idle(now),
        };
        let elapsed = now.wrapping_sub(self.state_entered_ms);
        let flame = Flame::from(FLAME.get_task_id()).detected();

        if flame && elapsed >= MIN_IGNITION_CONFIRM_MS {
            let target = self.demand[circuit as usize].target;
            let power = self.compute_power(circuit, target, now);
            self.enter_burning(power, now);
            return;
        }

        if !flame && elapsed >= IGNITION_RETRY_MS {
            self.ignition_attempts += 1;
            if self.ignition_attempts >= MAX_IGNITION_ATTEMPTS {
                self.report_fault(FaultKind::FlameFailure, true, self.ignition_attempts as u32);
                self.enter_lockout(now);
            } else {
                ringbuf_entry!(Trace::IgnitionRetry(self.ignition_attempts));
                self.state_entered_ms = now;
            }
        }
    }

    fn compute_power(&mut self, circuit: Circuit, target: Temperature, now: u32) -> i32 {
        let io = Io::from(IO.get_task_id());
        let pv = match io.reading(Channel::BoilerOutput as u8) {
            Ok((raw, true, _)) => Temperature::from_tenths(raw),
            _ => Temperature::INVALID,
        };

        if let Some((tune_circuit, tuner)) = &mut self.autotune {
            if *tune_circuit == circuit {
                if tuner.sample(pv, now) {
                    self.finish_autotune(circuit);
                }
                return match &self.autotune {
                    Some((_, t)) => t.output_pct().max(0),
                    None => 0,
                };
            }
        }

        self.pid_mut(circuit)
            .update(target, pv, now)
            .unwrap_or(0)
            .max(0)
    }

    fn finish_autotune(&mut self, circuit: Circuit) {
        let finished = match &self.autotune {
            Some((_, tuner)) => tuner.finish(),
            None => return,
        };
        match finished {
            Ok(result) => {
                self.pid_mut(circuit).apply_tuned_gains(result.gains);
                self.persist_pid(circuit);
                ringbuf_entry!(Trace::AutotuneFinished);
            }
            Err(AutoTuneError::StillRunning) => {}
            Err(_) => {
                ringbuf_entry!(Trace::AutotuneRejected);
            }
        }
        self.autotune = None;
    }

    fn step_burning(&mut self, now: u32) {
        let circuit = match self.holder {
            Some(c) => c,
            None => return self.enter_idle(now),
        };

        let target = self.demand[circuit as usize].target;
        let power = self.compute_power(circuit, target, now);
        self.requested_power_pct = power;

        let change_allowed = now.wrapping_sub(self.last_power_change_ms) >= MIN_POWER_CHANGE_MS;
        if change_allowed && (power - self.last_power_pct).abs() > POWER_CHANGE_THRESHOLD_PCT {
            self.last_power_change_ms = now;
            self.last_power_pct = power;
            self.state = if power <= POWER_SPLIT_PCT {
                BurnerState::BurningLow
            } else {
                BurnerState::BurningHigh
            };
            ringbuf_entry!(Trace::PowerChanged(power));
        }

        if self.autotune.is_none() {
            self.persist_pid(circuit);
        }

        let min_on_elapsed = now.wrapping_sub(self.burn_started_ms) >= MIN_ON_MS;
        if !self.effective_active(circuit) && min_on_elapsed {
            self.enter_post_purge(now);
        }
    }

    fn step_post_purge(&mut self, now: u32) {
        if now.wrapping_sub(self.state_entered_ms) >= POST_PURGE_MS {
            self.enter_idle(now);
        }
    }

    fn step_lockout(&mut self, now: u32) {
        if now.wrapping_sub(self.state_entered_ms) >= LOCKOUT_MS {
            self.ignition_attempts = 0;
            self.enter_idle(now);
        }
    }

    fn drive_outputs(&mut self) {
        let valve_on = matches!(
            self.state,
            BurnerState::Ignition | BurnerState::BurningLow | BurnerState::BurningHigh
        );
        let relay = Relay::from(RELAY.get_task_id());
        if relay.set_desired(RELAY_INDEX, valve_on).is_err() {
            ringbuf_entry!(Trace::RelayBusError);
        }

        let pump = Pump::from(PUMP.get_task_id());
        for circuit in [Circuit::Heating, Circuit::Water] {
            let active = self.effective_active(circuit);
            if pump.set_mode(circuit as u8, active).is_err() {
                ringbuf_entry!(Trace::PumpBusError);
            }
        }
    }

    fn on_tick(&mut self) {
        let now = sys_get_timer().now as u32;
        self.expire_demands(now);

        if matches!(
            self.state,
            BurnerState::Ignition | BurnerState::BurningLow | BurnerState::BurningHigh
        ) {
            if let Some(kind) = self.check_operating_violation(now) {
                self.enter_error(kind, now);
            }
        }

        match self.state {
            BurnerState::Idle => self.step_idle(now),
            BurnerState::PrePurge => self.step_pre_purge(now),
            BurnerState::Ignition => self.step_ignition(now),
            BurnerState::BurningLow | BurnerState::BurningHigh => self.step_burning(now),
            BurnerState::PostPurge => self.step_post_purge(now),
            BurnerState::Lockout => self.step_lockout(now),
            BurnerState::Error | BurnerState::EmergencyStop => {}
        }

        self.drive_outputs();
    }
}

fn load_pid_record(slot: u8) -> (Gains, i32) {
    let store = Store::from(STORE.get_task_id());
    let mut buf = [0u8; 24];
    if store.read_area(Area::PidState as u8, slot, &mut buf).is_err() {
        return (DEFAULT_GAINS, 0);
    }
    let (gains, integral) = decode_pid_record(&buf);
    if gains == (Gains { kp: 0, ki: 0, kd: 0 }) {
        (DEFAULT_GAINS, 0)
    } else {
        (gains, integral)
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

impl idl::InOrderBurnerImpl for ServerImpl {
    fn set_demand(
        &mut self,
        _msg: &RecvMessage,
        circuit: u8,
        active: bool,
        target_tenths: i16,
        priority: bool,
    ) -> Result<(), RequestError<BurnerError>> {
        let circuit = decode_circuit(circuit).ok_or(BurnerError::InvalidCircuit)?;
        let now = sys_get_timer().now as u32;
        let d = &mut self.demand[circuit as usize];
        if active {
            if !d.active {
                d.became_active_at_ms = now;
            }
            d.expires_at_ms = now.wrapping_add(REQUEST_EXPIRATION_MS);
        }
        d.active = active;
        d.target = Temperature::from_tenths(target_tenths);
        d.priority = priority;
        Ok(())
    }

    fn state(&mut self, _msg: &RecvMessage) -> Result<u8, RequestError<core::convert::Infallible>> {
        Ok(self.state as u8)
    }

    fn reset_lockout(&mut self, _msg: &RecvMessage) -> Result<(), RequestError<BurnerError>> {
        let now = sys_get_timer().now as u32;
        match self.state {
            BurnerState::Lockout => {
                self.ignition_attempts = 0;
                self.enter_idle(now);
                Ok(())
            }
            BurnerState::Error | BurnerState::EmergencyStop => {
                if self.system_safe() {
                    self.ignition_attempts = 0;
                    self.enter_idle(now);
                    Ok(())
                } else {
                    Err(BurnerError::InterlocksNotMet.into())
                }
            }
            _ => Err(BurnerError::NotInLockout.into()),
        }
    }

    fn emergency_stop(
        &mut self,
        _msg: &RecvMessage,
    ) -> Result<(), RequestError<core::convert::Infallible>> {
        let now = sys_get_timer().now as u32;
        self.state = BurnerState::EmergencyStop;
        self.state_entered_ms = now;
        self.holder = None;
        self.autotune = None;
        Ok(())
    }

    fn start_autotune(
        &mut self,
        _msg: &RecvMessage,
        circuit: u8,
        method: u8,
    ) -> Result<(), RequestError<BurnerError>> {
        let circuit = decode_circuit(circuit).ok_or(BurnerError::InvalidCircuit)?;
        let method = decode_method(method).ok_or(BurnerError::InvalidMethod)?;
        if self.autotune.is_some() {
            return Err(BurnerError::AutotuneBusy.into());
        }
        let burning = matches!(self.state, BurnerState::BurningLow | BurnerState::BurningHigh);
        if !burning || self.holder != Some(circuit) {
            return Err(BurnerError::AutotuneNotAllowed.into());
        }

        let now = sys_get_timer().now as u32;
        let target = self.demand[circuit as usize].target;
        let tuner = AutoTuner::new(target, 45, 50, method, now);
        self.autotune = Some((circuit, tuner));
        ringbuf_entry!(Trace::AutotuneStarted(circuit));
        Ok(())
    }
}

impl NotificationHandler for ServerImpl {
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
    use task_burner_api::BurnerError;
    include!(concat!(env!("OUT_DIR"), "/server_stub.rs"));
}
