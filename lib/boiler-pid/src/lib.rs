// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-point PID control with anti-windup and derivative-on-PV, plus a
//! relay-feedback auto-tuner.
//!
//! Gains are integers scaled by 1000 so the whole loop stays in integer
//! arithmetic; the only division is by the scale factor and by elapsed
//! milliseconds, both of which are cheap and bounded.

#![no_std]

#[cfg(test)]
extern crate std;

use boiler_types::Temperature;

pub const OUTPUT_MIN: i32 = -100;
pub const OUTPUT_MAX: i32 = 100;

/// Gains scaled by 1000 (so `1500` means `1.5`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "hubpack", derive(hubpack::SerializedSize))]
pub struct Gains {
    pub kp: i32,
    pub ki: i32,
    pub kd: i32,
}

impl Gains {
    pub const ZERO: Gains = Gains { kp: 0, ki: 0, kd: 0 };
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PidError {
    InvalidInput,
}

/// The persisted part of a [`Pid`]'s state: integral accumulator and the
/// bookkeeping needed to resume derivative-on-PV across a reboot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "hubpack", derive(hubpack::SerializedSize))]
pub struct PidState {
    pub integral: i32,
    pub last_pv_tenths: i16,
    pub last_update_ms: u32,
    pub has_last_pv: bool,
}

pub struct Pid {
    gains: Gains,
    state: PidState,
}

impl Pid {
    pub fn new(gains: Gains) -> Self {
        Pid { gains, state: PidState::default() }
    }

    pub fn from_state(gains: Gains, state: PidState) -> Self {
        Pid { gains, state }
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn snapshot(&self) -> PidState {
        self.state
    }

    pub fn reset_integral(&mut self) {
        self.state.integral = 0;
    }

    /// Atomically replaces the live gains and resets the integral, as
    /// required when applying freshly tuned gains.
    pub fn apply_tuned_gains(&mut self, gains: Gains) {
        self.gains = gains;
        self.state.integral = 0;
    }

    /// Advances the controller by one sample. `now_ms` is a free-running
    /// millisecond clock; the first call after construction or a gain
    /// change seeds the derivative term without producing a kick.
    pub fn update(
        &mut self,
        setpoint: Temperature,
        pv: Temperature,
        now_ms: u32,
    ) -> Result<i32, PidError> {
        if !setpoint.is_valid() || !pv.is_valid() {
            return Err(PidError::InvalidInput);
        }

        let error = i32::from(setpoint.raw_tenths()) - i32::from(pv.raw_tenths());
        let dt_ms = if self.state.has_last_pv {
            now_ms.wrapping_sub(self.state.last_update_ms).max(1) as i32
        } else {
            1
        };

        let p_term = self.gains.kp * error;

        let d_term = if self.state.has_last_pv {
            let dpv = i32::from(pv.raw_tenths()) - i32::from(self.state.last_pv_tenths);
            -(self.gains.kd * dpv * 1000) / dt_ms
        } else {
            0
        };

        // Anti-windup: check whether integrating this step would still
        // saturate the output before committing it.
        let tentative_i = self.gains.ki * self.state.integral.saturating_add(error * dt_ms) / 1000;
        let tentative_output = (p_term + tentative_i + d_term) / 1000;
        if tentative_output.clamp(OUTPUT_MIN, OUTPUT_MAX) == tentative_output {
            self.state.integral = self.state.integral.saturating_add(error * dt_ms);
        }

        let i_term = self.gains.ki * self.state.integral / 1000;
        let output = (p_term + i_term + d_term) / 1000;

        self.state.last_pv_tenths = pv.raw_tenths();
        self.state.last_update_ms = now_ms;
        self.state.has_last_pv = true;

        Ok(output.clamp(OUTPUT_MIN, OUTPUT_MAX))
    }
}

// ---------------------------------------------------------------------
// Relay-feedback auto-tuner
// ---------------------------------------------------------------------

pub const MAX_SAMPLES: usize = 1000;
pub const MAX_EXTREMA: usize = 32;
pub const MAX_TUNE_MS: u32 = 40 * 60 * 1000;
pub const MIN_CYCLES: u32 = 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TuneMethod {
    ZieglerNicholsPi,
    ZieglerNicholsPid,
    TyreusLuyben,
    CohenCoon,
    Lambda,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AutoTuneError {
    StillRunning,
    TooFewCycles,
    GainsOutOfRange,
}

#[derive(Copy, Clone, Debug)]
pub struct TuneResult {
    pub ku: i32,
    pub tu_ms: u32,
    pub gains: Gains,
}

struct Extrema {
    times: [u32; MAX_EXTREMA],
    values: [i16; MAX_EXTREMA],
    count: usize,
}

impl Extrema {
    const fn new() -> Self {
        Extrema { times: [0; MAX_EXTREMA], values: [0; MAX_EXTREMA], count: 0 }
    }

    fn push(&mut self, time_ms: u32, value: i16) {
        if self.count < MAX_EXTREMA {
            self.times[self.count] = time_ms;
            self.values[self.count] = value;
            self.count += 1;
        }
    }
}

pub struct AutoTuner {
    setpoint: Temperature,
    amplitude_pct: i32,
    hysteresis_tenths: i16,
    method: TuneMethod,
    relay_high: bool,
    phase_extreme: i16,
    peaks: Extrema,
    troughs: Extrema,
    sample_count: usize,
    start_ms: u32,
    last_switch_ms: u32,
    cycles_completed: u32,
    finished: bool,
}

impl AutoTuner {
    pub fn new(
        setpoint: Temperature,
        amplitude_pct: i32,
        hysteresis_tenths: i16,
        method: TuneMethod,
        start_ms: u32,
    ) -> Self {
        AutoTuner {
            setpoint,
            amplitude_pct: amplitude_pct.clamp(40, 50),
            hysteresis_tenths,
            method,
            relay_high: true,
            phase_extreme: i16::MIN,
            peaks: Extrema::new(),
            troughs: Extrema::new(),
            sample_count: 0,
            start_ms,
            last_switch_ms: start_ms,
            cycles_completed: 0,
            finished: false,
        }
    }

    /// The relay output to apply this tick, replacing the PID's normal
    /// output while tuning is in progress.
    pub fn output_pct(&self) -> i32 {
        if self.relay_high {
            self.amplitude_pct
        } else {
            -self.amplitude_pct
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds one process-variable sample and steers the relay. Returns
    /// `true` once tuning has finished (either enough cycles or the
    /// overall timeout elapsed).
    pub fn sample(&mut self, pv: Temperature, now_ms: u32) -> bool {
        if self.finished || !pv.is_valid() {
            return self.finished;
        }
        self.sample_count = self.sample_count.saturating_add(1).min(MAX_SAMPLES);

        let pv_tenths = pv.raw_tenths();
        let sp_tenths = self.setpoint.raw_tenths();

        if self.relay_high {
            if pv_tenths > self.phase_extreme {
                self.phase_extreme = pv_tenths;
            }
            if pv_tenths >= sp_tenths + self.hysteresis_tenths {
                self.peaks.push(now_ms, self.phase_extreme);
                self.relay_high = false;
                self.phase_extreme = i16::MAX;
                self.last_switch_ms = now_ms;
                self.cycles_completed += 1;
            }
        } else {
            if pv_tenths < self.phase_extreme {
                self.phase_extreme = pv_tenths;
            }
            if pv_tenths <= sp_tenths - self.hysteresis_tenths {
                self.troughs.push(now_ms, self.phase_extreme);
                self.relay_high = true;
                self.phase_extreme = i16::MIN;
                self.last_switch_ms = now_ms;
            }
        }

        let elapsed = now_ms.wrapping_sub(self.start_ms);
        if self.cycles_completed >= MIN_CYCLES || elapsed >= MAX_TUNE_MS {
            self.finished = true;
        }
        self.finished
    }

    pub fn finish(&self) -> Result<TuneResult, AutoTuneError> {
        if !self.finished {
            return Err(AutoTuneError::StillRunning);
        }
        let pairs = self.peaks.count.min(self.troughs.count);
        if pairs < MIN_CYCLES as usize {
            return Err(AutoTuneError::TooFewCycles);
        }

        let mut amplitude_sum: i32 = 0;
        for i in 0..pairs {
            let swing = i32::from(self.peaks.values[i]) - i32::from(self.troughs.values[i]);
            amplitude_sum += swing.abs();
        }
        let a = amplitude_sum / (2 * pairs as i32);
        let a = a.max(1);

        // Ku = 4 * relay amplitude / (pi * A); amplitude here is the
        // percent relay swing converted to the same fixed-point scale
        // used for gains (x1000) so Ku keeps three decimal digits.
        let relay_amplitude_tenths = self.amplitude_pct * 2; // +/-amplitude round trip
        let ku = (4 * relay_amplitude_tenths * 1000) / (314_159 * a / 100_000).max(1);

        let mut intervals: [u32; MAX_EXTREMA] = [0; MAX_EXTREMA];
        let mut n = 0;
        for i in 1..self.peaks.count {
            intervals[n] = self.peaks.times[i].wrapping_sub(self.peaks.times[i - 1]);
            n += 1;
        }
        if n == 0 {
            return Err(AutoTuneError::TooFewCycles);
        }
        let tu_ms = trimmed_mean(&intervals[..n]);

        let ku_scaled = ku; // already x1000
        let tu_s = (tu_ms / 1000).max(1) as i32;

        let gains = derive_gains(self.method, ku_scaled, tu_s)?;

        Ok(TuneResult { ku: ku_scaled, tu_ms, gains })
    }
}

fn trimmed_mean(values: &[u32]) -> u32 {
    if values.len() <= 2 {
        return values.iter().sum::<u32>() / values.len() as u32;
    }
    let mut sorted = [0u32; MAX_EXTREMA];
    sorted[..values.len()].copy_from_slice(values);
    sorted[..values.len()].sort_unstable();
    let trimmed = &sorted[1..values.len() - 1];
    trimmed.iter().sum::<u32>() / trimmed.len() as u32
}

/// Derives PID gains from the ultimate gain/period pair using the
/// requested classical tuning rule, then clamps to validated ranges.
fn derive_gains(method: TuneMethod, ku_x1000: i32, tu_s: i32) -> Result<Gains, AutoTuneError> {
    let (kp, ki, kd) = match method {
        TuneMethod::ZieglerNicholsPi => {
            (ku_x1000 * 45 / 100, (ku_x1000 * 54 / 100) / tu_s, 0)
        }
        TuneMethod::ZieglerNicholsPid => {
            (ku_x1000 * 6 / 10, (ku_x1000 * 12 / 10) / tu_s, (ku_x1000 * 75 * tu_s) / 1000)
        }
        TuneMethod::TyreusLuyben => {
            (ku_x1000 / 32 * 10, ku_x1000 / (22 * tu_s / 10).max(1), 0)
        }
        TuneMethod::CohenCoon => {
            (ku_x1000 * 9 / 10, (ku_x1000 * 9 / 10) / tu_s, (ku_x1000 * tu_s) / 20)
        }
        TuneMethod::Lambda => (ku_x1000 / 2, (ku_x1000 / 2) / (2 * tu_s).max(1), 0),
    };

    let gains = Gains {
        kp: kp.clamp(100, 10_000),
        ki: ki.clamp(0, 1_000),
        kd: kd.clamp(0, 5_000),
    };

    let ku_ok = (0..=50_000).contains(&ku_x1000);
    let tu_ok = (30..=600).contains(&tu_s);
    if !ku_ok || !tu_ok {
        return Err(AutoTuneError::GainsOutOfRange);
    }

    Ok(gains)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deg(c: i16) -> Temperature {
        Temperature::from_whole_degrees(c).unwrap()
    }

    #[test]
    fn output_clamped_to_domain() {
        let mut pid = Pid::new(Gains { kp: 50_000, ki: 0, kd: 0 });
        let out = pid.update(deg(80), deg(20), 0).unwrap();
        assert!((OUTPUT_MIN..=OUTPUT_MAX).contains(&out));
        assert_eq!(out, OUTPUT_MAX);
    }

    #[test]
    fn invalid_input_rejected() {
        let mut pid = Pid::new(Gains::ZERO);
        assert_eq!(pid.update(Temperature::INVALID, deg(20), 0), Err(PidError::InvalidInput));
    }

    #[test]
    fn no_derivative_kick_on_first_sample() {
        let mut pid = Pid::new(Gains { kp: 0, ki: 0, kd: 5_000 });
        let out = pid.update(deg(21), deg(20), 1000).unwrap();
        assert_eq!(out, 0);
    }

    #[test]
    fn anti_windup_halts_integral_growth_when_saturated() {
        let mut pid = Pid::new(Gains { kp: 0, ki: 1_000, kd: 0 });
        let mut last = 0i32;
        for t in 0..20 {
            last = pid.update(deg(100), deg(0), t * 1000).unwrap();
        }
        assert_eq!(last, OUTPUT_MAX);
        let integral_after_saturation = pid.snapshot().integral;
        let _ = pid.update(deg(100), deg(0), 20_000).unwrap();
        // Integral should not have grown once output was saturated and
        // error kept pushing further into saturation.
        assert!(pid.snapshot().integral <= integral_after_saturation + 1);
    }

    #[test]
    fn auto_tune_completes_after_min_cycles() {
        let mut tuner = AutoTuner::new(deg(50), 45, 5, TuneMethod::ZieglerNicholsPid, 0);
        let mut t = 0u32;
        let mut pv = 400i16;
        let mut rising = true;
        while !tuner.is_finished() && t < MAX_TUNE_MS {
            pv = if rising { pv + 5 } else { pv - 5 };
            if pv > 520 {
                rising = false;
            }
            if pv < 480 {
                rising = true;
            }
            t += 500;
            tuner.sample(Temperature::from_tenths(pv), t);
        }
        assert!(tuner.is_finished());
        let result = tuner.finish();
        assert!(result.is_ok());
    }

    #[test]
    fn gains_clamped_to_validated_ranges() {
        let gains = derive_gains(TuneMethod::ZieglerNicholsPid, 50_000_000, 60).unwrap_err();
        assert_eq!(gains, AutoTuneError::GainsOutOfRange);
    }
}
