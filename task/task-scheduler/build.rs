// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Write;

fn main() -> Result<()> {
    idol::server::build_server_support(
        "../../idl/scheduler.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();

    let cfg: Config = match std::fs::read_to_string("task-scheduler.toml") {
        Ok(text) => toml::from_str(&text).context("parsing task-scheduler.toml")?,
        Err(_) => Config::default(),
    };

    let out_dir = std::env::var("OUT_DIR")?;
    let dest_path = std::path::Path::new(&out_dir).join("scheduler_config.rs");
    let mut out = std::fs::File::create(&dest_path).context("creating scheduler_config.rs")?;
    writeln!(
        out,
        "pub(crate) const EVAL_PERIOD_MS: u64 = {};",
        cfg.eval_period_ms
    )?;
    writeln!(
        out,
        "pub(crate) const PERSIST_DEBOUNCE_MS: u64 = {};",
        cfg.persist_debounce_ms
    )?;
    writeln!(
        out,
        "pub(crate) const MAX_NTP_SILENT_EVALS: u32 = {};",
        cfg.max_ntp_silent_evals
    )?;
    writeln!(
        out,
        "pub(crate) const RTC_WARNING_REPEAT_EVALS: u32 = {};",
        cfg.rtc_warning_repeat_evals
    )?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Config {
    /// §4.11's "every 30s" active/inactive evaluation tick.
    eval_period_ms: u64,
    /// In-memory schedule edits are flushed to `drv-store` this long
    /// after the last edit, unless an explicit save happens first.
    persist_debounce_ms: u64,
    /// Consecutive eval ticks with no `ntp_update` before the clock is
    /// considered degraded (RTC-only) rather than NTP-disciplined.
    max_ntp_silent_evals: u32,
    /// Eval ticks between repeats of the "implausible RTC year"
    /// warning, so a stuck clock doesn't flood the ring buffer.
    rtc_warning_repeat_evals: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            eval_period_ms: 30_000,
            persist_debounce_ms: 300_000,
            max_ntp_silent_evals: 2_880, // ~24h at 30s/eval
            rtc_warning_repeat_evals: 120, // ~1h
        }
    }
}
