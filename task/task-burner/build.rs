// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Write;

fn main() -> Result<()> {
    idol::server::build_server_support(
        "../../idl/burner.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();

    let cfg: Config = match std::fs::read_to_string("task-burner.toml") {
        Ok(text) => toml::from_str(&text).context("parsing task-burner.toml")?,
        Err(_) => Config::default(),
    };

    let out_dir = std::env::var("OUT_DIR")?;
    let dest_path = std::path::Path::new(&out_dir).join("burner_config.rs");
    let mut out = std::fs::File::create(&dest_path).context("creating burner_config.rs")?;
    writeln!(out, "pub(crate) const RELAY_INDEX: u8 = {};", cfg.relay_index)?;
    writeln!(
        out,
        "pub(crate) const PRE_PURGE_MS: u32 = {};",
        cfg.pre_purge_ms
    )?;
    writeln!(
        out,
        "pub(crate) const IGNITION_RETRY_MS: u32 = {};",
        cfg.ignition_retry_ms
    )?;
    writeln!(
        out,
        "pub(crate) const MIN_IGNITION_CONFIRM_MS: u32 = {};",
        cfg.min_ignition_confirm_ms
    )?;
    writeln!(
        out,
        "pub(crate) const MAX_IGNITION_ATTEMPTS: u8 = {};",
        cfg.max_ignition_attempts
    )?;
    writeln!(out, "pub(crate) const MIN_ON_MS: u32 = {};", cfg.min_on_ms)?;
    writeln!(out, "pub(crate) const MIN_OFF_MS: u32 = {};", cfg.min_off_ms)?;
    writeln!(
        out,
        "pub(crate) const MIN_POWER_CHANGE_MS: u32 = {};",
        cfg.min_power_change_ms
    )?;
    writeln!(
        out,
        "pub(crate) const POST_PURGE_MS: u32 = {};",
        cfg.post_purge_ms
    )?;
    writeln!(out, "pub(crate) const LOCKOUT_MS: u32 = {};", cfg.lockout_ms)?;
    writeln!(
        out,
        "pub(crate) const REQUEST_EXPIRATION_MS: u32 = {};",
        cfg.request_expiration_ms
    )?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Config {
    relay_index: u8,
    pre_purge_ms: u32,
    ignition_retry_ms: u32,
    min_ignition_confirm_ms: u32,
    max_ignition_attempts: u8,
    min_on_ms: u32,
    min_off_ms: u32,
    min_power_change_ms: u32,
    post_purge_ms: u32,
    lockout_ms: u32,
    request_expiration_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        // relay 0 = main gas valve, per drv-relay's guarded-mask layout
        // (relays 1 and 2 are the heating and DHW pumps; see task-pump).
        Config {
            relay_index: 0,
            pre_purge_ms: 2_000,
            ignition_retry_ms: 5_000,
            min_ignition_confirm_ms: 3_000,
            max_ignition_attempts: 3,
            min_on_ms: 120_000,
            min_off_ms: 20_000,
            min_power_change_ms: 15_000,
            post_purge_ms: 60_000,
            lockout_ms: 300_000,
            request_expiration_ms: 600_000,
        }
    }
}
