// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Write;

fn main() -> Result<()> {
    idol::server::build_server_support(
        "../../idl/pump.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();

    let cfg: Config = match std::fs::read_to_string("task-pump.toml") {
        Ok(text) => toml::from_str(&text).context("parsing task-pump.toml")?,
        Err(_) => Config::default(),
    };

    let out_dir = std::env::var("OUT_DIR")?;
    let dest_path = std::path::Path::new(&out_dir).join("pump_config.rs");
    let mut out = std::fs::File::create(&dest_path).context("creating pump_config.rs")?;
    writeln!(
        out,
        "pub(crate) const RELAY_INDEX: [u8; 2] = [{}, {}];",
        cfg.relay_index[0], cfg.relay_index[1]
    )?;
    writeln!(
        out,
        "pub(crate) const COUNTER_ID: [u8; 2] = [{}, {}];",
        cfg.counter_id[0], cfg.counter_id[1]
    )?;
    writeln!(out, "pub(crate) const COOLDOWN_MS: u32 = {};", cfg.cooldown_ms)?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Config {
    relay_index: [u8; 2],
    counter_id: [u8; 2],
    cooldown_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        // relay 1 = heating circulator, relay 2 = DHW pump, per
        // drv-relay's guarded-mask layout.
        Config {
            relay_index: [1, 2],
            counter_id: [0, 1],
            cooldown_ms: 180_000,
        }
    }
}
