// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Write;

fn main() -> Result<()> {
    idol::server::build_server_support(
        "../../idl/fieldbus.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();

    let cfg: Config = match std::fs::read_to_string("drv-fieldbus.toml") {
        Ok(text) => toml::from_str(&text).context("parsing drv-fieldbus.toml")?,
        Err(_) => Config::default(),
    };

    let out_dir = std::env::var("OUT_DIR")?;
    let dest_path = std::path::Path::new(&out_dir).join("bus_config.rs");
    let mut out = std::fs::File::create(&dest_path).context("creating bus_config.rs")?;

    writeln!(out, "pub(crate) const STATION_ROOM: u8 = {};", cfg.station_room)?;
    writeln!(out, "pub(crate) const STATION_BOILER: u8 = {};", cfg.station_boiler)?;
    writeln!(out, "pub(crate) const STATION_RELAY: u8 = {};", cfg.station_relay)?;
    writeln!(
        out,
        "pub(crate) const TRANSACTION_TIMEOUT_MS: u64 = {};",
        cfg.transaction_timeout_ms
    )?;
    writeln!(out, "pub(crate) const MAX_RETRIES: u8 = {};", cfg.max_retries)?;
    writeln!(
        out,
        "pub(crate) const INTER_FRAME_DELAY_MS: u64 = {};",
        cfg.inter_frame_delay_ms
    )?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Config {
    station_room: u8,
    station_boiler: u8,
    station_relay: u8,
    transaction_timeout_ms: u64,
    max_retries: u8,
    inter_frame_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            station_room: 1,
            station_boiler: 2,
            station_relay: 3,
            transaction_timeout_ms: 500,
            max_retries: 3,
            inter_frame_delay_ms: 20,
        }
    }
}
