// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Write;

fn main() -> Result<()> {
    idol::server::build_server_support(
        "../../idl/io.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();

    let cfg: Config = match std::fs::read_to_string("task-io.toml") {
        Ok(text) => toml::from_str(&text).context("parsing task-io.toml")?,
        Err(_) => Config::default(),
    };

    let out_dir = std::env::var("OUT_DIR")?;
    let dest_path = std::path::Path::new(&out_dir).join("io_config.rs");
    let mut out = std::fs::File::create(&dest_path).context("creating io_config.rs")?;
    writeln!(out, "pub(crate) const STATION_ROOM: u8 = {};", cfg.station_room)?;
    writeln!(out, "pub(crate) const STATION_BOILER: u8 = {};", cfg.station_boiler)?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Config {
    station_room: u8,
    station_boiler: u8,
}

impl Default for Config {
    fn default() -> Self {
        // Must agree with drv-fieldbus.toml's station assignment.
        Config {
            station_room: 1,
            station_boiler: 2,
        }
    }
}
