// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Write;

fn main() -> Result<()> {
    idol::server::build_server_support(
        "../../idl/relay.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();

    let cfg: Config = match std::fs::read_to_string("drv-relay.toml") {
        Ok(text) => toml::from_str(&text).context("parsing drv-relay.toml")?,
        Err(_) => Config::default(),
    };

    let out_dir = std::env::var("OUT_DIR")?;
    let dest_path = std::path::Path::new(&out_dir).join("relay_config.rs");
    let mut out = std::fs::File::create(&dest_path).context("creating relay_config.rs")?;

    writeln!(out, "pub(crate) const GUARDED_MASK: u8 = {:#04x};", cfg.guarded_mask)?;
    writeln!(
        out,
        "pub(crate) const MIN_CHANGE_INTERVAL_MS: u64 = {};",
        cfg.min_change_interval_ms
    )?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Config {
    /// Bitmask of relays (pumps, burner) subject to the minimum
    /// state-change interval.
    guarded_mask: u8,
    min_change_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            // Relays 0 (burner) and 1/2 (pumps) by convention; see DESIGN.md.
            guarded_mask: 0b0000_0111,
            min_change_interval_ms: 30_000,
        }
    }
}
