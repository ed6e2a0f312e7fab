// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;

fn main() -> Result<()> {
    idol::server::build_server_support(
        "../../idl/jefe.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();

    let cfg: Config = match std::fs::read_to_string("task-jefe.toml") {
        Ok(text) => toml::from_str(&text).context("parsing task-jefe.toml")?,
        Err(_) => Config::default(),
    };
    let out_dir = std::env::var("OUT_DIR")?;
    let dest_path = std::path::Path::new(&out_dir).join("jefe_config.rs");
    let mut out =
        std::fs::File::create(&dest_path).context("creating jefe_config.rs")?;

    writeln!(
        out,
        "pub(crate) const HEALTH_POLL_MS: u64 = {};",
        cfg.health_poll_ms
    )?;
    writeln!(out, "pub(crate) const MAX_RETRIES: u8 = {};", cfg.max_retries)?;
    writeln!(
        out,
        "pub(crate) const INITIAL_BACKOFF_MS: u32 = {};",
        cfg.initial_backoff_ms
    )?;
    writeln!(
        out,
        "pub(crate) const MAX_BACKOFF_MS: u32 = {};",
        cfg.max_backoff_ms
    )?;

    let count = cfg.on_state_change.len();
    let task = "task_ids::Task";
    writeln!(
        out,
        "pub(crate) const MAILING_LIST: [({}, u32); {}] = [",
        task, count
    )?;
    for (name, rec) in cfg.on_state_change {
        writeln!(out, "    ({}::{}, 1 << {})", task, name, rec.bit_number)?;
    }
    writeln!(out, "];")?;

    Ok(())
}

/// Jefe task-level configuration.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Config {
    /// How often the supervisor polls task health (§4.12's "configured
    /// interval").
    health_poll_ms: u64,
    /// Bounded retries before a non-critical task is given up on and a
    /// critical task's failure escalates to emergency stop.
    max_retries: u8,
    /// First restart backoff; doubles on each subsequent attempt up to
    /// `max_backoff_ms`.
    initial_backoff_ms: u32,
    max_backoff_ms: u32,
    /// Task requests to be notified on state change, as a map from task
    /// name to `StateChange` record.
    #[serde(default)]
    on_state_change: BTreeMap<String, StateChange>,
}

/// Description of something a task wants done on state change.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StateChange {
    /// Number of notification bit to signal (_not_ mask).
    bit_number: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            health_poll_ms: 250,
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 30_000,
            on_state_change: BTreeMap::new(),
        }
    }
}
