// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `cloudpaste config ...` — show and validate the `GatewayConfigManifest`
//! this process would load (discovery order documented on
//! `GatewayConfigManifest::discover_config`).

use anyhow::Result;
use clap::Subcommand;
use cloudpaste_core::infrastructure::config::GatewayConfigManifest;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective manifest (explicit path, discovered file, or
    /// defaults, with environment overrides applied) as YAML.
    Show,
    /// Load and validate the manifest, exiting non-zero on failure.
    Validate,
}

pub fn run(cmd: ConfigCommand, config_path: Option<PathBuf>) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let config = GatewayConfigManifest::load_or_default(config_path)?;
            println!("{}", serde_yaml::to_string(&config)?);
        }
        ConfigCommand::Validate => {
            let config = GatewayConfigManifest::load_or_default(config_path)?;
            config.validate()?;
            println!("ok");
        }
    }
    Ok(())
}
