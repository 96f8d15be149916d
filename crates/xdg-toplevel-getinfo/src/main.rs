//! xdg-toplevel-getinfo
//!
//! Prints the size in pixels a new toplevel is configured to, e.g. for
//! picking splash screen dimensions. The compositor reports logical units,
//! which are multiplied by the output scale phosh stored in GSettings.

mod keyboard;
mod probe;
mod scale;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use probe::{ProbeOutcome, ToplevelProbe};
use scale::GSettingsScale;
use xdg_toplevel_getinfo_config::Config;

#[derive(Parser, Debug)]
#[command(name = "xdg-toplevel-getinfo")]
#[command(about = "Print the pixel size the compositor gives a new toplevel")]
#[command(version)]
struct Args {}

fn main() -> Result<()> {
    // stdout carries only the result line
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let _args = Args::parse();

    let config = load_config();

    if config.keyboard.enabled {
        let silenced = keyboard::ensure_hidden(&config.keyboard);
        tracing::debug!(?silenced, "On-screen keyboard checked");
    }

    let scale = GSettingsScale::new(config.scale.clone());
    let probe = ToplevelProbe::connect(Box::new(scale), config.probe.roundtrip_budget)?;

    match probe.run().context("Toplevel probe failed")? {
        ProbeOutcome::Measured(size) => println!("{}", size),
        outcome => tracing::debug!(?outcome, "No measurement produced"),
    }

    Ok(())
}

/// Load the optional configuration file, falling back to defaults on error
fn load_config() -> Config {
    let path = xdg_toplevel_getinfo_config::config_path();

    match xdg_toplevel_getinfo_config::load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Ignoring invalid configuration at {}", path.display());
            eprintln!("{:?}", miette::Report::new(e));
            Config::default()
        }
    }
}
