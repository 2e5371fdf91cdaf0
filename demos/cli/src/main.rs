//! Knobmix CLI - thin command-line driver for the Routing Manager.
//!
//! Wires `knobmix_core`/`knobmix_platform` together, initializes logging and
//! the persisted Routing Configuration, and exposes the control-surface
//! operations from §6 as subcommands. Installing IOProcs against a real
//! audio server is the platform/installer boundary's job and stays out of
//! this binary's scope.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "knobmix")]
#[command(author, version, about = "Knobmix routing engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current engine state (channels, buses, available outputs) as JSON
    State,

    /// Set a channel's volume (0.0-1.0)
    Volume(commands::volume::VolumeArgs),

    /// Mute or unmute a channel
    Mute(commands::mute::MuteArgs),

    /// Enable or disable a channel within a bus's mix
    InMix(commands::in_mix::InMixArgs),

    /// Switch a bus's output sink
    Sink(commands::sink::SinkArgs),

    /// List the output devices the bus sink picker can target
    Devices,
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let manager = knobmix_core::RoutingManager::initialize()?;

    let result = match cli.command {
        Commands::State => commands::state::run(&manager),
        Commands::Volume(args) => commands::volume::run(&manager, args),
        Commands::Mute(args) => commands::mute::run(&manager, args),
        Commands::InMix(args) => commands::in_mix::run(&manager, args),
        Commands::Sink(args) => commands::sink::run(&manager, args),
        Commands::Devices => commands::devices::run(&manager),
    };

    manager.shutdown();
    result
}
