//! Mute or unmute a channel.

use clap::Args;
use knobmix_core::RoutingManager;

#[derive(Args)]
pub struct MuteArgs {
    /// Channel id, e.g. "k1"
    pub channel: String,

    /// Unmute instead of mute
    #[arg(long)]
    pub unmute: bool,
}

pub fn run(manager: &RoutingManager, args: MuteArgs) -> anyhow::Result<()> {
    manager.set_channel_muted(&args.channel, !args.unmute)?;
    println!("{} {}", args.channel, if args.unmute { "unmuted" } else { "muted" });
    Ok(())
}
