//! Enable or disable a channel within a bus's mix.

use clap::Args;
use knobmix_core::RoutingManager;

#[derive(Args)]
pub struct InMixArgs {
    /// Bus id, e.g. "personal" or "voicechat"
    pub bus: String,

    /// Channel id, e.g. "k1"
    pub channel: String,

    /// Remove the channel from the mix instead of adding it
    #[arg(long)]
    pub remove: bool,
}

pub fn run(manager: &RoutingManager, args: InMixArgs) -> anyhow::Result<()> {
    manager.set_channel_in_mix(&args.bus, &args.channel, !args.remove)?;
    let verb = if args.remove { "removed from" } else { "added to" };
    println!("{} {} {}'s mix", args.channel, verb, args.bus);
    Ok(())
}
