//! Set a channel's volume.

use clap::Args;
use knobmix_core::RoutingManager;

#[derive(Args)]
pub struct VolumeArgs {
    /// Channel id, e.g. "k1"
    pub channel: String,

    /// Volume in [0.0, 1.0]
    pub level: f32,
}

pub fn run(manager: &RoutingManager, args: VolumeArgs) -> anyhow::Result<()> {
    manager.set_channel_volume(&args.channel, args.level)?;
    println!("{} volume -> {:.2}", args.channel, args.level.clamp(0.0, 1.0));
    Ok(())
}
