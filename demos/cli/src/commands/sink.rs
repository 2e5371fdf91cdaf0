//! Switch a bus's output sink.

use clap::Args;
use knobmix_core::RoutingManager;

#[derive(Args)]
pub struct SinkArgs {
    /// Bus id, e.g. "personal" or "voicechat"
    pub bus: String,

    /// Output device id; omit to fall back to the OS default output
    pub device_id: Option<String>,
}

pub fn run(manager: &RoutingManager, args: SinkArgs) -> anyhow::Result<()> {
    manager.set_bus_sink(&args.bus, args.device_id.clone())?;
    match args.device_id {
        Some(id) => println!("{} sink -> {}", args.bus, id),
        None => println!("{} sink -> OS default output", args.bus),
    }
    Ok(())
}
