//! List the output devices available to the bus sink picker.

use knobmix_core::RoutingManager;

pub fn run(manager: &RoutingManager) -> anyhow::Result<()> {
    let outputs = manager.list_outputs();
    if outputs.is_empty() {
        println!("No output devices found.");
        return Ok(());
    }
    println!("Available Output Devices");
    println!("=========================\n");
    for device in &outputs {
        println!("  {} ({})", device.name, device.id);
    }
    Ok(())
}
