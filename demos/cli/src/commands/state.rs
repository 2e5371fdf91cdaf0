//! Print the current engine state as JSON.

use knobmix_core::RoutingManager;

pub fn run(manager: &RoutingManager) -> anyhow::Result<()> {
    let state = manager.get_state();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
