//! Routing Manager (component G)
//!
//! Owns the persisted `RoutingConfig`, the live `Bus`/`InputChannel`/
//! `VirtualEndpoint` object graph built from it, and the hardware-index →
//! channel mapping. Every mutating control-surface operation in §6 goes
//! through here; so does hardware-event dispatch and the debounced config
//! save.
//!
//! This is a control-thread-only module: nothing here runs on a real-time
//! audio callback. It wires up the objects that DO run on real-time
//! threads (`Bus::render`, `InputChannel::ingest`/`consume`,
//! `VirtualEndpoint::output_write`/`input_read`) but never calls them
//! itself — installing and scheduling the actual IOProcs against a real
//! audio server is the platform/installer boundary's job (§1, out of
//! scope here).

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::bus::{warn_unknown_hardware_index, Bus, BusState};
use crate::config::{ActionKind, RoutingConfig};
use crate::error::{CoreError, CoreResult};
use crate::input_channel::InputChannel;
use crate::meter;
use crate::message::{BusSnapshot, ChannelState, EngineState, HardwareEvent, OutputDevice};
use crate::plugin_host::{self, PluginHost, PLUGIN_TYPE_UUID};
use crate::virtual_endpoint::VirtualEndpoint;

/// Device-format negotiation (actual hardware sample rate) is outside the
/// Device Directory's query surface (§4.H lists id/name/has-output/
/// has-input only), so every bus renders at the Virtual Endpoint's own
/// nominal default instead of a queried hardware rate.
const NOMINAL_SAMPLE_RATE: u32 = 48_000;
const BUFFER_FRAMES: usize = 512;

/// Coalescing window for the debounced config save (§4.G / §10.2).
const SAVE_DEBOUNCE: std::time::Duration = std::time::Duration::from_secs(1);

const MAX_LABEL_CODEPOINTS: usize = 32;

enum PersistMsg {
    Dirty,
    FlushAndStop(Sender<()>),
}

/// One configured input channel's live wiring: the source Virtual Endpoint
/// it pulls from, and the set of per-bus `InputChannel` instances currently
/// representing it (one per bus it's a member of, per §3's "created when
/// added to a Bus ... destroyed with the Bus").
struct ChannelRuntime {
    hardware_index: u32,
    endpoint: Arc<VirtualEndpoint>,
    members: Mutex<Vec<(String, Arc<InputChannel>)>>,
}

impl ChannelRuntime {
    /// Push the effective gain (0 if muted, else volume) to every bus-local
    /// `InputChannel` currently representing this channel, per §4.G's
    /// "broadcast the effective gain to every bus containing that channel".
    fn broadcast_gain(&self, effective_gain: f32) {
        for (_, ch) in self.members.lock().iter() {
            ch.set_gain(effective_gain);
        }
    }
}

pub struct RoutingManager {
    config: Arc<RwLock<RoutingConfig>>,
    plugin_host: Arc<PluginHost>,
    channels: RwLock<HashMap<String, Arc<ChannelRuntime>>>,
    buses: RwLock<HashMap<String, Arc<Bus>>>,
    dirty_tx: Sender<PersistMsg>,
    persistence_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl RoutingManager {
    /// Load config (§6), enumerate devices (§4.H via `knobmix_platform`),
    /// build `personal`/`voicechat`, populate membership, apply
    /// gain/mute/enabled, and start every bus with at least one enabled
    /// member (§4.G, open question disposition in `SPEC_FULL.md` §12).
    pub fn initialize() -> CoreResult<Self> {
        let config = RoutingConfig::load();
        let plugin_host = plugin_entry_or_init();

        let outputs = match knobmix_platform::list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "device enumeration failed during initialize");
                Vec::new()
            }
        };
        info!(count = outputs.len(), "enumerated audio devices at startup");

        let mut channels = HashMap::new();
        for ch_config in &config.input_channels {
            let Some(endpoint) = plugin_host
                .panel_endpoints()
                .get(ch_config.hardware_index as usize)
                .cloned()
            else {
                warn!(
                    channel = ch_config.id,
                    hardware_index = ch_config.hardware_index,
                    "hardware index out of range; channel has no source endpoint"
                );
                continue;
            };
            channels.insert(
                ch_config.id.clone(),
                Arc::new(ChannelRuntime {
                    hardware_index: ch_config.hardware_index,
                    endpoint,
                    members: Mutex::new(Vec::new()),
                }),
            );
        }

        let manager_channels = RwLock::new(channels);
        let buses = RwLock::new(HashMap::new());

        let config = Arc::new(RwLock::new(config));

        let (dirty_tx, dirty_rx) = unbounded::<PersistMsg>();
        let persistence_thread = {
            let config = Arc::clone(&config);
            std::thread::Builder::new()
                .name("knobmix-persist".into())
                .spawn(move || persistence_loop(dirty_rx, config))
                .map_err(|e| CoreError::Persistence(e.to_string()))?
        };

        let manager = Self {
            config,
            plugin_host,
            channels: manager_channels,
            buses,
            dirty_tx,
            persistence_thread: Mutex::new(Some(persistence_thread)),
        };

        manager.rebuild_buses()?;
        Ok(manager)
    }

    /// Build (or rebuild) every configured bus from scratch: fresh `Bus`
    /// objects, membership, gain/mute application, and a start attempt for
    /// any bus that ends up with at least one enabled member.
    fn rebuild_buses(&self) -> CoreResult<()> {
        let config = self.config.read();
        let channels = self.channels.read();
        let mut buses = self.buses.write();
        buses.clear();

        for bus_config in &config.mix_buses {
            let bus = Arc::new(Bus::new(bus_config.id.clone(), bus_config.name.clone()));
            bus.set_sink(bus_config.output_device_id.clone())?;

            for member in &bus_config.channels {
                let Some(runtime) = channels.get(&member.channel_id) else {
                    warn!(
                        bus = bus_config.id,
                        channel = member.channel_id,
                        "bus member references unknown channel; skipping"
                    );
                    continue;
                };
                let input_channel = Arc::new(InputChannel::new(
                    member.channel_id.clone(),
                    runtime.endpoint.sample_rate(),
                    NOMINAL_SAMPLE_RATE,
                ));
                bus.add_member(Arc::clone(&input_channel));
                if !member.enabled {
                    bus.set_channel_in_mix(&member.channel_id, false)?;
                }
                if let Some(gain_override) = member.gain_override {
                    bus.set_gain_override(&member.channel_id, gain_override)?;
                }
                runtime
                    .members
                    .lock()
                    .push((bus_config.id.clone(), input_channel));
            }

            buses.insert(bus_config.id.clone(), Arc::clone(&bus));
        }
        drop(buses);
        drop(channels);
        drop(config);

        // Apply each channel's configured gain/mute now that every bus's
        // membership (and therefore every live InputChannel) exists.
        let config = self.config.read();
        for ch_config in &config.input_channels {
            let effective = if ch_config.muted { 0.0 } else { ch_config.volume };
            if let Some(runtime) = self.channels.read().get(&ch_config.id) {
                runtime.broadcast_gain(effective);
            }
        }
        drop(config);

        for bus in self.buses.read().values() {
            self.maybe_start_or_stop(bus);
        }
        Ok(())
    }

    /// Starts `bus` if it has ≥1 enabled member and isn't already running;
    /// stops it if it has none and is running. Implements the Voice Chat
    /// open-question disposition uniformly for every bus.
    fn maybe_start_or_stop(&self, bus: &Arc<Bus>) {
        let should_run = bus.enabled_member_count() > 0;
        match (should_run, bus.state()) {
            (true, BusState::Configured) | (true, BusState::Stopped) => {
                if let Err(e) = bus.start(NOMINAL_SAMPLE_RATE, BUFFER_FRAMES) {
                    warn!(bus = bus.id(), error = %e, "failed to start bus");
                }
            }
            (false, BusState::Running) => {
                bus.stop();
            }
            _ => {}
        }
    }

    fn mark_dirty(&self) {
        let _ = self.dirty_tx.send(PersistMsg::Dirty);
    }

    /// `get_state()` — channels reported from the `personal` bus's live
    /// membership per §4.I ("every Input Channel in the primary bus").
    pub fn get_state(&self) -> EngineState {
        let config = self.config.read();
        let channels_registry = self.channels.read();
        let buses = self.buses.read();

        let channels = config
            .input_channels
            .iter()
            .map(|c| {
                let active = channels_registry
                    .get(&c.id)
                    .and_then(|runtime| {
                        runtime
                            .members
                            .lock()
                            .iter()
                            .find(|(bus_id, _)| bus_id == "personal")
                            .map(|(_, ch)| meter::activity(ch))
                    })
                    .unwrap_or(false);
                ChannelState {
                    id: c.id.clone(),
                    label: c.channel_name.clone(),
                    hardware_index: c.hardware_index,
                    volume: c.volume,
                    muted: c.muted,
                    active,
                }
            })
            .collect();

        let bus_snapshots = config
            .mix_buses
            .iter()
            .map(|b| {
                let running = buses
                    .get(&b.id)
                    .map(|bus| bus.state() == BusState::Running)
                    .unwrap_or(false);
                BusSnapshot {
                    id: b.id.clone(),
                    name: b.name.clone(),
                    sink_id: b.output_device_id.clone(),
                    membership: b.channels.iter().map(|m| m.channel_id.clone()).collect(),
                    running,
                }
            })
            .collect();

        let available_outputs = knobmix_platform::list_devices()
            .unwrap_or_else(|e| {
                warn!(error = %e, "device enumeration failed for get_state");
                Vec::new()
            })
            .into_iter()
            .map(|d| OutputDevice { id: d.id, name: d.name })
            .collect();

        EngineState {
            channels,
            buses: bus_snapshots,
            available_outputs,
        }
    }

    pub fn set_channel_label(&self, id: &str, text: &str) -> CoreResult<ChannelState> {
        if text.chars().count() > MAX_LABEL_CODEPOINTS {
            return Err(CoreError::LabelTooLong);
        }
        let mut config = self.config.write();
        let channel = config
            .channel_mut(id)
            .ok_or_else(|| CoreError::UnknownChannel(id.to_string()))?;
        channel.channel_name = text.to_string();
        let snapshot = ChannelState {
            id: channel.id.clone(),
            label: channel.channel_name.clone(),
            hardware_index: channel.hardware_index,
            volume: channel.volume,
            muted: channel.muted,
            active: false,
        };
        drop(config);
        self.mark_dirty();
        Ok(snapshot)
    }

    pub fn set_channel_volume(&self, id: &str, volume: f32) -> CoreResult<()> {
        let volume = volume.clamp(0.0, 1.0);
        let muted = {
            let mut config = self.config.write();
            let channel = config
                .channel_mut(id)
                .ok_or_else(|| CoreError::UnknownChannel(id.to_string()))?;
            channel.volume = volume;
            channel.muted
        };
        self.broadcast_channel_gain(id, muted, volume)?;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_channel_muted(&self, id: &str, muted: bool) -> CoreResult<()> {
        let volume = {
            let mut config = self.config.write();
            let channel = config
                .channel_mut(id)
                .ok_or_else(|| CoreError::UnknownChannel(id.to_string()))?;
            channel.muted = muted;
            channel.volume
        };
        self.broadcast_channel_gain(id, muted, volume)?;
        self.mark_dirty();
        Ok(())
    }

    fn broadcast_channel_gain(&self, id: &str, muted: bool, volume: f32) -> CoreResult<()> {
        let runtime = self
            .channels
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownChannel(id.to_string()))?;
        let effective = if muted { 0.0 } else { volume };
        runtime.broadcast_gain(effective);
        Ok(())
    }

    pub fn set_channel_in_mix(&self, bus_id: &str, channel_id: &str, in_mix: bool) -> CoreResult<()> {
        let bus = self
            .buses
            .read()
            .get(bus_id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownBus(bus_id.to_string()))?;
        bus.set_channel_in_mix(channel_id, in_mix)?;

        {
            let mut config = self.config.write();
            if let Some(bus_config) = config.bus_mut(bus_id) {
                if let Some(member) = bus_config.channels.iter_mut().find(|m| m.channel_id == channel_id) {
                    member.enabled = in_mix;
                }
            }
        }

        self.maybe_start_or_stop(&bus);
        self.mark_dirty();
        Ok(())
    }

    /// Live sink switch (§4.G): stop, update config, resolve a concrete
    /// device id (falling back to the OS default if `None`), `set_sink`,
    /// restart. Leaves the bus stopped and surfaces the error on failure.
    pub fn set_bus_sink(&self, bus_id: &str, device_id: Option<String>) -> CoreResult<()> {
        let bus = self
            .buses
            .read()
            .get(bus_id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownBus(bus_id.to_string()))?;

        let was_running = bus.state() == BusState::Running;
        bus.stop();

        let resolved = resolve_device_id(device_id);
        {
            let mut config = self.config.write();
            if let Some(bus_config) = config.bus_mut(bus_id) {
                bus_config.output_device_id = resolved.clone();
            }
        }

        bus.set_sink(resolved)?;

        if was_running {
            if let Err(e) = bus.start(NOMINAL_SAMPLE_RATE, BUFFER_FRAMES) {
                warn!(bus = bus_id, error = %e, "failed to restart bus after sink switch");
                self.mark_dirty();
                return Err(e);
            }
        }

        self.mark_dirty();
        Ok(())
    }

    /// Hardware-event dispatch (§4.G): look up `hardware_index`'s mapping.
    /// `Volume` actions set the mapped channel's volume from a `Control`
    /// event; `MuteToggle` actions flip mute on a pressed `Button` event.
    /// Unknown index: warn, ignore.
    pub fn on_hardware_event(&self, event: HardwareEvent) {
        let (hardware_index, control_value, button_pressed) = match event {
            HardwareEvent::Control { hardware_index, value } => (hardware_index, Some(value), None),
            HardwareEvent::Button { hardware_index, pressed } => (hardware_index, None, Some(pressed)),
        };

        let mapping = {
            let config = self.config.read();
            config.hardware_mapping.get(&hardware_index).cloned()
        };
        let Some(mapping) = mapping else {
            warn_unknown_hardware_index(hardware_index);
            return;
        };

        match (mapping.kind, control_value, button_pressed) {
            (ActionKind::Volume, Some(raw), _) => {
                let v = raw as f32 / 255.0;
                if let Err(e) = self.set_channel_volume(&mapping.target_id, v) {
                    warn!(channel = mapping.target_id, error = %e, "hardware volume event failed");
                }
            }
            (ActionKind::MuteToggle, _, Some(true)) => {
                let currently_muted = {
                    let config = self.config.read();
                    config.channel(&mapping.target_id).map(|c| c.muted)
                };
                if let Some(currently_muted) = currently_muted {
                    if let Err(e) = self.set_channel_muted(&mapping.target_id, !currently_muted) {
                        warn!(channel = mapping.target_id, error = %e, "hardware mute event failed");
                    }
                } else {
                    warn!(channel = mapping.target_id, "hardware mapping target channel missing");
                }
            }
            _ => {}
        }
    }

    pub fn list_outputs(&self) -> Vec<OutputDevice> {
        knobmix_platform::list_devices()
            .unwrap_or_else(|e| {
                warn!(error = %e, "device enumeration failed for list_outputs");
                Vec::new()
            })
            .into_iter()
            .map(|d| OutputDevice { id: d.id, name: d.name })
            .collect()
    }

    /// Clean shutdown: stop every bus and flush the pending config save
    /// synchronously (§4.G / §7's "a clean shutdown flushes pending saves
    /// synchronously").
    pub fn shutdown(&self) {
        for bus in self.buses.read().values() {
            bus.stop();
        }
        if let Some(handle) = self.persistence_thread.lock().take() {
            let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
            if self.dirty_tx.send(PersistMsg::FlushAndStop(ack_tx)).is_ok() {
                let _ = ack_rx.recv_timeout(std::time::Duration::from_secs(5));
            }
            let _ = handle.join();
        }
    }

    pub fn plugin_host(&self) -> &Arc<PluginHost> {
        &self.plugin_host
    }
}

impl Drop for RoutingManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn plugin_entry_or_init() -> Arc<PluginHost> {
    plugin_host::plugin_entry(PLUGIN_TYPE_UUID).expect("plugin type UUID is a compile-time constant")
}

fn resolve_device_id(requested: Option<String>) -> Option<String> {
    if requested.is_some() {
        return requested;
    }
    match knobmix_platform::default_output() {
        Ok(device) => Some(device.id),
        Err(e) => {
            warn!(error = %e, "no explicit sink requested and no default output available");
            None
        }
    }
}

fn persistence_loop(rx: crossbeam_channel::Receiver<PersistMsg>, config: Arc<RwLock<RoutingConfig>>) {
    loop {
        match rx.recv() {
            Ok(PersistMsg::Dirty) => {
                // Coalesce any further dirty signals that land inside the
                // debounce window before actually touching disk.
                while rx.recv_timeout(SAVE_DEBOUNCE).is_ok() {}
                let snapshot = config.read().clone();
                if let Err(e) = snapshot.save() {
                    crate::config::log_save_error(&e);
                }
            }
            Ok(PersistMsg::FlushAndStop(ack)) => {
                let snapshot = config.read().clone();
                if let Err(e) = snapshot.save() {
                    crate::config::log_save_error(&e);
                }
                let _ = ack.send(());
                return;
            }
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_initialize_builds_default_buses() {
        let manager = RoutingManager::initialize().unwrap();
        let state = manager.get_state();
        assert_eq!(state.channels.len(), 9);
        assert_eq!(state.buses.len(), 2);
        manager.shutdown();
    }
}
