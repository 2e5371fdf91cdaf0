//! Knobmix Core - per-application volume routing engine
//!
//! This crate is the two tightly coupled real-time subsystems described by
//! the system this project implements:
//!
//! 1. The virtual-device loopback plugin (components A-C): N+1 Virtual
//!    Endpoints sharing lock-free Ring Buffers between their output-write
//!    and input-read callbacks.
//! 2. The user-space mixing engine (components D-I): per-channel
//!    sample-rate conversion, gain/mute, bus summing and soft-clipping,
//!    metering, and the Routing Manager that wires it all together from
//!    persisted configuration and hardware events.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Control thread                            │
//! │  HID/UI ──on_hardware_event/set_*──▶ RoutingManager ◀──get_state──│
//! └──────────────────────────────────────────────────────────────────┘
//!                              │ builds & wires
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Real-time audio threads                     │
//! │  VirtualEndpoint ──Ring──▶ InputChannel ──Ring──▶ Bus::render    │
//! │      (loopback)         (meter + resample)      (sum + clip)     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod bus;
mod config;
mod error;
mod input_channel;
mod message;
mod meter;
mod plugin_host;
mod resampler;
mod ring_buffer;
mod routing;
mod virtual_endpoint;

pub use bus::{Bus, BusState};
pub use config::{
    ActionKind, BusMemberConfig, HardwareMappingEntry, InputChannelConfig, MixBusConfig,
    RoutingConfig, HARDWARE_CHANNEL_COUNT,
};
pub use error::{CoreError, CoreResult};
pub use input_channel::InputChannel;
pub use message::{BusSnapshot, ChannelState, EngineState, Event, HardwareEvent, OutputDevice};
pub use meter::{activity, levels, ChannelLevel};
pub use plugin_host::{plugin_entry, PluginHost, PANEL_ENDPOINT_NAMES, PLUGIN_TYPE_UUID};
pub use resampler::Resampler;
pub use ring_buffer::RingBuffer;
pub use routing::RoutingManager;
pub use virtual_endpoint::{EndpointError, VirtualEndpoint, CHANNELS, SUPPORTED_RATES};

// Re-export the DSP primitive the render callback depends on.
pub use knobmix_dsp::SoftClipper;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let config = RoutingConfig::default();
        assert_eq!(config.input_channels.len(), HARDWARE_CHANNEL_COUNT as usize);
    }
}
