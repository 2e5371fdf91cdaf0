//! Hardware events and the control surface's wire types (§6)
//!
//! `HardwareEvent`s flow from the (external, out-of-scope) USB HID
//! transport into the Routing Manager. `ChannelState`/`BusState`/`Event`
//! flow back out to any non-real-time caller (UI, CLI, tests) — the same
//! tag/payload serde shape this codebase already uses for its engine
//! events.

use serde::{Deserialize, Serialize};

/// `(hardware_index, value in [0,255])` for a knob/slider, or
/// `(hardware_index, pressed)` for a button, per §3's data model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HardwareEvent {
    Control { hardware_index: u32, value: u8 },
    Button { hardware_index: u32, pressed: bool },
}

/// One channel's view of `get_state()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelState {
    pub id: String,
    pub label: String,
    pub hardware_index: u32,
    pub volume: f32,
    pub muted: bool,
    pub active: bool,
}

/// One bus's view of `get_state()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusSnapshot {
    pub id: String,
    pub name: String,
    pub sink_id: Option<String>,
    pub membership: Vec<String>,
    pub running: bool,
}

/// An available output device, as returned by `list_outputs()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputDevice {
    pub id: String,
    pub name: String,
}

/// The full `get_state()` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineState {
    pub channels: Vec<ChannelState>,
    pub buses: Vec<BusSnapshot>,
    pub available_outputs: Vec<OutputDevice>,
}

/// Asynchronous notifications a non-real-time caller may want to observe
/// (config changes, device hot-plug, buffer underrun counts surfaced by the
/// control-thread poller described in `SPEC_FULL.md` §10.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    StateUpdate(EngineState),
    DevicesChanged,
    BusStarted { bus: String },
    BusStopped { bus: String },
    Underrun { channel: String, count: u64 },
    Error { message: String },
}

impl Event {
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_event_variants() {
        let v = HardwareEvent::Control { hardware_index: 3, value: 128 };
        assert!(matches!(v, HardwareEvent::Control { hardware_index: 3, value: 128 }));

        let b = HardwareEvent::Button { hardware_index: 9, pressed: true };
        assert!(matches!(b, HardwareEvent::Button { pressed: true, .. }));
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = Event::BusStarted { bus: "personal".into() };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Event::BusStarted { bus } if bus == "personal"));
    }

    #[test]
    fn test_error_event_helper() {
        let event = Event::error("boom");
        match event {
            Event::Error { message } => assert_eq!(message, "boom"),
            _ => panic!("wrong variant"),
        }
    }
}
