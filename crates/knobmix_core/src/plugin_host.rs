//! Plugin Host (component C)
//!
//! Constructs `N = 9` one-way virtual endpoints ("Panel K1"..."Panel S4")
//! plus one bidirectional "Voice Chat" endpoint, and models the
//! CoreAudio-HAL-style plugin boundary from §6: a single entry point that
//! accepts a type-UUID and returns a reference-counted plugin object iff it
//! matches, constructed exactly once per process and idempotent on repeat
//! calls.
//!
//! The privileged OS-side registration that makes these endpoints visible
//! as real playback devices is an external concern (§1: "privileged
//! installation of the audio plugin" is out of scope) — this module owns
//! the endpoints and their lifecycle; `knobmix_platform` supplies the
//! optional best-effort hook that publishes them to a real audio server
//! when one is available.

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::virtual_endpoint::VirtualEndpoint;

/// Type-UUID the plugin entry point matches against. A real AudioServerPlugIn
/// uses a CFUUID; here it's just an opaque string compared for equality.
pub const PLUGIN_TYPE_UUID: &str = "com.knobmix.audio-plugin";

pub const PANEL_ENDPOINT_NAMES: &[&str] = &[
    "Panel K1", "Panel K2", "Panel K3", "Panel K4", "Panel K5",
    "Panel S1", "Panel S2", "Panel S3", "Panel S4",
];

const VOICE_CHAT_NAME: &str = "Voice Chat";

/// Owns every Virtual Endpoint for the plugin's lifetime. Constructed once;
/// the module-level entry point (`plugin_entry`) hands out clones of the
/// same `Arc` on every call.
pub struct PluginHost {
    panel_endpoints: Vec<Arc<VirtualEndpoint>>,
    voice_chat: Arc<VirtualEndpoint>,
}

impl PluginHost {
    fn new() -> Self {
        let panel_endpoints = PANEL_ENDPOINT_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let uid = format!("com.knobmix.panel.{}", name.to_ascii_lowercase().replace(' ', "-"));
                info!(endpoint = name, index = i, "constructing panel endpoint");
                Arc::new(VirtualEndpoint::new(uid, *name, false))
            })
            .collect();

        let voice_chat = Arc::new(VirtualEndpoint::new(
            "com.knobmix.voicechat",
            VOICE_CHAT_NAME,
            true,
        ));

        Self { panel_endpoints, voice_chat }
    }

    /// All N panel endpoints, in hardware-index order (index 0 == "Panel K1").
    pub fn panel_endpoints(&self) -> &[Arc<VirtualEndpoint>] {
        &self.panel_endpoints
    }

    pub fn voice_chat(&self) -> &Arc<VirtualEndpoint> {
        &self.voice_chat
    }

    /// Look up an endpoint (panel or voice chat) by name.
    pub fn endpoint_by_name(&self, name: &str) -> Option<Arc<VirtualEndpoint>> {
        if name == VOICE_CHAT_NAME {
            return Some(Arc::clone(&self.voice_chat));
        }
        self.panel_endpoints
            .iter()
            .find(|ep| ep.name() == name)
            .map(Arc::clone)
    }

    pub fn endpoint_count(&self) -> usize {
        self.panel_endpoints.len() + 1
    }
}

static HOST: OnceLock<Arc<PluginHost>> = OnceLock::new();

/// The plugin entry point (§6): accepts a type-UUID, returns a
/// reference-counted plugin object iff it matches the audio-plugin type
/// UUID, `None` on mismatch. The host is constructed exactly once per
/// load; every matching call thereafter returns a clone of the same
/// reference, never rebuilding state.
///
/// There's no "allocator handle" parameter here — unlike a real
/// AudioServerPlugIn, this isn't handed a CFAllocator by the OS; `Arc`
/// itself is the reference-counting mechanism the real boundary asks for.
pub fn plugin_entry(type_uuid: &str) -> Option<Arc<PluginHost>> {
    if type_uuid != PLUGIN_TYPE_UUID {
        return None;
    }
    Some(Arc::clone(HOST.get_or_init(|| Arc::new(PluginHost::new()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_rejects_mismatched_uuid() {
        assert!(plugin_entry("com.someoneelse.other-plugin").is_none());
    }

    #[test]
    fn test_entry_is_idempotent() {
        let a = plugin_entry(PLUGIN_TYPE_UUID).expect("match");
        let b = plugin_entry(PLUGIN_TYPE_UUID).expect("match");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_constructs_nine_panel_endpoints_plus_voice_chat() {
        let host = plugin_entry(PLUGIN_TYPE_UUID).unwrap();
        assert_eq!(host.panel_endpoints().len(), 9);
        assert_eq!(host.endpoint_count(), 10);
        assert!(host.voice_chat().is_bidirectional());
        assert!(!host.panel_endpoints()[0].is_bidirectional());
    }

    #[test]
    fn test_endpoint_lookup_by_name() {
        let host = plugin_entry(PLUGIN_TYPE_UUID).unwrap();
        assert!(host.endpoint_by_name("Panel K4").is_some());
        assert!(host.endpoint_by_name("Voice Chat").is_some());
        assert!(host.endpoint_by_name("Nonexistent").is_none());
    }
}
