//! Persisted Routing Configuration (§6)
//!
//! A JSON document at an OS-appropriate per-user path. Unknown fields are
//! ignored (serde's default behavior for fields a struct doesn't declare);
//! missing fields are filled from `#[serde(default)]`/`#[serde(default =
//! "...")]` so configs written by an older build of this program keep
//! loading. Writes are whole-file and atomic: serialize to a temp file in
//! the same directory, then rename over the destination.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

pub const HARDWARE_CHANNEL_COUNT: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Volume,
    MuteToggle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputChannelConfig {
    pub id: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub channel_name: String,
    pub hardware_index: u32,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub muted: bool,
}

fn default_volume() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMemberConfig {
    pub channel_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub gain_override: Option<f32>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixBusConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub output_device_id: Option<String>,
    #[serde(default)]
    pub channels: Vec<BusMemberConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareMappingEntry {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub target_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    #[serde(default)]
    pub input_channels: Vec<InputChannelConfig>,
    #[serde(default)]
    pub mix_buses: Vec<MixBusConfig>,
    #[serde(default)]
    pub hardware_mapping: std::collections::HashMap<u32, HardwareMappingEntry>,
}

impl Default for RoutingConfig {
    /// §6 defaults: nine input channels at hardware indices 0-8; one
    /// `personal` bus enabling all nine with a null sink; one `voicechat`
    /// bus empty by default with a null sink; every hardware index mapped
    /// to `volume` on its corresponding channel.
    fn default() -> Self {
        let input_channels: Vec<InputChannelConfig> = (0..HARDWARE_CHANNEL_COUNT)
            .map(|i| InputChannelConfig {
                id: format!("k{}", i + 1),
                device_name: String::new(),
                channel_name: crate::plugin_host::PANEL_ENDPOINT_NAMES[i as usize].to_string(),
                hardware_index: i,
                volume: 1.0,
                muted: false,
            })
            .collect();

        let personal_members = input_channels
            .iter()
            .map(|c| BusMemberConfig {
                channel_id: c.id.clone(),
                enabled: true,
                gain_override: None,
            })
            .collect();

        let hardware_mapping = input_channels
            .iter()
            .map(|c| {
                (
                    c.hardware_index,
                    HardwareMappingEntry {
                        kind: ActionKind::Volume,
                        target_id: c.id.clone(),
                    },
                )
            })
            .collect();

        Self {
            input_channels,
            mix_buses: vec![
                MixBusConfig {
                    id: "personal".to_string(),
                    name: "Personal".to_string(),
                    output_device_id: None,
                    channels: personal_members,
                },
                MixBusConfig {
                    id: "voicechat".to_string(),
                    name: "Voice Chat".to_string(),
                    output_device_id: None,
                    channels: Vec::new(),
                },
            ],
            hardware_mapping,
        }
    }
}

impl RoutingConfig {
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "knobmix", "knobmix")
            .map(|dirs| dirs.config_dir().join("routing.json"))
    }

    /// Load from the OS-appropriate path, falling back to `Self::default()`
    /// on any error (missing file, malformed JSON) per §7: "Persistence
    /// failure: log; do not abort; the in-memory state remains
    /// authoritative until next save attempt."
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("could not determine config directory; using defaults");
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "failed to load routing config; using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        serde_json::from_reader(file).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self) -> io::Result<()> {
        let Some(path) = Self::config_path() else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no config directory"));
        };
        self.save_to(&path)
    }

    /// Atomic whole-file write: serialize to a temp file beside `path`,
    /// then rename over it, so a crash mid-write can never leave a
    /// truncated/corrupt config on disk.
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        {
            let file = fs::File::create(&tmp_path)?;
            serde_json::to_writer_pretty(&file, self)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn channel(&self, id: &str) -> Option<&InputChannelConfig> {
        self.input_channels.iter().find(|c| c.id == id)
    }

    pub fn channel_mut(&mut self, id: &str) -> Option<&mut InputChannelConfig> {
        self.input_channels.iter_mut().find(|c| c.id == id)
    }

    pub fn bus(&self, id: &str) -> Option<&MixBusConfig> {
        self.mix_buses.iter().find(|b| b.id == id)
    }

    pub fn bus_mut(&mut self, id: &str) -> Option<&mut MixBusConfig> {
        self.mix_buses.iter_mut().find(|b| b.id == id)
    }
}

pub fn log_save_error(e: &io::Error) {
    error!(error = %e, "routing config save failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_spec() {
        let cfg = RoutingConfig::default();
        assert_eq!(cfg.input_channels.len(), 9);
        assert_eq!(cfg.mix_buses.len(), 2);

        let personal = cfg.bus("personal").unwrap();
        assert_eq!(personal.channels.len(), 9);
        assert!(personal.output_device_id.is_none());
        assert!(personal.channels.iter().all(|m| m.enabled));

        let voicechat = cfg.bus("voicechat").unwrap();
        assert!(voicechat.channels.is_empty());
        assert!(voicechat.output_device_id.is_none());

        assert_eq!(cfg.hardware_mapping.len(), 9);
        for idx in 0..9u32 {
            let entry = cfg.hardware_mapping.get(&idx).unwrap();
            assert_eq!(entry.kind, ActionKind::Volume);
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("routing.json");

        let cfg = RoutingConfig::default();
        cfg.save_to(&path).unwrap();

        let loaded = RoutingConfig::load_from(&path).unwrap();
        assert_eq!(loaded.input_channels.len(), cfg.input_channels.len());
        assert_eq!(loaded.mix_buses.len(), cfg.mix_buses.len());
        assert_eq!(loaded.hardware_mapping.len(), cfg.hardware_mapping.len());
    }

    #[test]
    fn test_unknown_fields_ignored_missing_fields_defaulted() {
        let json = r#"{
            "inputChannels": [{"id": "k1", "hardwareIndex": 0, "somethingNew": true}],
            "mixBuses": [],
            "hardwareMapping": {},
            "futureTopLevelField": 42
        }"#;
        let cfg: RoutingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.input_channels.len(), 1);
        assert_eq!(cfg.input_channels[0].volume, 1.0);
        assert!(!cfg.input_channels[0].muted);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("routing.json");
        let cfg = RoutingConfig::default();
        cfg.save_to(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        assert!(RoutingConfig::load_from(&path).is_err());
    }
}
