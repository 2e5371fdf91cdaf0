//! Device Directory (component H)
//!
//! A thin, query-only wrapper over `cpal`'s host enumeration: list every OS
//! audio device (with which stream directions it supports), resolve the
//! current default output, and look a device up by its exact display name.
//! Nothing here is cached — each call re-queries the host, since the whole
//! point is to reflect hot-plug changes without a separate watcher.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// One OS audio device, as returned by the Device Directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    /// `cpal` has no separate device ID concept; the device's own name is
    /// used as its identifier, same as the rest of this stack.
    pub id: String,
    pub name: String,
    pub has_output_stream: bool,
    pub has_input_stream: bool,
    pub is_default_output: bool,
}

/// List every audio device the host exposes, merging a device's input and
/// output directions into one entry when both exist under the same name.
pub fn list_devices() -> Result<Vec<DeviceInfo>, PlatformError> {
    let host = cpal::default_host();
    let default_output_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices: Vec<DeviceInfo> = Vec::new();

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            let Ok(name) = device.name() else { continue };
            let is_default_output = default_output_name.as_deref() == Some(name.as_str());
            devices.push(DeviceInfo {
                id: name.clone(),
                name,
                has_output_stream: true,
                has_input_stream: false,
                is_default_output,
            });
        }
    }

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            let Ok(name) = device.name() else { continue };
            if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                existing.has_input_stream = true;
            } else {
                devices.push(DeviceInfo {
                    id: name.clone(),
                    name,
                    has_output_stream: false,
                    has_input_stream: true,
                    is_default_output: false,
                });
            }
        }
    }

    Ok(devices)
}

/// The OS's current default output device.
pub fn default_output() -> Result<DeviceInfo, PlatformError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlatformError::DeviceNotFound("no default output device".into()))?;
    let name = device
        .name()
        .map_err(|e| PlatformError::DeviceNotFound(e.to_string()))?;
    Ok(DeviceInfo {
        id: name.clone(),
        name,
        has_output_stream: true,
        has_input_stream: false,
        is_default_output: true,
    })
}

/// Look up a device by its exact display name.
pub fn by_name(name: &str) -> Result<DeviceInfo, PlatformError> {
    list_devices()?
        .into_iter()
        .find(|d| d.name == name)
        .ok_or_else(|| PlatformError::DeviceNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_list_devices() {
        let devices = list_devices().unwrap();
        assert!(!devices.is_empty());
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_default_output() {
        let device = default_output().unwrap();
        assert!(device.is_default_output);
        assert!(device.has_output_stream);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_by_name_round_trips_default() {
        let default = default_output().unwrap();
        let looked_up = by_name(&default.name).unwrap();
        assert_eq!(default.name, looked_up.name);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_by_name_missing_device_errors() {
        let err = by_name("definitely-not-a-real-device-__xyz");
        assert!(matches!(err, Err(PlatformError::DeviceNotFound(_))));
    }
}
