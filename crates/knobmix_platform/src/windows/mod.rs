//! Windows Sink Publisher
//!
//! WASAPI has no runtime API for creating a virtual audio endpoint — that
//! requires a kernel-mode driver (VB-Cable, Voicemeeter, and similar tools
//! install one) — so `WindowsPublisher` always refuses `publish()`. It
//! still talks to real COM/MMDevice APIs to resolve the current default
//! output device's ID via the `windows` crate, the same boundary every
//! other WASAPI-facing query on this platform goes through.

use windows::Win32::Media::Audio::{eConsole, eRender, IMMDeviceEnumerator, MMDeviceEnumerator};
use windows::Win32::System::Com::{CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_MULTITHREADED};

use crate::error::PlatformError;
use crate::sink::{PublishedSink, SinkPublisher, SinkSampleSink};

pub struct WindowsPublisher;

impl WindowsPublisher {
    pub fn new() -> Result<Self, PlatformError> {
        Ok(Self)
    }

    /// The default render device's endpoint ID string, resolved through
    /// `IMMDeviceEnumerator` purely to prove (and log) that there is
    /// nothing further upstream Knobmix could route a published sink to
    /// without a driver.
    pub fn default_render_endpoint_id() -> Result<String, PlatformError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| PlatformError::InitializationFailed(e.to_string()))?;

            let result = (|| -> windows::core::Result<String> {
                let enumerator: IMMDeviceEnumerator =
                    CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)?;
                let device = enumerator.GetDefaultAudioEndpoint(eRender, eConsole)?;
                let id = device.GetId()?;
                Ok(id.to_string()?)
            })();

            CoUninitialize();
            result.map_err(|e| PlatformError::DeviceNotFound(e.to_string()))
        }
    }
}

impl SinkPublisher for WindowsPublisher {
    fn backend_name(&self) -> &'static str {
        "WASAPI (publishing unavailable without a virtual audio driver)"
    }

    fn publish(
        &self,
        _name: &str,
        _channels: u32,
        _sample_rate: u32,
        _sink: std::sync::Arc<dyn SinkSampleSink>,
    ) -> Result<Box<dyn PublishedSink>, PlatformError> {
        Err(PlatformError::FeatureNotAvailable(
            "publishing a virtual sink on Windows requires a kernel-mode audio driver \
             (e.g. VB-Cable); knobmix does not install one"
                .into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_always_refuses() {
        struct NullSink;
        impl SinkSampleSink for NullSink {
            fn write_interleaved(&self, samples: &[f32]) -> usize {
                samples.len()
            }
        }
        let publisher = WindowsPublisher::new().unwrap();
        let result = publisher.publish("k1", 2, 48_000, std::sync::Arc::new(NullSink));
        assert!(matches!(result, Err(PlatformError::FeatureNotAvailable(_))));
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_default_render_endpoint_id() {
        let id = WindowsPublisher::default_render_endpoint_id().unwrap();
        assert!(!id.is_empty());
    }
}
