//! Platform-specific code for Knobmix: Device Directory (component H) and
//! virtual-sink publishing.
//!
//! | Platform | Device Directory | Sink Publisher                              |
//! |----------|-------------------|---------------------------------------------|
//! | Linux    | `cpal`            | PipeWire capture stream (`pipewire` feature) |
//! | macOS    | `cpal`            | refuses — requires an installed HAL plugin   |
//! | Windows  | `cpal`            | refuses — requires a kernel-mode driver      |
//!
//! The Device Directory is the same `cpal`-based query on every platform;
//! only publishing a Virtual Endpoint as a real OS device is
//! platform-specific, and only Linux can do it without a privileged
//! installer (see `SPEC_FULL.md` §1/§13).

mod device_directory;
mod error;
mod sink;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

pub use device_directory::{by_name, default_output, list_devices, DeviceInfo};
pub use error::PlatformError;
pub use sink::{PublishedSink, SinkPublisher, SinkSampleSink};

/// Get this platform's `SinkPublisher`. Always returns `Ok` on a supported
/// platform — where publishing itself isn't possible (macOS, Windows, or
/// Linux without the `pipewire` feature), the returned publisher's
/// `publish()` errors with `PlatformError::FeatureNotAvailable` instead.
pub fn get_publisher() -> Result<Box<dyn SinkPublisher>, PlatformError> {
    #[cfg(all(target_os = "linux", feature = "pipewire"))]
    {
        return Ok(Box::new(linux::PipewirePublisher::new()?));
    }

    #[cfg(all(target_os = "linux", not(feature = "pipewire")))]
    {
        return Ok(Box::new(linux::StubPublisher));
    }

    #[cfg(target_os = "macos")]
    {
        return Ok(Box::new(macos::MacosPublisher::new()?));
    }

    #[cfg(target_os = "windows")]
    {
        return Ok(Box::new(windows::WindowsPublisher::new()?));
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Err(PlatformError::UnsupportedPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_publisher_always_succeeds() {
        assert!(get_publisher().is_ok());
    }
}
