//! Platform Error Types

use thiserror::Error;

/// Errors from platform-specific operations
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("platform not supported")]
    UnsupportedPlatform,

    #[error("feature not available on this platform: {0}")]
    FeatureNotAvailable(String),

    #[error("failed to connect to audio server: {0}")]
    ConnectionFailed(String),

    #[error("failed to create virtual sink: {0}")]
    VirtualDeviceCreationFailed(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("backend initialization failed: {0}")]
    InitializationFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}
