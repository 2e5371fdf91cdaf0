//! Core Error Types

use thiserror::Error;

/// Errors produced by control-thread operations on the routing engine.
///
/// Real-time callbacks never return this type — per the concurrency model,
/// they degrade to silence instead of surfacing an error (see `bus.rs` and
/// `input_channel.rs`).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown channel id: {0}")]
    UnknownChannel(String),

    #[error("unknown bus id: {0}")]
    UnknownBus(String),

    #[error("duplicate channel id: {0}")]
    DuplicateChannel(String),

    #[error("hardware index {0} is already mapped")]
    DuplicateHardwareIndex(u32),

    #[error("no channel mapped to hardware index {0}")]
    UnmappedHardwareIndex(u32),

    #[error("bus '{bus}' cannot change sink while running")]
    BusRunning { bus: String },

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to install IOProc for '{0}'")]
    IoProcInstallFailed(String),

    #[error("label exceeds 32 code points")]
    LabelTooLong,

    #[error("config load/save failed: {0}")]
    Persistence(String),

    #[error(transparent)]
    Dsp(#[from] knobmix_dsp::DspError),

    #[error(transparent)]
    Platform(#[from] knobmix_platform::PlatformError),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownChannel("k4".into());
        assert!(err.to_string().contains("k4"));
    }

    #[test]
    fn test_error_from_dsp() {
        let dsp_err = knobmix_dsp::DspError::InvalidThreshold(2.0);
        let core_err: CoreError = dsp_err.into();
        assert!(matches!(core_err, CoreError::Dsp(_)));
    }
}
