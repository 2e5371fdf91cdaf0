//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while configuring DSP primitives.
#[derive(Error, Debug)]
pub enum DspError {
    #[error("soft-clip threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("buffer size mismatch: expected {expected}, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::InvalidThreshold(2.0);
        assert!(err.to_string().contains("2"));
    }
}
