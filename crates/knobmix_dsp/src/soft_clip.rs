//! Soft Clipping / Limiter
//!
//! The only nonlinear DSP the routing engine is allowed to perform (see the
//! core's Non-goals): a smooth saturation curve applied to a bus's summed
//! output so that an overloaded mix rolls off instead of wrapping or hard
//! clipping.
//!
//! # Algorithm
//!
//! - Below threshold: linear (unity gain)
//! - Above threshold: smooth saturation via `tanh()`, asymptotically
//!   approaching the output ceiling
//!
//! A bus's render callback uses a threshold of `1.0` ("hard soft-clip at
//! ±1.0"): the curve is linear right up to full scale and only engages for
//! samples that would otherwise exceed it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::DspError;

/// Soft clipper that keeps output within `±1.0` via smooth saturation.
///
/// Thread-safe: threshold and enabled state can be updated from a control
/// thread while a real-time thread calls `process_sample`/`process_interleaved`.
pub struct SoftClipper {
    /// Threshold where soft clipping begins (linear, 0.0 to 1.0), stored as
    /// f32 bits for lock-free atomic access from the render callback.
    threshold_bits: AtomicU32,
    enabled: AtomicBool,
}

impl SoftClipper {
    /// Create a clipper with the given linear threshold in `(0, 1]`.
    pub fn new(threshold: f32) -> Result<Self, DspError> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(DspError::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold_bits: AtomicU32::new(threshold.to_bits()),
            enabled: AtomicBool::new(true),
        })
    }

    /// The bus-output clipper: linear until full scale, matching the
    /// "hard soft-clip at ±1.0" requirement on the render callback.
    pub fn unit() -> Self {
        Self::new(1.0).expect("1.0 is a valid threshold")
    }

    pub fn set_threshold(&self, threshold: f32) -> Result<(), DspError> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(DspError::InvalidThreshold(threshold));
        }
        self.threshold_bits.store(threshold.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn threshold(&self) -> f32 {
        f32::from_bits(self.threshold_bits.load(Ordering::Relaxed))
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Process a single sample through the soft clipper.
    ///
    /// # Real-time Safety
    /// No allocations, no syscalls, O(1) time.
    #[inline]
    pub fn process_sample(&self, sample: f32) -> f32 {
        if !self.enabled.load(Ordering::Relaxed) {
            return sample;
        }
        let threshold = f32::from_bits(self.threshold_bits.load(Ordering::Relaxed));
        soft_clip(sample, threshold)
    }

    /// Process an interleaved buffer in-place.
    ///
    /// # Real-time Safety
    /// No allocations, O(n) time.
    #[inline]
    pub fn process_interleaved(&self, buffer: &mut [f32]) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let threshold = f32::from_bits(self.threshold_bits.load(Ordering::Relaxed));
        for sample in buffer.iter_mut() {
            *sample = soft_clip(*sample, threshold);
        }
    }
}

impl Default for SoftClipper {
    fn default() -> Self {
        Self::unit()
    }
}

/// Soft clipping function using tanh-based saturation. Passes through below
/// threshold, preserves sign, and never exceeds ±1.0.
#[inline]
fn soft_clip(sample: f32, threshold: f32) -> f32 {
    let abs_sample = sample.abs();

    if abs_sample <= threshold {
        sample
    } else {
        let sign = sample.signum();
        let excess = abs_sample - threshold;
        let headroom = 1.0 - threshold;
        let normalized_excess = excess / headroom.max(0.001);
        let saturated_excess = headroom * normalized_excess.tanh();
        sign * (threshold + saturated_excess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_threshold_rejected() {
        assert!(SoftClipper::new(0.0).is_err());
        assert!(SoftClipper::new(1.5).is_err());
        assert!(SoftClipper::new(-0.2).is_err());
    }

    #[test]
    fn test_below_threshold_passthrough() {
        let clipper = SoftClipper::new(0.708).unwrap();
        let input = 0.3;
        assert_eq!(clipper.process_sample(input), input);
        assert_eq!(clipper.process_sample(-input), -input);
    }

    #[test]
    fn test_above_threshold_limited() {
        let clipper = SoftClipper::new(0.5).unwrap();
        let output = clipper.process_sample(2.0);
        assert!(output < 2.0);
        assert!(output < 1.0);
        assert!(output > 0.5);
    }

    #[test]
    fn test_preserves_polarity() {
        let clipper = SoftClipper::unit();
        let out_pos = clipper.process_sample(1.5);
        let out_neg = clipper.process_sample(-1.5);
        assert!(out_pos > 0.0);
        assert!(out_neg < 0.0);
        assert!((out_pos.abs() - out_neg.abs()).abs() < 0.001);
    }

    #[test]
    fn test_disabled_passthrough() {
        let clipper = SoftClipper::unit();
        clipper.set_enabled(false);
        assert_eq!(clipper.process_sample(5.0), 5.0);
    }

    #[test]
    fn test_buffer_processing() {
        let clipper = SoftClipper::new(0.5).unwrap();
        let mut buffer = vec![0.3, -0.3, 0.8, -0.8, 1.5, -1.5];
        let original = buffer.clone();
        clipper.process_interleaved(&mut buffer);
        assert_eq!(buffer[0], original[0]);
        assert_eq!(buffer[1], original[1]);
        assert!(buffer[4] < original[4]);
        assert!(buffer[5] > original[5]);
    }

    #[test]
    fn test_never_exceeds_one() {
        let clipper = SoftClipper::unit();
        for input in [1.01, 10.0, 100.0, 1000.0, -10.0, -100.0, -1000.0] {
            let output = clipper.process_sample(input);
            assert!(output.abs() <= 1.0, "output {output} exceeds +-1.0 for input {input}");
        }
    }

    #[test]
    fn test_unit_threshold_passthrough_up_to_full_scale() {
        let clipper = SoftClipper::unit();
        assert_eq!(clipper.process_sample(1.0), 1.0);
        assert_eq!(clipper.process_sample(-1.0), -1.0);
        assert_eq!(clipper.process_sample(0.999), 0.999);
    }

    #[test]
    fn test_threshold_update() {
        let clipper = SoftClipper::unit();
        clipper.set_threshold(0.5).unwrap();
        assert_eq!(clipper.threshold(), 0.5);
        assert!(clipper.set_threshold(1.5).is_err());
    }
}
