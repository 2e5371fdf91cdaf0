//! Mixer Input Channel (component E)
//!
//! Pulls from one virtual endpoint's input side, meters it, and feeds an
//! output-rate ring that the owning Bus's render callback consumes.
//!
//! Two real-time threads touch a channel concurrently: the source
//! endpoint's input IOProc thread (thread A, `ingest`) and the bus sink's
//! output IOProc thread (thread B, `consume`). They communicate only
//! through the channel's own Ring Buffer and a handful of atomics — no
//! locks on the hot path.
//!
//! Per §3 an `InputChannel` is owned by exactly one bus membership, so its
//! `converter` is only ever touched by that one bus's single render
//! thread (thread B) — never concurrently by two render threads, and never
//! by thread A. It lives behind `UnsafeCell` rather than a lock for the
//! same real-time-safety reason as `Bus`'s scratch buffers.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::resampler::Resampler;
use crate::ring_buffer::RingBuffer;
use crate::virtual_endpoint::CHANNELS;

/// -60 dBFS, the activity threshold from §4.E.
const ACTIVITY_THRESHOLD: f32 = 0.001;

/// Seconds of headroom for an Input Channel's own ring, per §3's "≥10s at
/// the input rate".
const RING_SECONDS: usize = 10;

fn now_ns(epoch: Instant) -> u64 {
    epoch.elapsed().as_nanos() as u64
}

/// A single mixer input channel: gain/enabled atomics, metering atomics, an
/// optional Converter, and an owned Ring Buffer.
pub struct InputChannel {
    id: String,
    gain_bits: AtomicU32,
    enabled: AtomicBool,
    input_rate: u32,
    ring: RingBuffer,
    converter: Option<UnsafeCell<Resampler>>,
    peak_bits: AtomicU32,
    rms_bits: AtomicU32,
    last_activity_ns: AtomicU64,
    epoch: Instant,
}

// SAFETY: `converter` is touched only by the single bus render thread that
// owns this channel's membership (see module doc comment); every other
// field is already `Sync` on its own.
unsafe impl Sync for InputChannel {}

impl InputChannel {
    /// `input_rate`/`output_rate` decide whether a Converter is installed
    /// (§4.F's Bus::start: "create a Converter if the two rates differ").
    pub fn new(id: impl Into<String>, input_rate: u32, output_rate: u32) -> Self {
        let ring_capacity = input_rate as usize * CHANNELS * RING_SECONDS;
        let converter = if input_rate != output_rate {
            Some(UnsafeCell::new(Resampler::new(input_rate, output_rate, CHANNELS)))
        } else {
            None
        };

        Self {
            id: id.into(),
            gain_bits: AtomicU32::new(1.0_f32.to_bits()),
            enabled: AtomicBool::new(true),
            input_rate,
            ring: RingBuffer::new(ring_capacity),
            converter,
            peak_bits: AtomicU32::new(0),
            rms_bits: AtomicU32::new(0),
            last_activity_ns: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain_bits.store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn peak(&self) -> f32 {
        f32::from_bits(self.peak_bits.load(Ordering::Relaxed))
    }

    pub fn rms(&self) -> f32 {
        f32::from_bits(self.rms_bits.load(Ordering::Relaxed))
    }

    /// `true` iff the last above-threshold sample was less than 500ms ago
    /// (the Meter/Activity Reporter's `activity()` contract, component I).
    pub fn is_active(&self, now: Instant) -> bool {
        let last = self.last_activity_ns.load(Ordering::Relaxed);
        if last == 0 {
            return false;
        }
        let now_ns = now.duration_since(self.epoch).as_nanos() as u64;
        now_ns.saturating_sub(last) < 500_000_000
    }

    /// Ingest side (real-time thread A): copy an incoming interleaved
    /// buffer into this channel's Ring Buffer, and in the same pass compute
    /// peak/RMS and stamp activity.
    pub fn ingest(&self, buffer: &[f32]) {
        let mut peak = 0.0_f32;
        let mut sum_sq = 0.0_f32;
        let mut active = false;
        for &sample in buffer {
            let abs = sample.abs();
            if abs > peak {
                peak = abs;
            }
            sum_sq += sample * sample;
            if abs > ACTIVITY_THRESHOLD {
                active = true;
            }
        }
        let rms = if buffer.is_empty() {
            0.0
        } else {
            (sum_sq / buffer.len() as f32).sqrt()
        };

        self.peak_bits.store(peak.to_bits(), Ordering::Relaxed);
        self.rms_bits.store(rms.to_bits(), Ordering::Relaxed);
        if active {
            self.last_activity_ns
                .store(now_ns(self.epoch), Ordering::Relaxed);
        }

        self.ring.write(buffer);
    }

    /// Consumption side (real-time thread B, driven by the bus sink):
    /// deliver exactly `out_frames` frames into `out` (interleaved stereo),
    /// resampling through the Converter if one is installed.
    ///
    /// `scratch` is a caller-owned stack buffer reused across calls to
    /// avoid allocating in the render callback; it must be at least
    /// `required_scratch_frames(out_frames) * channels` long when a
    /// Converter is installed.
    pub fn consume(&self, out_frames: usize, out: &mut [f32], scratch: &mut [f32]) {
        debug_assert_eq!(out.len(), out_frames * CHANNELS);

        match &self.converter {
            Some(converter) => {
                // SAFETY: only this channel's one owning bus's render
                // thread ever calls `consume`/`required_scratch_frames`.
                let converter = unsafe { &mut *converter.get() };
                let needed = converter.required_input_frames(out_frames);
                let needed_samples = needed * CHANNELS;
                debug_assert!(scratch.len() >= needed_samples);
                let scratch = &mut scratch[..needed_samples];
                self.ring.read(scratch);
                converter.process(scratch, out_frames, out);
            }
            None => {
                self.ring.read(out);
            }
        }
    }

    /// Input frames of scratch space `consume` will need for a Converter,
    /// or 0 when this channel is passthrough.
    pub fn required_scratch_frames(&self, out_frames: usize) -> usize {
        match &self.converter {
            // SAFETY: see `consume`; this also runs on the control thread
            // during `Bus::start`, strictly before the render thread for
            // this channel's bus is installed.
            Some(converter) => unsafe { &*converter.get() }.required_input_frames(out_frames),
            None => 0,
        }
    }

    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }
}

/// Convenience: drive a channel's ingest side directly from a Virtual
/// Endpoint's shared Ring Buffer, as the "driven by (B)'s input IOProc on
/// another thread" flow in §2 describes. `scratch` is reused across calls;
/// `endpoint_ring.read` already zero-fills any shortfall, so the whole
/// buffer is handed to `ingest` regardless of how much was real data.
pub fn pump_from_endpoint(channel: &InputChannel, endpoint_ring: &Arc<RingBuffer>, scratch: &mut [f32]) {
    endpoint_ring.read(scratch);
    channel.ingest(scratch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_when_rates_match() {
        let ch = InputChannel::new("k1", 48_000, 48_000);
        assert!(!ch.has_converter());
        ch.ingest(&[0.5, -0.5, 0.25, -0.25]);

        let mut out = [0.0; 4];
        let mut scratch = [0.0; 0];
        ch.consume(2, &mut out, &mut scratch);
        assert_eq!(out, [0.5, -0.5, 0.25, -0.25]);
    }

    #[test]
    fn test_converter_installed_when_rates_differ() {
        let ch = InputChannel::new("k1", 44_100, 48_000);
        assert!(ch.has_converter());
    }

    #[test]
    fn test_peak_and_rms_tracked() {
        let ch = InputChannel::new("k1", 48_000, 48_000);
        ch.ingest(&[1.0, -1.0, 0.5, -0.5]);
        assert_eq!(ch.peak(), 1.0);
        assert!(ch.rms() > 0.0);
    }

    #[test]
    fn test_activity_flag_transitions() {
        let ch = InputChannel::new("k1", 48_000, 48_000);
        assert!(!ch.is_active(Instant::now()));

        ch.ingest(&[0.5, 0.5]);
        assert!(ch.is_active(Instant::now()));
    }

    #[test]
    fn test_silence_does_not_mark_active() {
        let ch = InputChannel::new("k1", 48_000, 48_000);
        ch.ingest(&[0.0, 0.0, 0.0001, -0.0001]);
        assert!(!ch.is_active(Instant::now()));
    }

    #[test]
    fn test_gain_clamped_to_unit_range() {
        let ch = InputChannel::new("k1", 48_000, 48_000);
        ch.set_gain(1.5);
        assert_eq!(ch.gain(), 1.0);
        ch.set_gain(-0.5);
        assert_eq!(ch.gain(), 0.0);
    }

    #[test]
    fn test_underrun_when_disabled_channel_has_no_data_yields_silence() {
        let ch = InputChannel::new("k1", 48_000, 48_000);
        let mut out = [1.0; 4];
        let mut scratch = [0.0; 0];
        ch.consume(2, &mut out, &mut scratch);
        assert_eq!(out, [0.0; 4]);
    }
}
