//! Virtual Endpoint (component B)
//!
//! One audio-device object with paired output and input streams sharing a
//! single Ring Buffer. Applications write PCM to the output side; the
//! output-write callback forwards it into the Ring. Anything reading the
//! input side (another thread's input-read callback) gets back whatever was
//! most recently written — loopback.
//!
//! Identity and format are fixed at construction per the data model: a
//! stable UID, a human-readable name, 2 channels, 32-bit float packed. The
//! nominal sample rate is the only mutable attribute, negotiated with the
//! host OS after construction.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use knobmix_platform::SinkSampleSink;

use crate::ring_buffer::RingBuffer;

/// Rates this endpoint is willing to advertise to the OS.
pub const SUPPORTED_RATES: &[u32] = &[44_100, 48_000, 88_200, 96_000];

pub const CHANNELS: usize = 2;

/// Seconds of headroom the endpoint's internal ring is sized for, per the
/// "≥2 seconds at the maximum supported rate" requirement in §3.
const RING_SECONDS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("rate {0} Hz is not in this endpoint's supported rate list")]
    UnsupportedRate(u32),
}

/// A single virtual endpoint: stable identity plus one Ring Buffer shared by
/// its output-write and input-read callbacks.
pub struct VirtualEndpoint {
    uid: String,
    name: String,
    bidirectional: bool,
    sample_rate: AtomicU32,
    ring: Arc<RingBuffer>,
    running: std::sync::atomic::AtomicBool,
}

impl VirtualEndpoint {
    /// `uid` should be a reverse-DNS stable identifier per §6 (e.g.
    /// `com.knobmix.panel.k1`). `bidirectional` marks the Voice Chat
    /// endpoint, whose input stream is also surfaced as a microphone.
    pub fn new(uid: impl Into<String>, name: impl Into<String>, bidirectional: bool) -> Self {
        let max_rate = SUPPORTED_RATES.iter().copied().max().unwrap_or(48_000);
        let ring_capacity = max_rate as usize * CHANNELS * RING_SECONDS;
        Self {
            uid: uid.into(),
            name: name.into(),
            bidirectional,
            sample_rate: AtomicU32::new(48_000),
            ring: Arc::new(RingBuffer::new(ring_capacity)),
            running: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// Negotiate a new nominal rate. Every stream's physical format must
    /// stay in lock-step with the device rate; since this endpoint only has
    /// the one Ring Buffer shared by both streams, updating the atomic is
    /// the entire lock-step update. Failing validation leaves the prior
    /// rate untouched and reports the error to the caller (the Plugin
    /// Host), matching §4.B's "failing any format update leaves the device
    /// in its prior rate" contract.
    pub fn set_sample_rate(&self, rate: u32) -> Result<(), EndpointError> {
        if !SUPPORTED_RATES.contains(&rate) {
            return Err(EndpointError::UnsupportedRate(rate));
        }
        self.sample_rate.store(rate, Ordering::Relaxed);
        Ok(())
    }

    pub fn supported_rates(&self) -> &'static [u32] {
        SUPPORTED_RATES
    }

    /// Shared handle to this endpoint's Ring Buffer, used by Input Channels
    /// to drive their consumption side and by the output-write callback to
    /// drive its producer side.
    pub fn ring(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.ring)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Transition to IO-running: zero the Ring and reset counters so no
    /// stale audio from a prior session can be replayed.
    pub fn start_io(&self) {
        self.ring.reset();
        self.running.store(true, Ordering::Relaxed);
    }

    /// Transition out of IO-running: zero the Ring again for the same
    /// reason.
    pub fn stop_io(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.ring.reset();
    }

    /// Output-write callback: the host hands this endpoint a buffer that was
    /// written by an application; forward it into the Ring.
    ///
    /// Real-time safe; called from the endpoint's output IOProc thread.
    pub fn output_write(&self, buffer: &[f32]) -> usize {
        self.ring.write(buffer)
    }

    /// Input-read callback: deliver exactly `dst.len()` samples of whatever
    /// was most recently written, zero-filling any shortfall.
    ///
    /// Real-time safe; called from the endpoint's input IOProc thread,
    /// concurrently with `output_write` on another thread.
    pub fn input_read(&self, dst: &mut [f32]) -> usize {
        self.ring.read(dst)
    }
}

/// Lets a published OS-native sink (`knobmix_platform::SinkPublisher`) feed
/// captured audio straight into this endpoint's Ring, the same way
/// `output_write` does for in-process writers.
impl SinkSampleSink for VirtualEndpoint {
    fn write_interleaved(&self, samples: &[f32]) -> usize {
        self.output_write(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_roundtrip() {
        let ep = VirtualEndpoint::new("com.knobmix.panel.k1", "Panel K1", false);
        ep.start_io();
        ep.output_write(&[0.1, 0.2, 0.3, 0.4]);

        let mut dst = [0.0; 4];
        ep.input_read(&mut dst);
        assert_eq!(dst, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_set_sample_rate_rejects_unsupported() {
        let ep = VirtualEndpoint::new("com.knobmix.panel.k1", "Panel K1", false);
        assert!(ep.set_sample_rate(48_000).is_ok());
        assert_eq!(ep.sample_rate(), 48_000);

        assert!(ep.set_sample_rate(22_050).is_err());
        // prior rate retained
        assert_eq!(ep.sample_rate(), 48_000);
    }

    #[test]
    fn test_stop_io_discards_stale_audio() {
        let ep = VirtualEndpoint::new("com.knobmix.voicechat", "Voice Chat", true);
        ep.start_io();
        ep.output_write(&[1.0, 1.0]);
        ep.stop_io();
        ep.start_io();

        let mut dst = [9.0; 2];
        ep.input_read(&mut dst);
        assert_eq!(dst, [0.0, 0.0]);
    }

    #[test]
    fn test_bidirectional_flag() {
        let voice = VirtualEndpoint::new("com.knobmix.voicechat", "Voice Chat", true);
        let panel = VirtualEndpoint::new("com.knobmix.panel.k1", "Panel K1", false);
        assert!(voice.is_bidirectional());
        assert!(!panel.is_bidirectional());
    }
}
