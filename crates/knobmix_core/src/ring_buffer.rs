//! Loopback Ring Buffer (component A)
//!
//! A fixed-capacity, single-producer/single-consumer sample ring shared
//! between two real-time threads: the writer is a virtual endpoint's
//! output-write callback, the reader is either the same endpoint's
//! input-read callback (loopback) or a Mixer Input Channel's consumption
//! side. Built on `rtrb`, the same SPSC ring crate used throughout this
//! codebase's audio thread plumbing.
//!
//! Samples are `f32`, matching the endpoint's "32-bit float, packed" wire
//! format — an interleaved byte ring and a sample ring hold the same
//! invariants, and storing `f32` directly avoids a pointless byte<->sample
//! transmutation at every call site.
//!
//! # Invariants
//! - `read` fills any short read with zeroed silence.
//! - `underruns` increments whenever a read asked for more than 0 samples
//!   but had 0 real samples available to deliver.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use rtrb::RingBuffer as Rtrb;
use rtrb::{Consumer, Producer};

/// Lock-free SPSC ring buffer of interleaved `f32` samples, wrapping an
/// `rtrb` producer/consumer pair behind a single shared handle.
///
/// # Safety
/// `write` must only ever be called from the single producer thread;
/// `read` must only ever be called from the single consumer thread. The two
/// may run concurrently on different real-time threads; `rtrb`'s
/// `Producer`/`Consumer` split already guarantees the partition is sound as
/// long as that single-thread-per-side contract is honored, which is also
/// why both halves live behind `UnsafeCell` here rather than behind a lock.
pub struct RingBuffer {
    producer: UnsafeCell<Producer<f32>>,
    consumer: UnsafeCell<Consumer<f32>>,
    capacity: usize,
    underruns: AtomicU64,
}

// SAFETY: see the struct-level contract above.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a ring sized for at least `capacity_samples` (the caller is
    /// responsible for sizing to "≥2s at the max supported rate" for a
    /// Virtual Endpoint, or "≥10s at the input rate" for an Input Channel —
    /// see `virtual_endpoint.rs` / `input_channel.rs`).
    pub fn new(capacity_samples: usize) -> Self {
        let capacity = capacity_samples.max(1);
        let (producer, consumer) = Rtrb::<f32>::new(capacity);
        Self {
            producer: UnsafeCell::new(producer),
            consumer: UnsafeCell::new(consumer),
            capacity,
            underruns: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write up to `src.len()` samples. Writes past available capacity are
    /// silently dropped — the contiguous tail that didn't fit — since the
    /// reader is expected to keep up in steady state.
    ///
    /// Producer-only; real-time safe (no allocation, no blocking).
    pub fn write(&self, src: &[f32]) -> usize {
        // SAFETY: only the single producer thread ever calls `write`.
        let producer = unsafe { &mut *self.producer.get() };
        let n = src.len().min(producer.slots());
        if n == 0 {
            return 0;
        }

        let Ok(mut chunk) = producer.write_chunk_uninit(n) else {
            return 0;
        };
        let (first, second) = chunk.as_mut_slices();
        for (slot, &value) in first.iter_mut().zip(&src[..first.len()]) {
            slot.write(value);
        }
        for (slot, &value) in second.iter_mut().zip(&src[first.len()..n]) {
            slot.write(value);
        }
        // SAFETY: every slot in `first`/`second` up to `n` was just written.
        unsafe { chunk.commit_all() };
        n
    }

    /// Read exactly `dst.len()` samples, zero-filling any tail beyond what
    /// was actually available. Returns the number of real (non-silence)
    /// samples delivered.
    ///
    /// Consumer-only; real-time safe (no allocation, no blocking).
    pub fn read(&self, dst: &mut [f32]) -> usize {
        // SAFETY: only the single consumer thread ever calls `read`.
        let consumer = unsafe { &mut *self.consumer.get() };
        let n = dst.len().min(consumer.slots());

        if n > 0 {
            if let Ok(chunk) = consumer.read_chunk(n) {
                let (first, second) = chunk.as_slices();
                dst[..first.len()].copy_from_slice(first);
                dst[first.len()..n].copy_from_slice(second);
                chunk.commit_all();
            }
        }

        if n < dst.len() {
            for sample in &mut dst[n..] {
                *sample = 0.0;
            }
            if n == 0 && !dst.is_empty() {
                self.underruns.fetch_add(1, Ordering::Relaxed);
            }
        }

        n
    }

    /// Monotonically non-decreasing count of reads that returned 0 real
    /// samples while the reader asked for more than 0.
    pub fn underrun_count(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Drain any samples left in the ring and reset the underrun counter.
    /// Called when a Virtual Endpoint transitions to IO-running or stops,
    /// so a new session never replays stale audio.
    pub fn reset(&self) {
        // SAFETY: called only during IO start/stop, when neither the
        // producer nor the consumer callback is concurrently active.
        let consumer = unsafe { &mut *self.consumer.get() };
        loop {
            let n = consumer.slots();
            if n == 0 {
                break;
            }
            match consumer.read_chunk(n) {
                Ok(chunk) => chunk.commit_all(),
                Err(_) => break,
            }
        }
        self.underruns.store(0, Ordering::Relaxed);
    }
}
