//! Meter/Activity Reporter (component I)
//!
//! Pure read side over the atomics an Input Channel already maintains.
//! Safe to call from any non-real-time thread — a UI poller, a test, a
//! debug CLI command — since every value read here is a single atomic
//! load with no locking and no side effects on the real-time path.

use std::sync::Arc;
use std::time::Instant;

use crate::input_channel::InputChannel;

/// Snapshot of one channel's metering state at the moment of the call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelLevel {
    pub peak: f32,
    pub rms: f32,
}

/// `true` iff `channel`'s last above-threshold sample was less than 500ms
/// ago.
pub fn activity(channel: &InputChannel) -> bool {
    channel.is_active(Instant::now())
}

/// Peak/RMS for every channel in `channels`, in the same order — intended
/// to be called with the primary bus's membership list, per §4.I.
pub fn levels<'a>(channels: impl IntoIterator<Item = &'a Arc<InputChannel>>) -> Vec<(String, ChannelLevel)> {
    channels
        .into_iter()
        .map(|ch| {
            (
                ch.id().to_string(),
                ChannelLevel {
                    peak: ch.peak(),
                    rms: ch.rms(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_reads_through_to_channel() {
        let ch = InputChannel::new("k1", 48_000, 48_000);
        assert!(!activity(&ch));
        ch.ingest(&[0.8, -0.8]);
        assert!(activity(&ch));
    }

    #[test]
    fn test_levels_snapshot_multiple_channels() {
        let a = Arc::new(InputChannel::new("k1", 48_000, 48_000));
        let b = Arc::new(InputChannel::new("k2", 48_000, 48_000));
        a.ingest(&[1.0, -1.0]);
        b.ingest(&[0.25, -0.25]);

        let snapshot = levels([&a, &b]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0, "k1");
        assert_eq!(snapshot[0].1.peak, 1.0);
        assert_eq!(snapshot[1].0, "k2");
        assert_eq!(snapshot[1].1.peak, 0.25);
    }
}
