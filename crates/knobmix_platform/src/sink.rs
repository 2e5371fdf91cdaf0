//! Seam between Knobmix's software Virtual Endpoints (`knobmix_core`) and a
//! real OS audio server.
//!
//! `knobmix_platform` cannot depend on `knobmix_core` (the dependency runs
//! the other way, for the Device Directory), so the endpoint side of this
//! seam is a plain trait: anything that can accept an interleaved sample
//! buffer implements `SinkSampleSink`. `knobmix_core::VirtualEndpoint`
//! implements it by forwarding to `output_write`.
//!
//! Publishing is optional — a `PluginHost`'s endpoints work as a pure
//! software loopback with no publisher at all. A `SinkPublisher` exists only
//! to make one of those endpoints visible to other applications as a real
//! device.

use std::sync::Arc;

use crate::error::PlatformError;

/// Anything that accepts interleaved audio samples written into it.
pub trait SinkSampleSink: Send + Sync {
    fn write_interleaved(&self, samples: &[f32]) -> usize;
}

/// A live publication of one endpoint to the OS audio server. Dropping this
/// unpublishes it.
pub trait PublishedSink: Send {
    /// The backend's own node/stream identifier, if it has one.
    fn node_id(&self) -> Option<u32>;
}

/// A platform's way of exposing a `SinkSampleSink` as a real audio device.
pub trait SinkPublisher: Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn publish(
        &self,
        name: &str,
        channels: u32,
        sample_rate: u32,
        sink: Arc<dyn SinkSampleSink>,
    ) -> Result<Box<dyn PublishedSink>, PlatformError>;
}
