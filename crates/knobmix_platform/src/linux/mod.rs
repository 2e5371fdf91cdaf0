//! Linux Sink Publisher — PipeWire
//!
//! Publishing a Virtual Endpoint on Linux creates one `Audio/Sink` PipeWire
//! stream: other applications see it in their output-device list and play
//! to it like any other sink, and every buffer PipeWire hands us gets
//! forwarded straight into the endpoint via `SinkSampleSink`. There is no
//! separate playback stream — Knobmix's own Bus render callback is what
//! drains the endpoint, so the loopback's "other half" already exists on
//! the `knobmix_core` side.
//!
//! PipeWire objects are not `Send`, so the stream lives on one dedicated
//! thread per published sink. `PublishedSink::drop` signals that thread to
//! disconnect and join.

use crate::error::PlatformError;
use crate::sink::{PublishedSink, SinkPublisher, SinkSampleSink};

#[cfg(feature = "pipewire")]
mod pipewire_backend {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;

    use pipewire as pw;
    use pw::properties::properties;

    use super::{PlatformError, PublishedSink, SinkPublisher, SinkSampleSink};

    const NUM_CHANNELS: usize = 2;

    struct CaptureUserData {
        sink: Arc<dyn SinkSampleSink>,
    }

    fn process_callback(stream: &pw::stream::Stream, user_data: &mut CaptureUserData) {
        let Some(mut buffer) = stream.dequeue_buffer() else {
            return;
        };
        let datas = buffer.datas_mut();
        if datas.is_empty() {
            return;
        }
        let data = &mut datas[0];
        let chunk = data.chunk();
        let n_frames = chunk.size() as usize / (NUM_CHANNELS * std::mem::size_of::<f32>());
        if n_frames == 0 {
            return;
        }
        let Some(raw) = data.data() else { return };
        let samples: &[f32] = unsafe {
            std::slice::from_raw_parts(raw.as_ptr() as *const f32, n_frames * NUM_CHANNELS)
        };
        user_data.sink.write_interleaved(samples);
    }

    /// One published sink: a single capture stream plus the thread that
    /// owns PipeWire's non-`Send` main loop.
    pub struct PipewirePublishedSink {
        node_id: Arc<AtomicU32>,
        shutdown: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl PublishedSink for PipewirePublishedSink {
        fn node_id(&self) -> Option<u32> {
            let id = self.node_id.load(Ordering::Relaxed);
            if id == u32::MAX {
                None
            } else {
                Some(id)
            }
        }
    }

    impl Drop for PipewirePublishedSink {
        fn drop(&mut self) {
            self.shutdown.store(true, Ordering::SeqCst);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    pub struct PipewirePublisher;

    impl PipewirePublisher {
        pub fn new() -> Result<Self, PlatformError> {
            pw::init();
            Ok(Self)
        }
    }

    impl SinkPublisher for PipewirePublisher {
        fn backend_name(&self) -> &'static str {
            "PipeWire"
        }

        fn publish(
            &self,
            name: &str,
            channels: u32,
            sample_rate: u32,
            sink: Arc<dyn SinkSampleSink>,
        ) -> Result<Box<dyn PublishedSink>, PlatformError> {
            let stream_name = format!("knobmix.{name}");
            let node_id = Arc::new(AtomicU32::new(u32::MAX));
            let shutdown = Arc::new(AtomicBool::new(false));
            let ready = Arc::new((Mutex::new(false), std::sync::Condvar::new()));

            let thread_node_id = Arc::clone(&node_id);
            let thread_shutdown = Arc::clone(&shutdown);
            let thread_ready = Arc::clone(&ready);
            let thread_name = stream_name.clone();
            let channels = channels.max(1);

            let handle = std::thread::Builder::new()
                .name(format!("pw-sink-{name}"))
                .spawn(move || {
                    let result = (|| -> Result<(), pw::Error> {
                        let mainloop = pw::main_loop::MainLoop::new(None)?;
                        let context = pw::context::Context::new(&mainloop)?;
                        let core = context.connect(None)?;

                        let stream = pw::stream::Stream::new(
                            &core,
                            &thread_name,
                            properties! {
                                "media.type" => "Audio",
                                "media.class" => "Audio/Sink",
                                "node.name" => thread_name.clone(),
                                "audio.channels" => channels.to_string(),
                                "audio.rate" => sample_rate.to_string(),
                            },
                        )?;

                        let user_data = CaptureUserData { sink: Arc::clone(&sink) };
                        let _listener = stream
                            .add_local_listener_with_user_data(user_data)
                            .process(process_callback)
                            .register()?;

                        stream.connect(
                            libspa::utils::Direction::Input,
                            None,
                            pw::stream::StreamFlags::MAP_BUFFERS | pw::stream::StreamFlags::RT_PROCESS,
                            &mut [],
                        )?;

                        thread_node_id.store(stream.node_id(), Ordering::Relaxed);
                        {
                            let (lock, cvar) = &*thread_ready;
                            *lock.lock().unwrap() = true;
                            cvar.notify_all();
                        }

                        while !thread_shutdown.load(Ordering::Relaxed) {
                            mainloop.loop_().iterate(std::time::Duration::from_millis(100));
                        }
                        Ok(())
                    })();

                    if let Err(e) = result {
                        tracing::error!(error = %e, "pipewire sink thread exiting on error");
                    }
                })
                .map_err(|e| PlatformError::InitializationFailed(e.to_string()))?;

            let (lock, cvar) = &*ready;
            let mut started = lock.lock().unwrap();
            while !*started {
                let (guard, timeout) = cvar
                    .wait_timeout(started, std::time::Duration::from_secs(2))
                    .unwrap();
                started = guard;
                if timeout.timed_out() {
                    break;
                }
            }

            Ok(Box::new(PipewirePublishedSink {
                node_id,
                shutdown,
                handle: Some(handle),
            }))
        }
    }
}

#[cfg(feature = "pipewire")]
pub use pipewire_backend::PipewirePublisher;

/// Used when the crate is built without the `pipewire` feature: honest
/// about not being able to publish anything, but still satisfies
/// `get_publisher()`'s contract of always returning a backend.
pub struct StubPublisher;

impl SinkPublisher for StubPublisher {
    fn backend_name(&self) -> &'static str {
        "Linux Stub (pipewire feature disabled)"
    }

    fn publish(
        &self,
        _name: &str,
        _channels: u32,
        _sample_rate: u32,
        _sink: std::sync::Arc<dyn SinkSampleSink>,
    ) -> Result<Box<dyn PublishedSink>, PlatformError> {
        Err(PlatformError::FeatureNotAvailable(
            "pipewire feature not enabled".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(feature = "pipewire"))]
    fn test_stub_publisher_refuses() {
        let publisher = StubPublisher;
        struct NullSink;
        impl SinkSampleSink for NullSink {
            fn write_interleaved(&self, samples: &[f32]) -> usize {
                samples.len()
            }
        }
        let err = publisher.publish("k1", 2, 48_000, std::sync::Arc::new(NullSink));
        assert!(err.is_err());
    }
}
