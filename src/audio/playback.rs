//! Audio playback adapter
//!
//! Mirrors the capture adapter: the cpal output stream runs on its own
//! thread, pulling A-law stream bytes out of a lock-free ring and playing
//! them at a continuously variable rate. The rate requested through
//! [`PlaybackSink::request_rate`] takes effect on the next callback block;
//! the callback linearly interpolates between adjacent stream samples, so
//! a rate nudge of a few hertz is inaudible while still draining the ring
//! faster or slower.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver};
use ringbuf::{HeapProducer, HeapRb};
use tracing::debug;

use crate::audio::device::{default_output_device, device_name};
use crate::audio::g711;
use crate::audio::PlaybackSink;
use crate::error::AudioError;

/// cpal-backed playback endpoint
pub struct AudioPlayback {
    running: Arc<AtomicBool>,
    ready: Arc<AtomicBool>,
    corked: Arc<AtomicBool>,
    rate: Arc<AtomicU32>,
    producer: HeapProducer<u8>,
    error_rx: Receiver<AudioError>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioPlayback {
    /// Open the default output device. `ring_capacity` is the stream-byte
    /// buffer between the control loop and the device callback; its free
    /// space is what `writable_bytes` reports, so it also sets how much
    /// the drain loop is asked for per tick.
    pub fn new(ring_capacity: usize, nominal_rate: u32) -> Result<Self, AudioError> {
        let (device, supported) = default_output_device()?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} output samples",
                supported.sample_format()
            )));
        }

        let stream_config: cpal::StreamConfig = supported.config();
        let channels = stream_config.channels.max(1) as usize;
        let device_rate = stream_config.sample_rate.0 as f64;

        tracing::info!(
            "playing to {} at {} Hz, {} channel(s)",
            device_name(&device),
            stream_config.sample_rate.0,
            channels
        );

        let running = Arc::new(AtomicBool::new(true));
        let ready = Arc::new(AtomicBool::new(false));
        // Streams start corked; the drain loop uncorks on first write
        let corked = Arc::new(AtomicBool::new(true));
        let rate = Arc::new(AtomicU32::new(nominal_rate));
        let (producer, mut consumer) = HeapRb::<u8>::new(ring_capacity.max(1)).split();
        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let running_for_cb = running.clone();
        let running_for_loop = running.clone();
        let ready_for_thread = ready.clone();
        let corked_for_cb = corked.clone();
        let rate_for_cb = rate.clone();
        let error_tx_cb = error_tx.clone();

        let handle = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                // Interpolation state carried across callback blocks
                let mut phase = 0.0f64;
                let mut prev = 0.0f32;
                let mut next = 0.0f32;

                let stream = device.build_output_stream(
                    &stream_config,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let silent = corked_for_cb.load(Ordering::Relaxed)
                            || !running_for_cb.load(Ordering::Relaxed);
                        let step = rate_for_cb.load(Ordering::Relaxed) as f64 / device_rate;

                        for frame in out.chunks_mut(channels) {
                            let sample = if silent {
                                0.0
                            } else {
                                phase += step;
                                while phase >= 1.0 {
                                    phase -= 1.0;
                                    prev = next;
                                    // Underrun plays out as silence
                                    next = consumer.pop().map(g711::decode_to_f32).unwrap_or(0.0);
                                }
                                prev + (next - prev) * phase as f32
                            };
                            frame.fill(sample);
                        }
                    },
                    move |err| {
                        let _ = error_tx_cb.try_send(AudioError::StreamError(err.to_string()));
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            let _ = error_tx.try_send(AudioError::StreamError(e.to_string()));
                            return;
                        }
                        ready_for_thread.store(true, Ordering::SeqCst);

                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        let _ = error_tx.try_send(AudioError::StreamError(e.to_string()));
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self {
            running,
            ready,
            corked,
            rate,
            producer,
            error_rx,
            thread_handle: Some(handle),
        })
    }

    /// Latest stream error from the playback thread, if any
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl PlaybackSink for AudioPlayback {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn writable_bytes(&self) -> usize {
        self.producer.free_len()
    }

    fn is_corked(&self) -> bool {
        self.corked.load(Ordering::Relaxed)
    }

    fn uncork(&mut self) {
        debug!("uncorking playback stream");
        self.corked.store(false, Ordering::Relaxed);
    }

    fn write(&mut self, data: &[u8]) -> Result<(), AudioError> {
        let pushed = self.producer.push_slice(data);
        if pushed < data.len() {
            // Only possible if the caller ignored writable_bytes()
            return Err(AudioError::WriteFailed(format!(
                "ring accepted {} of {} bytes",
                pushed,
                data.len()
            )));
        }
        Ok(())
    }

    fn request_rate(&mut self, rate: u32) {
        if !self.is_ready() {
            debug!("stream is not ready yet, skipping rate change");
            return;
        }
        self.rate.store(rate, Ordering::Relaxed);
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}
