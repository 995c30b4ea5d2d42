//! Audio capture adapter
//!
//! Runs the cpal input stream on its own thread (cpal streams are not
//! `Send`), converting the device's native format to the wire format:
//! interleaved f32 at the device rate in, mono 8 kHz A-law bytes out. The
//! control loop pumps the adapter through [`CaptureSource`]; captured
//! bytes are handed over in fixed-size fragments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::audio::device::{default_input_device, device_name};
use crate::audio::g711;
use crate::audio::{CaptureEvent, CaptureSource};
use crate::constants::{MAX_PAYLOAD_SIZE, NOMINAL_SAMPLE_RATE};
use crate::error::AudioError;

/// Fixed-ratio linear resampler over a continuous mono stream.
///
/// Carries the fractional read cursor and the last input sample across
/// callback blocks so the output is seamless at block boundaries.
struct Downsampler {
    /// Input samples consumed per output sample
    step: f64,
    cursor: f64,
    pending: Vec<f32>,
}

impl Downsampler {
    fn new(in_rate: f64, out_rate: f64) -> Self {
        Self {
            step: in_rate / out_rate,
            cursor: 0.0,
            pending: Vec::new(),
        }
    }

    /// Append a block of mono samples and emit every A-law output sample
    /// that became computable.
    fn process(&mut self, input: &[f32], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);

        while (self.cursor as usize) + 1 < self.pending.len() {
            let i = self.cursor as usize;
            let frac = (self.cursor - i as f64) as f32;
            let sample = self.pending[i] * (1.0 - frac) + self.pending[i + 1] * frac;
            out.push(g711::encode_f32(sample));
            self.cursor += self.step;
        }

        // Keep the last consumed sample around for interpolation
        let consumed = (self.cursor as usize).min(self.pending.len().saturating_sub(1));
        self.pending.drain(..consumed);
        self.cursor -= consumed as f64;
    }
}

/// cpal-backed capture endpoint
pub struct AudioCapture {
    running: Arc<AtomicBool>,
    ready: Arc<AtomicBool>,
    ready_reported: bool,
    data_rx: Receiver<Vec<u8>>,
    error_rx: Receiver<AudioError>,
    thread_handle: Option<JoinHandle<()>>,
    pending: Vec<u8>,
    fragment_size: usize,
}

impl AudioCapture {
    /// Open the default input device and start capturing. `fragment_size`
    /// is the chunk size handed to the caller, in stream bytes.
    pub fn new(fragment_size: usize) -> Result<Self, AudioError> {
        let (device, supported) = default_input_device()?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} input samples",
                supported.sample_format()
            )));
        }

        let stream_config: cpal::StreamConfig = supported.config();
        let channels = stream_config.channels.max(1) as usize;
        let device_rate = stream_config.sample_rate.0 as f64;

        tracing::info!(
            "capturing from {} at {} Hz, {} channel(s)",
            device_name(&device),
            stream_config.sample_rate.0,
            channels
        );

        let running = Arc::new(AtomicBool::new(true));
        let ready = Arc::new(AtomicBool::new(false));
        let (data_tx, data_rx) = bounded::<Vec<u8>>(256);
        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let running_for_cb = running.clone();
        let running_for_loop = running.clone();
        let ready_for_thread = ready.clone();
        let error_tx_cb = error_tx.clone();

        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let mut downsampler = Downsampler::new(device_rate, NOMINAL_SAMPLE_RATE);
                let mut encoded = Vec::new();

                let stream = device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !running_for_cb.load(Ordering::Relaxed) {
                            return;
                        }

                        // Downmix interleaved frames to mono
                        let mono: Vec<f32> = data
                            .chunks_exact(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                            .collect();

                        encoded.clear();
                        downsampler.process(&mono, &mut encoded);
                        if !encoded.is_empty() {
                            // Dropped on overflow; the stream has no memory
                            let _ = data_tx.try_send(encoded.clone());
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

                        // Keep the stream alive while running
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
            ready_reported: false,
            data_rx,
            error_rx,
            thread_handle: Some(handle),
            pending: Vec::new(),
            fragment_size: fragment_size.clamp(1, MAX_PAYLOAD_SIZE),
        })
    }

    /// Latest stream error from the capture thread, if any
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

impl CaptureSource for AudioCapture {
    fn poll_event(&mut self) -> Option<CaptureEvent> {
        if !self.ready_reported && self.ready.load(Ordering::SeqCst) {
            self.ready_reported = true;
            return Some(CaptureEvent::StreamReady);
        }

        while self.pending.len() < self.fragment_size {
            match self.data_rx.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if self.pending.len() >= self.fragment_size {
            let rest = self.pending.split_off(self.fragment_size);
            let fragment = std::mem::replace(&mut self.pending, rest);
            return Some(CaptureEvent::Data(Bytes::from(fragment)));
        }

        None
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsampler_halves_rate() {
        let mut down = Downsampler::new(16000.0, 8000.0);
        let mut out = Vec::new();
        down.process(&vec![0.0f32; 1000], &mut out);
        // Roughly half the input, allowing for edge handling
        assert!((495..=500).contains(&out.len()), "got {}", out.len());
        assert!(out.iter().all(|&b| b == g711::ALAW_SILENCE));
    }

    #[test]
    fn downsampler_is_seamless_across_blocks() {
        let input: Vec<f32> = (0..2000).map(|i| (i as f32 / 50.0).sin() * 0.5).collect();

        let mut whole = Vec::new();
        Downsampler::new(48000.0, 8000.0).process(&input, &mut whole);

        let mut split = Vec::new();
        let mut down = Downsampler::new(48000.0, 8000.0);
        for block in input.chunks(333) {
            down.process(block, &mut split);
        }

        assert_eq!(whole, split);
    }

    #[test]
    fn downsampler_unity_ratio_tracks_input() {
        let input: Vec<f32> = (0..100).map(|i| (i as f32 / 10.0).sin() * 0.9).collect();
        let mut out = Vec::new();
        Downsampler::new(8000.0, 8000.0).process(&input, &mut out);

        for (sample, byte) in input.iter().zip(&out) {
            let decoded = g711::decode_to_f32(*byte);
            assert!((decoded - sample).abs() < 0.05);
        }
    }
}
