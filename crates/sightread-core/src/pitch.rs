//! Microphone pitch detection.
//!
//! The estimator is the trimmed-autocorrelation scheme: RMS gate, trim both
//! ends of the window at the first sample quieter than `TRIM_THRESHOLD`,
//! unnormalized autocorrelation, first dip then highest peak, and a parabolic
//! refinement of the peak lag.

use parking_lot::Mutex;
use sightread_domain_note::{create_note_from_midi, frequency_to_midi, Note, LIVE_INDEX};
use sightread_ports::audio::{AudioCapturePort, AudioCaptureStream, AudioError, CaptureConfig};
use sightread_ports::types::DeviceId;

pub const FFT_SIZE: usize = 4096;
pub const SILENCE_RMS: f32 = 0.015;
pub const AUTOCORRELATION_MIN_RMS: f32 = 0.01;
pub const TRIM_THRESHOLD: f32 = 0.2;
pub const MIN_FREQUENCY_HZ: f64 = 50.0;
pub const MAX_FREQUENCY_HZ: f64 = 1500.0;

#[derive(Clone, Debug)]
pub struct PitchConfig {
    pub device_id: Option<DeviceId>,
    pub capture: CaptureConfig,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            capture: CaptureConfig {
                window_frames: FFT_SIZE,
                ..CaptureConfig::default()
            },
        }
    }
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Fundamental frequency of `samples`, or `None` when the block is too quiet
/// or has no usable period.
pub fn autocorrelate(samples: &[f32], sample_rate_hz: u32) -> Option<f64> {
    if rms(samples) < AUTOCORRELATION_MIN_RMS {
        return None;
    }

    let (r1, r2) = trim_bounds(samples);
    if r2 <= r1 {
        return None;
    }

    let buf = &samples[r1..r2];
    let size = buf.len();
    let mut c = vec![0.0f64; size];
    for (lag, slot) in c.iter_mut().enumerate() {
        *slot = buf[..size - lag]
            .iter()
            .zip(&buf[lag..])
            .map(|(a, b)| *a as f64 * *b as f64)
            .sum();
    }

    let mut d = 0;
    while d + 1 < size && c[d] > c[d + 1] {
        d += 1;
    }

    let mut max_val = f64::NEG_INFINITY;
    let mut max_pos = None;
    for (i, &value) in c.iter().enumerate().skip(d) {
        if value > max_val {
            max_val = value;
            max_pos = Some(i);
        }
    }
    let t0 = max_pos?;
    if t0 == 0 {
        return None;
    }

    let mut period = t0 as f64;
    if t0 + 1 < size {
        let (x1, x2, x3) = (c[t0 - 1], c[t0], c[t0 + 1]);
        let a = (x1 + x3 - 2.0 * x2) / 2.0;
        let b = (x3 - x1) / 2.0;
        if a != 0.0 {
            period -= b / (2.0 * a);
        }
    }

    let frequency = sample_rate_hz as f64 / period;
    if !frequency.is_finite() || frequency <= MIN_FREQUENCY_HZ || frequency >= MAX_FREQUENCY_HZ {
        return None;
    }
    Some(frequency)
}

/// Window kept for the autocorrelation: each end is cut at the first sample
/// quieter than `TRIM_THRESHOLD`, scanning at most the outer half (rounded up).
fn trim_bounds(samples: &[f32]) -> (usize, usize) {
    let size = samples.len();
    let half = size.div_ceil(2);
    let r1 = (0..half)
        .find(|&i| samples[i].abs() < TRIM_THRESHOLD)
        .unwrap_or(0);
    let r2 = (1..half)
        .find(|&i| samples[size - i].abs() < TRIM_THRESHOLD)
        .map_or(size.saturating_sub(1), |i| size - i);
    (r1, r2)
}

/// Pure detection over one block: silence gate, estimator, note conversion.
pub fn detect_pitch(samples: &[f32], sample_rate_hz: u32) -> Option<Note> {
    if rms(samples) < SILENCE_RMS {
        return None;
    }
    let frequency = autocorrelate(samples, sample_rate_hz)?;
    let midi = u8::try_from(frequency_to_midi(frequency)).ok().filter(|m| *m <= 127)?;
    Some(create_note_from_midi(midi, LIVE_INDEX, None))
}

struct AudioSession {
    stream: Box<dyn AudioCaptureStream>,
    buffer: Vec<f32>,
}

/// Owns at most one live microphone session.
pub struct PitchDetector {
    port: Box<dyn AudioCapturePort>,
    config: PitchConfig,
    session: Mutex<Option<AudioSession>>,
}

impl PitchDetector {
    pub fn new(port: Box<dyn AudioCapturePort>, config: PitchConfig) -> Self {
        Self {
            port,
            config,
            session: Mutex::new(None),
        }
    }

    pub fn is_started(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Open the microphone. A second call while running is a no-op.
    pub fn start(&self) -> Result<(), AudioError> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Ok(());
        }

        let stream = self
            .port
            .open_input(self.config.device_id.as_ref(), self.config.capture)
            .map_err(|err| {
                log::error!("pitch detector: microphone start failed: {err}");
                err
            })?;
        log::info!(
            "pitch detector: microphone open at {} Hz",
            stream.sample_rate_hz()
        );
        *session = Some(AudioSession {
            stream,
            buffer: vec![0.0; self.config.capture.window_frames],
        });
        Ok(())
    }

    /// Release the microphone. Safe when never started.
    pub fn stop(&self) {
        if let Some(session) = self.session.lock().take() {
            session.stream.close();
            log::info!("pitch detector: microphone closed");
        }
    }

    /// Note in the latest sample block, or `None` for silence, no clear
    /// period, or no running session.
    pub fn get_pitch(&self) -> Option<Note> {
        let mut guard = self.session.lock();
        let session = guard.as_mut()?;
        let AudioSession { stream, buffer } = session;
        let valid = stream.read_time_domain(buffer);
        if valid == 0 {
            return None;
        }
        detect_pitch(buffer, stream.sample_rate_hz())
    }
}

impl Drop for PitchDetector {
    fn drop(&mut self) {
        self.stop();
    }
}
