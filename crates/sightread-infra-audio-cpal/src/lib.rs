use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat, StreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};
use sightread_ports::audio::{AudioCapturePort, AudioCaptureStream, AudioError, CaptureConfig};
use sightread_ports::types::{AudioInputDevice, DeviceId};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread;

pub struct CpalAudioCapturePort {
    host: cpal::Host,
}

struct OpenedStream {
    sample_rate_hz: u32,
    consumer: Consumer<f32>,
}

impl CpalAudioCapturePort {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn with_host(host: cpal::Host) -> Self {
        Self { host }
    }

    fn list_devices_from_host(
        host: &cpal::Host,
    ) -> Result<Vec<(DeviceId, cpal::Device)>, AudioError> {
        let host_id = format!("{:?}", host.id());
        let devices = host
            .input_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let mut list = Vec::new();
        for (index, device) in devices.enumerate() {
            let name = device.name().unwrap_or_else(|_| "Unknown Input".to_string());
            let id = DeviceId(format!("cpal:{}:{}:{}", host_id, index, name));
            list.push((id, device));
        }

        Ok(list)
    }

    fn find_device(
        host: &cpal::Host,
        device_id: Option<&DeviceId>,
    ) -> Result<cpal::Device, AudioError> {
        match device_id {
            Some(device_id) => Self::list_devices_from_host(host)?
                .into_iter()
                .find(|(id, _)| id == device_id)
                .map(|(_, device)| device)
                .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string())),
            None => host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default input".to_string())),
        }
    }
}

impl Default for CpalAudioCapturePort {
    fn default() -> Self {
        Self::new()
    }
}

/// Live capture. Samples cross from the cpal thread through an SPSC queue and
/// are folded into a rolling analysis window on read.
pub struct CpalAudioCaptureStream {
    sample_rate_hz: u32,
    consumer: Consumer<f32>,
    window: VecDeque<f32>,
    window_frames: usize,
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl AudioCaptureStream for CpalAudioCaptureStream {
    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn read_time_domain(&mut self, buf: &mut [f32]) -> usize {
        let available = self.consumer.slots();
        if available > 0 {
            if let Ok(chunk) = self.consumer.read_chunk(available) {
                for sample in chunk {
                    if self.window.len() == self.window_frames {
                        self.window.pop_front();
                    }
                    self.window.push_back(sample);
                }
            }
        }

        let valid = self.window.len().min(buf.len());
        let pad = buf.len() - valid;
        buf[..pad].fill(0.0);
        let skip = self.window.len() - valid;
        for (slot, sample) in buf[pad..].iter_mut().zip(self.window.iter().skip(skip)) {
            *slot = *sample;
        }
        valid
    }

    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl AudioCapturePort for CpalAudioCapturePort {
    fn list_inputs(&self) -> Result<Vec<AudioInputDevice>, AudioError> {
        let devices = Self::list_devices_from_host(&self.host)?;
        let mut results = Vec::new();

        for (id, device) in devices {
            let name = device.name().unwrap_or_else(|_| "Unknown Input".to_string());
            let default_config = match device.default_input_config() {
                Ok(config) => config,
                Err(_) => continue,
            };

            results.push(AudioInputDevice {
                id,
                name,
                default_sample_rate_hz: default_config.sample_rate().0,
            });
        }

        Ok(results)
    }

    fn open_input(
        &self,
        device_id: Option<&DeviceId>,
        config: CaptureConfig,
    ) -> Result<Box<dyn AudioCaptureStream>, AudioError> {
        if config.echo_cancellation {
            log::debug!("cpal: echo cancellation is not available, capturing raw input");
        }

        let device_id = device_id.cloned();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel();

        // cpal streams are not Send, so the stream lives and dies on its own thread
        let join_handle = thread::spawn(move || {
            let host = cpal::default_host();
            let device = match Self::find_device(&host, device_id.as_ref()) {
                Ok(device) => device,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            let supported = match device.default_input_config() {
                Ok(supported) => supported,
                Err(err) => {
                    let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(err.to_string())));
                    return;
                }
            };
            let sample_format = supported.sample_format();
            let stream_config: StreamConfig = supported.config();
            let sample_rate_hz = stream_config.sample_rate.0;
            let channels = stream_config.channels as usize;

            let (producer, consumer) = RingBuffer::new(sample_rate_hz as usize);

            let stream = match build_capture_stream(
                &device,
                &stream_config,
                sample_format,
                channels,
                producer,
            ) {
                Ok(stream) => stream,
                Err(BuildStreamError::DeviceNotAvailable) => {
                    let _ = ready_tx.send(Err(AudioError::PermissionDenied));
                    return;
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(OpenedStream {
                sample_rate_hz,
                consumer,
            }));
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))?
        {
            Ok(opened) => Ok(Box::new(CpalAudioCaptureStream {
                sample_rate_hz: opened.sample_rate_hz,
                consumer: opened.consumer,
                window: VecDeque::with_capacity(config.window_frames),
                window_frames: config.window_frames,
                stop_tx,
                join_handle: Some(join_handle),
            })),
            Err(err) => Err(err),
        }
    }
}

fn build_capture_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    channels: usize,
    mut producer: Producer<f32>,
) -> Result<cpal::Stream, BuildStreamError> {
    let error_callback = |err| log::error!("cpal input stream error: {}", err);

    match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, |s| s);
            },
            error_callback,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, i16_to_f32);
            },
            error_callback,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _info: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, u16_to_f32);
            },
            error_callback,
            None,
        ),
        _ => Err(BuildStreamError::StreamConfigNotSupported),
    }
}

/// Average interleaved frames down to mono. Samples that do not fit are dropped.
fn push_mono<T: Copy>(
    producer: &mut Producer<f32>,
    data: &[T],
    channels: usize,
    convert: impl Fn(T) -> f32,
) {
    if channels == 0 {
        return;
    }
    for frame in data.chunks(channels) {
        let sum: f32 = frame.iter().map(|s| convert(*s)).sum();
        if producer.push(sum / frame.len() as f32).is_err() {
            break;
        }
    }
}

fn i16_to_f32(value: i16) -> f32 {
    value as f32 / i16::MAX as f32
}

fn u16_to_f32(value: u16) -> f32 {
    (value as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_mono_averages_channels() {
        let (mut producer, mut consumer) = RingBuffer::new(8);
        push_mono(&mut producer, &[0.2f32, 0.4, -1.0, 1.0], 2, |s| s);
        assert!((consumer.pop().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(consumer.pop().unwrap(), 0.0);
        assert!(consumer.pop().is_err());
    }

    #[test]
    fn integer_formats_map_to_unit_range() {
        assert_eq!(i16_to_f32(i16::MAX), 1.0);
        assert_eq!(i16_to_f32(0), 0.0);
        assert_eq!(u16_to_f32(0), -1.0);
        assert_eq!(u16_to_f32(u16::MAX), 1.0);
    }
}
