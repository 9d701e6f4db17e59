use crate::types::*;

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("unsupported config: {0}")]
    UnsupportedConfig(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Capture constraints requested when the microphone is opened.
///
/// Gain control and noise suppression stay off so the RMS of the captured
/// block reflects the true signal level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    pub noise_suppression: bool,
    /// Length of the analysis window returned by `read_time_domain`.
    pub window_frames: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            auto_gain_control: false,
            noise_suppression: false,
            window_frames: 4096,
        }
    }
}

/// A live microphone stream plus its analysis node.
pub trait AudioCaptureStream: Send {
    fn sample_rate_hz(&self) -> u32;

    /// Copy the most recent mono samples into `buf` (oldest first).
    /// Returns how many samples are valid; slots without data are zeroed.
    fn read_time_domain(&mut self, buf: &mut [f32]) -> usize;

    /// Stop the tracks and close the processing context.
    fn close(self: Box<Self>);
}

pub trait AudioCapturePort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<AudioInputDevice>, AudioError>;

    /// Open the given input, or the host default when `device_id` is `None`.
    fn open_input(
        &self,
        device_id: Option<&DeviceId>,
        config: CaptureConfig,
    ) -> Result<Box<dyn AudioCaptureStream>, AudioError>;
}
