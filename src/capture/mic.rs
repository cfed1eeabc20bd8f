//! Microphone audio source.
//!
//! Captures i16 PCM from a cpal input device, downmixes to mono by
//! averaging channels, and appends into an in-memory buffer that is
//! finalized into an [`AudioClip`] on stop. The source also publishes a
//! live RMS level that the energy recognizer reads.
//!
//! The cpal stream handle is not `Send`, so a microphone source (and any
//! controller holding one) lives on the thread that started it. The
//! capture pipeline is single-threaded by design; only the detector and
//! recognizer loops run as separate tasks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::clip::{AudioClip, ClipFormat};
use crate::error::CaptureError;

/// Input-processing requests passed along at device acquisition. cpal
/// cannot toggle these on every backend; unsupported flags are logged
/// and ignored rather than failing the session.
#[derive(Debug, Clone, Copy)]
pub struct InputProcessing {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain: bool,
}

impl Default for InputProcessing {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain: true,
        }
    }
}

/// Shared live input level in dBFS, written from the audio callback and
/// read by the energy recognizer. Stored as raw f32 bits in an atomic so
/// the callback never blocks.
#[derive(Clone)]
pub struct LiveLevel {
    bits: Arc<AtomicU32>,
}

impl LiveLevel {
    const FLOOR_DB: f32 = -90.0;

    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(Self::FLOOR_DB.to_bits())),
        }
    }

    pub fn set_db(&self, db: f32) {
        self.bits.store(db.to_bits(), Ordering::Relaxed);
    }

    pub fn db(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.set_db(Self::FLOOR_DB);
    }
}

impl Default for LiveLevel {
    fn default() -> Self {
        Self::new()
    }
}

/// One recording channel: acquire a device, buffer audio, finalize a
/// clip. Implemented by [`MicrophoneSource`] in production and by fakes
/// in tests.
#[async_trait::async_trait(?Send)]
pub trait AudioSource {
    /// Whether a capture device can be acquired in this environment.
    fn is_available(&self) -> bool;

    /// Acquires the device and begins buffering audio.
    async fn start(&mut self) -> Result<(), CaptureError>;

    /// Releases the device and finalizes the buffer into a clip.
    /// Idempotent: when not capturing, returns an empty clip.
    async fn stop(&mut self) -> Result<AudioClip, CaptureError>;

    /// Releases the device and discards all buffered audio.
    fn abort(&mut self);
}

/// cpal-backed microphone source.
pub struct MicrophoneSource {
    /// Device name, numeric index as a string, or "default".
    device_name: String,
    sample_rate: u32,
    format: ClipFormat,
    processing: InputProcessing,
    samples: Arc<Mutex<Vec<i16>>>,
    level: LiveLevel,
    stream: Option<cpal::Stream>,
}

impl MicrophoneSource {
    pub fn new(device_name: String, sample_rate: u32) -> Self {
        Self {
            device_name,
            sample_rate,
            format: ClipFormat::negotiate(),
            processing: InputProcessing::default(),
            samples: Arc::new(Mutex::new(Vec::new())),
            level: LiveLevel::new(),
            stream: None,
        }
    }

    /// Handle for consumers that follow the live input level.
    pub fn level_handle(&self) -> LiveLevel {
        self.level.clone()
    }

    /// Downmixes one callback buffer to mono and appends it. Multi
    /// channel input is averaged per frame.
    fn append_downmixed(data: &[i16], samples: &Arc<Mutex<Vec<i16>>>, channels: usize) {
        let mut buffer = samples.lock().unwrap_or_else(|e| e.into_inner());
        match channels {
            0 => {}
            1 => buffer.extend_from_slice(data),
            n => {
                for frame in data.chunks_exact(n) {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    buffer.push((sum / n as i32) as i16);
                }
            }
        }
    }

    /// RMS level of one callback buffer in dBFS.
    fn rms_dbfs(data: &[i16]) -> f32 {
        if data.is_empty() {
            return -90.0;
        }
        let sum_sq: f64 = data
            .iter()
            .map(|&s| {
                let norm = s as f64 / i16::MAX as f64;
                norm * norm
            })
            .sum();
        let rms = (sum_sq / data.len() as f64).sqrt();
        (20.0 * rms.max(1e-9).log10()) as f32
    }
}

#[async_trait::async_trait(?Send)]
impl AudioSource for MicrophoneSource {
    fn is_available(&self) -> bool {
        suppress_stderr(|| Ok(cpal::default_host().default_input_device().is_some()))
            .unwrap_or(false)
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let device = suppress_stderr(|| {
            let host = cpal::default_host();
            if self.device_name == "default" {
                host.default_input_device().ok_or_else(|| {
                    CaptureError::DeviceUnavailable("no input device available".to_string())
                })
            } else {
                find_device(&host, &self.device_name)
            }
        })?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let config = device.default_input_config().map_err(|e| {
            CaptureError::DeviceUnavailable(format!("{device_name}: {e}"))
        })?;

        let device_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        if device_rate != self.sample_rate {
            tracing::warn!(
                "Requested {}Hz but device uses {}Hz; capturing at device rate",
                self.sample_rate,
                device_rate
            );
        }
        self.sample_rate = device_rate;

        tracing::info!(
            "Capture device: {} ({}Hz, {} channels, echo_cancellation={}, noise_suppression={}, auto_gain={})",
            device_name,
            device_rate,
            channels,
            self.processing.echo_cancellation,
            self.processing.noise_suppression,
            self.processing.auto_gain
        );

        self.samples.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.level.reset();

        let samples = Arc::clone(&self.samples);
        let level = self.level.clone();

        let stream = device
            .build_input_stream(
                &config.into(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    level.set_db(Self::rms_dbfs(data));
                    Self::append_downmixed(data, &samples, channels);
                },
                |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{device_name}: {e}")))?;

        stream
            .play()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{device_name}: {e}")))?;
        self.stream = Some(stream);

        Ok(())
    }

    async fn stop(&mut self) -> Result<AudioClip, CaptureError> {
        if self.stream.take().is_none() {
            return Ok(AudioClip::empty());
        }

        let samples = {
            let mut buffer = self.samples.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *buffer)
        };
        self.level.reset();

        if samples.is_empty() {
            tracing::warn!("Recording stopped with no samples captured");
            return Ok(AudioClip::empty());
        }

        let duration = samples.len() as f32 / self.sample_rate as f32;
        // Negotiation only yields formats with a linked encoder, which
        // today means WAV.
        let clip = AudioClip::from_pcm(&samples, self.sample_rate);
        tracing::info!(
            "Recording finalized: {:.2}s, {} bytes ({})",
            duration,
            clip.len(),
            self.format.mime()
        );

        Ok(clip)
    }

    fn abort(&mut self) {
        self.stream = None;
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.level.reset();
    }
}

/// Finds an input device by numeric index or exact name.
fn find_device(host: &cpal::Host, spec: &str) -> Result<cpal::Device, CaptureError> {
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("device enumeration failed: {e}")))?
        .collect();

    if let Ok(index) = spec.parse::<usize>() {
        return devices.into_iter().nth(index).ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!("device index {index} out of range"))
        });
    }

    devices
        .into_iter()
        .find(|d| d.name().map(|n| n == spec).unwrap_or(false))
        .ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!(
                "input device '{spec}' not found; run 'parla list-devices'"
            ))
        })
}

/// Runs `f` with stderr redirected to /dev/null, hiding ALSA's noisy
/// device-probe warnings on Linux.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_stderr<F, T>(f: F) -> Result<T, CaptureError>
where
    F: FnOnce() -> Result<T, CaptureError>,
{
    use std::fs::OpenOptions;
    use std::os::unix::io::AsRawFd;

    let Ok(dev_null) = OpenOptions::new().write(true).open("/dev/null") else {
        return f();
    };

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return f();
    }
    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_stderr<F, T>(f: F) -> Result<T, CaptureError>
where
    F: FnOnce() -> Result<T, CaptureError>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_passes_mono_through() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        MicrophoneSource::append_downmixed(&[1, 2, 3], &samples, 1);
        assert_eq!(*samples.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn downmix_averages_stereo_frames() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        MicrophoneSource::append_downmixed(&[100, 200, -50, 50], &samples, 2);
        assert_eq!(*samples.lock().unwrap(), vec![150, 0]);
    }

    #[test]
    fn rms_of_silence_hits_the_floor() {
        assert!(MicrophoneSource::rms_dbfs(&[0; 256]) <= -90.0);
    }

    #[test]
    fn rms_of_full_scale_is_near_zero_dbfs() {
        let loud = vec![i16::MAX; 256];
        let db = MicrophoneSource::rms_dbfs(&loud);
        assert!(db > -1.0 && db <= 0.5, "got {db}");
    }

    #[test]
    fn live_level_round_trips() {
        let level = LiveLevel::new();
        level.set_db(-42.5);
        assert_eq!(level.db(), -42.5);
        level.reset();
        assert_eq!(level.db(), -90.0);
    }
}
