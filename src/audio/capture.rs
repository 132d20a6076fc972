//! Microphone capture through CPAL with a lock-free ring buffer.
//!
//! The input stream runs for the lifetime of the process but stays paused
//! until a toggle starts a recording. Samples land in a heap ring buffer
//! sized for the longest supported take and are drained, downmixed and
//! resampled on stop.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::{WavSpec, WavWriter};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapRb,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Longest take the ring buffer can hold before samples are dropped.
const MAX_RECORDING_SECS: usize = 120;

/// Stream lifecycle seam, mockable in tests.
trait StreamControl {
    /// Resume the stream, activating the microphone.
    fn play(&self) -> Result<()>;
    /// Pause the stream, deactivating the microphone.
    fn pause(&self) -> Result<()>;
}

struct CpalStreamControl {
    stream: cpal::Stream,
}

impl StreamControl for CpalStreamControl {
    fn play(&self) -> Result<()> {
        self.stream.play().context("failed to resume audio stream")
    }

    fn pause(&self) -> Result<()> {
        self.stream.pause().context("failed to pause audio stream")
    }
}

/// Owner of the input stream and the ring buffer consumer.
pub struct AudioCapture {
    // None only in tests; dropping the control tears the stream down.
    stream_control: Option<Box<dyn StreamControl>>,
    ring_buffer_consumer: HeapCons<f32>,
    is_recording: Arc<AtomicBool>,
    device_sample_rate: u32,
    device_channels: u16,
    target_sample_rate: u32,
}

impl AudioCapture {
    /// Open the default input device and build a paused stream.
    ///
    /// # Errors
    ///
    /// Returns an error if no input device is available or the stream
    /// cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        info!("initializing audio capture");

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("no input device available")?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_owned());
        info!(device = %device_name, "using input device");

        let supported_config = device
            .default_input_config()
            .context("failed to get default input config")?;

        let device_sample_rate = supported_config.sample_rate();
        let device_channels = supported_config.channels();
        info!(
            rate = device_sample_rate,
            channels = device_channels,
            "device config"
        );

        // Sized so the longest take fits without dropping samples.
        let ring_buffer_capacity =
            (device_sample_rate as usize) * usize::from(device_channels) * MAX_RECORDING_SECS;
        let ring_buffer = HeapRb::<f32>::new(ring_buffer_capacity);
        let (mut producer, ring_buffer_consumer) = ring_buffer.split();

        let is_recording = Arc::new(AtomicBool::new(false));
        let recording_flag = Arc::clone(&is_recording);

        let stream_config = supported_config.into();
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if recording_flag.load(Ordering::Relaxed) {
                        let pushed = producer.push_slice(data);
                        if pushed < data.len() {
                            warn!(dropped = data.len() - pushed, "ring buffer full");
                        }
                    }
                },
                move |error| {
                    warn!(%error, "audio stream error");
                },
                None,
            )
            .context("failed to build input stream")?;

        let stream_control = CpalStreamControl { stream };

        // Mic stays inactive until the first toggle.
        stream_control.play()?;
        stream_control.pause()?;
        info!("audio stream initialized (paused)");

        Ok(Self {
            stream_control: Some(Box::new(stream_control)),
            ring_buffer_consumer,
            is_recording,
            device_sample_rate,
            device_channels,
            target_sample_rate: config.sample_rate,
        })
    }

    /// Clear stale samples and activate the microphone.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream refuses to resume.
    pub fn start_recording(&mut self) -> Result<()> {
        let _span = tracing::debug_span!("start_recording").entered();
        let start = std::time::Instant::now();

        self.ring_buffer_consumer.clear();

        // Flag flips before the stream resumes so no callback races it.
        self.is_recording.store(true, Ordering::Relaxed);

        if let Some(stream_control) = &self.stream_control {
            stream_control.play()?;
        }

        info!(latency_us = start.elapsed().as_micros(), "recording started");
        Ok(())
    }

    /// Deactivate the microphone and return the take as mono samples at
    /// the configured target rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream refuses to pause.
    pub fn stop_recording(&mut self) -> Result<Vec<f32>> {
        let _span = tracing::debug_span!("stop_recording").entered();

        self.is_recording.store(false, Ordering::Relaxed);

        if let Some(stream_control) = &self.stream_control {
            stream_control.pause()?;
        }

        let mut samples = Vec::new();
        while let Some(sample) = self.ring_buffer_consumer.try_pop() {
            samples.push(sample);
        }
        debug!(samples = samples.len(), "ring buffer drained");

        let mono = downmix(&samples, self.device_channels);
        let converted = resample_linear(&mono, self.device_sample_rate, self.target_sample_rate);
        info!(
            captured = samples.len(),
            converted = converted.len(),
            rate = self.target_sample_rate,
            "recording stopped"
        );
        Ok(converted)
    }
}

/// Average interleaved frames down to one channel.
#[must_use]
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels_f64 = f64::from(channels);
    samples
        .chunks(usize::from(channels))
        .map(|frame| {
            let sum: f64 = frame.iter().map(|&s| f64::from(s)).sum();
            // f64 -> f32: samples are stored as f32, precision sufficient
            #[allow(clippy::cast_possible_truncation)]
            {
                (sum / channels_f64) as f32
            }
        })
        .collect()
}

/// Linear-interpolation resampling between arbitrary rates.
///
/// Good enough for speech headed into a recognizer. Returns the input
/// unchanged when the rates already match.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)] // Fractional index math needs f64 <-> usize conversions
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = ((samples.len() as f64) / ratio).ceil() as usize;
    let last = samples.len() - 1;

    let mut resampled = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let src = (i as f64) * ratio;
        let lo = (src.floor() as usize).min(last);
        let hi = (lo + 1).min(last);
        let fract = src - src.floor();
        let s1 = f64::from(samples[lo]);
        let s2 = f64::from(samples[hi]);
        resampled.push(s1.mul_add(1.0 - fract, s2 * fract) as f32);
    }

    debug!(
        from_rate,
        to_rate,
        input = samples.len(),
        output = resampled.len(),
        "resampled"
    );
    resampled
}

/// Write mono samples as a 16-bit PCM WAV, the format whisper.cpp reads.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_wav(samples: &[f32], sample_rate: u32, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).context("failed to create WAV file")?;
    for &sample in samples {
        // Clamp keeps the i16 cast in range
        #[allow(clippy::cast_possible_truncation)]
        let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(quantized)
            .context("failed to write sample")?;
    }
    writer.finalize().context("failed to finalize WAV file")?;

    debug!(path = %path.display(), samples = samples.len(), "wrote recording");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::float_cmp)] // Test assertions with known exact values
mod tests {
    use super::*;

    struct MockStreamControl {
        played: Arc<AtomicBool>,
        paused: Arc<AtomicBool>,
    }

    impl StreamControl for MockStreamControl {
        fn play(&self) -> Result<()> {
            self.played.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn pause(&self) -> Result<()> {
            self.paused.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn capture_without_device(sample_rate: u32, channels: u16) -> AudioCapture {
        AudioCapture {
            stream_control: None,
            ring_buffer_consumer: HeapRb::<f32>::new(1024).split().1,
            is_recording: Arc::new(AtomicBool::new(false)),
            device_sample_rate: sample_rate,
            device_channels: channels,
            target_sample_rate: 16_000,
        }
    }

    #[test]
    fn downmix_averages_stereo_frames() {
        let stereo = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mono = downmix(&stereo, 2);
        assert_eq!(mono, vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn downmix_passes_mono_through() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(downmix(&samples, 1), samples);
    }

    #[test]
    fn downmix_averages_four_channels() {
        let frames = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(downmix(&frames, 4), vec![2.5, 6.5]);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn resample_empty_input_is_empty() {
        assert!(resample_linear(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn downsampling_halves_and_thirds_sample_counts() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let third = resample_linear(&samples, 48_000, 16_000);
        assert_eq!(third.len(), 3);

        let samples = vec![0.0; 20];
        let half = resample_linear(&samples, 32_000, 16_000);
        assert_eq!(half.len(), 10);
    }

    #[test]
    fn upsampling_doubles_sample_count() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        let doubled = resample_linear(&samples, 8_000, 16_000);
        assert_eq!(doubled.len(), 8);
        for &sample in &doubled {
            assert!((1.0..=4.0).contains(&sample));
        }
    }

    #[test]
    fn resampling_preserves_bounds() {
        let samples = vec![-1.0, -0.5, 0.0, 0.5, 1.0];
        for &sample in &resample_linear(&samples, 22_050, 16_000) {
            assert!((-1.0..=1.0).contains(&sample));
        }
    }

    #[test]
    fn resampling_to_nonstandard_target_rate() {
        let samples = vec![0.0; 441];
        let converted = resample_linear(&samples, 44_100, 8_000);
        assert_eq!(converted.len(), 80);
    }

    #[test]
    fn wav_spec_is_16bit_pcm_mono() {
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let path = std::env::temp_dir().join("vt_capture_spec.wav");
        let _ = std::fs::remove_file(&path);

        write_wav(&samples, 22_050, &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(reader.len() as usize, samples.len());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn wav_samples_are_clamped() {
        let samples = vec![2.0, -2.0, 0.0];
        let path = std::env::temp_dir().join("vt_capture_clamp.wav");
        let _ = std::fs::remove_file(&path);

        write_wav(&samples, 16_000, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![i16::MAX, -i16::MAX, 0]);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn wav_accepts_empty_recording() {
        let path = std::env::temp_dir().join("vt_capture_empty.wav");
        let _ = std::fs::remove_file(&path);

        write_wav(&[], 16_000, &path).unwrap();
        assert!(path.exists());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn start_and_stop_drive_the_stream_seam() {
        let played = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));
        let mock = MockStreamControl {
            played: Arc::clone(&played),
            paused: Arc::clone(&paused),
        };

        let mut capture = capture_without_device(16_000, 1);
        capture.stream_control = Some(Box::new(mock));

        capture.start_recording().unwrap();
        assert!(played.load(Ordering::Relaxed));
        assert!(capture.is_recording.load(Ordering::Relaxed));

        let samples = capture.stop_recording().unwrap();
        assert!(paused.load(Ordering::Relaxed));
        assert!(!capture.is_recording.load(Ordering::Relaxed));
        assert!(samples.is_empty());
    }

    #[test]
    fn stop_converts_buffered_stereo_to_target_rate() {
        let mut capture = capture_without_device(32_000, 2);

        let ring_buffer = HeapRb::<f32>::new(1024);
        let (mut producer, consumer) = ring_buffer.split();
        // 20 stereo frames downmix to 20 mono samples, halved to 10 at 16 kHz.
        producer.push_slice(&[0.5; 40]);
        capture.ring_buffer_consumer = consumer;

        let samples = capture.stop_recording().unwrap();
        assert_eq!(samples.len(), 10);
        for &sample in &samples {
            assert!((sample - 0.5).abs() < 1e-6);
        }
    }

    // Integration tests (require audio hardware, run with: cargo test -- --ignored)

    #[test]
    #[ignore = "requires audio hardware"]
    fn capture_initializes_on_default_device() {
        let capture = AudioCapture::new(&Config::default()).unwrap();
        assert!(capture.device_sample_rate > 0);
        assert!(capture.device_channels > 0);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn multiple_recording_cycles() {
        let mut capture = AudioCapture::new(&Config::default()).unwrap();
        for _ in 0..3 {
            capture.start_recording().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(50));
            let _samples = capture.stop_recording().unwrap();
        }
    }
}
