// Layered audio decoding with an explicit fallback chain
//
// Uploads arrive in whatever container the observer's phone produced, and a
// fair share of them are malformed. Decoding therefore runs as an ordered
// chain of strategies, each tried only if the previous one failed:
//
//   1. native   - symphonia probe + packet decode (MP3, M4A, FLAC, OGG, WAV)
//   2. raw-wav  - direct linear-PCM header parse via hound
//   3. ffmpeg   - external transcode to 16kHz mono s16 WAV, then strategy 2
//
// Whichever strategy succeeds, the result is normalized to the canonical
// form the speech model expects: mono, 16kHz, f32 samples in [-1, 1].

use anyhow::{anyhow, Result};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::AudioAsset;
use crate::config::AudioConfig;
use crate::error::PipelineError;

/// Sample rate the speech model expects
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// How often the transcode subprocess is polled for exit
const SUBPROCESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Canonical decoded audio: mono, 16kHz, f32 samples in [-1, 1]
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Interleaved output of a single decode strategy, before normalization
#[derive(Debug)]
pub struct RawAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

type Strategy = fn(&AudioDecoder, &AudioAsset) -> Result<RawAudio, String>;

/// Ordered fallback chain; first success wins
const STRATEGIES: [(&str, Strategy); 3] = [
    ("native", AudioDecoder::decode_native),
    ("raw-wav", AudioDecoder::decode_raw_wav),
    ("ffmpeg", AudioDecoder::decode_via_ffmpeg),
];

pub struct AudioDecoder {
    min_duration_secs: f64,
    transcode_timeout: Duration,
    ffmpeg_path: String,
    scratch_dir: PathBuf,
}

impl AudioDecoder {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            min_duration_secs: config.min_duration_secs,
            transcode_timeout: Duration::from_secs(config.transcode_timeout_secs),
            ffmpeg_path: config.ffmpeg_path.clone(),
            scratch_dir: PathBuf::from(&config.scratch_dir),
        }
    }

    /// Decode an asset through the fallback chain and normalize the result.
    ///
    /// Fails with `DecodeExhausted` (carrying every strategy's reason) when
    /// no strategy produced samples, or `TooShort` when the normalized audio
    /// is below the configured minimum duration.
    pub fn decode(&self, asset: &AudioAsset) -> Result<DecodedAudio, PipelineError> {
        let mut failures = Vec::new();

        for (name, strategy) in STRATEGIES {
            match strategy(self, asset) {
                Ok(raw) => {
                    info!(
                        "Decoded {:?} via {} strategy: {}Hz, {} channels, {} samples",
                        asset.temp_path,
                        name,
                        raw.sample_rate,
                        raw.channels,
                        raw.samples.len()
                    );
                    return self.normalize(raw);
                }
                Err(reason) => {
                    warn!(
                        "Decode strategy {} failed for {:?}: {}",
                        name, asset.temp_path, reason
                    );
                    failures.push(format!("{}: {}", name, reason));
                }
            }
        }

        Err(PipelineError::DecodeExhausted(failures.join("; ")))
    }

    /// Strategy 1: symphonia probe and packet decode
    pub fn decode_native(&self, asset: &AudioAsset) -> Result<RawAudio, String> {
        let file =
            File::open(&asset.temp_path).map_err(|e| format!("open failed: {}", e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(&asset.extension);

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| format!("probe: {}", e))?;

        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| "no audio track found".to_string())?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| "unknown sample rate".to_string())?;
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| format!("codec: {}", e))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(format!("packet: {}", e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    debug!("Skipping corrupt frame: {}", e);
                    continue;
                }
                Err(e) => return Err(format!("decode: {}", e)),
            };

            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let mut buf = SampleBuffer::<f32>::new(frames as u64, *decoded.spec());
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }

        if samples.is_empty() {
            return Err("no samples decoded".to_string());
        }

        Ok(RawAudio {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Strategy 2: parse a linear-PCM WAV header directly
    pub fn decode_raw_wav(&self, asset: &AudioAsset) -> Result<RawAudio, String> {
        read_wav(&asset.temp_path)
    }

    /// Strategy 3: transcode through ffmpeg, then parse the resulting WAV.
    ///
    /// The intermediate file is removed on every path: success, non-zero
    /// exit, timeout, and spawn failure.
    pub fn decode_via_ffmpeg(&self, asset: &AudioAsset) -> Result<RawAudio, String> {
        let output = self
            .scratch_dir
            .join(format!("{}-transcode.wav", Uuid::new_v4()));

        let result = self
            .run_ffmpeg(&asset.temp_path, &output)
            .and_then(|()| read_wav(&output));

        if output.exists() {
            if let Err(e) = fs::remove_file(&output) {
                warn!("Failed to remove transcode intermediate {:?}: {}", output, e);
            }
        }

        result
    }

    /// Run ffmpeg with a hard deadline; the child is killed on timeout.
    fn run_ffmpeg(&self, input: &Path, output: &Path) -> Result<(), String> {
        let mut child = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ar", "16000", "-ac", "1", "-sample_fmt", "s16"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("spawn {}: {}", self.ffmpeg_path, e))?;

        // Drain stderr from its own thread while the wait loop polls; a
        // chatty transcoder fills the pipe buffer otherwise and blocks
        // before it can exit
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let deadline = Instant::now() + self.transcode_timeout;

        let wait_result = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        break Err(format!(
                            "timed out after {}s",
                            self.transcode_timeout.as_secs()
                        ));
                    }
                    std::thread::sleep(SUBPROCESS_POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break Err(format!("wait: {}", e));
                }
            }
        };

        // The child is gone either way, so the reader sees EOF and the
        // join cannot hang
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let status = wait_result?;

        if status.success() {
            Ok(())
        } else {
            let tail: String = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join(" | ");
            Err(format!("exit {}: {}", status, tail))
        }
    }

    /// Collapse to mono, resample to 16kHz, reject audio below the minimum
    /// duration. Applied regardless of which strategy succeeded.
    fn normalize(&self, raw: RawAudio) -> Result<DecodedAudio, PipelineError> {
        let mono = downmix_to_mono(&raw.samples, raw.channels);

        let samples = if raw.sample_rate == TARGET_SAMPLE_RATE {
            mono
        } else {
            debug!(
                "Resampling {} -> {} Hz ({} samples)",
                raw.sample_rate,
                TARGET_SAMPLE_RATE,
                mono.len()
            );
            resample(&mono, raw.sample_rate, TARGET_SAMPLE_RATE)
                .map_err(PipelineError::Internal)?
        };

        let decoded = DecodedAudio {
            samples,
            channels: 1,
            sample_rate: TARGET_SAMPLE_RATE,
        };

        let duration = decoded.duration_seconds();
        if duration < self.min_duration_secs {
            return Err(PipelineError::TooShort {
                actual: duration,
                min: self.min_duration_secs,
            });
        }

        debug!(
            "Normalized audio: {:.2}s at {}Hz mono",
            duration, TARGET_SAMPLE_RATE
        );

        Ok(decoded)
    }
}

/// Average interleaved channels into a single mono sequence
fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Sinc resampling of a mono buffer
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| anyhow!("resampler init: {}", e))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let resampled = resampler
            .process(&[input], None)
            .map_err(|e| anyhow!("resample: {}", e))?;

        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }

    // The final chunk was zero-padded; trim back to the expected length
    let expected_len = (samples.len() as f64 * ratio) as usize;
    output.truncate(expected_len);

    Ok(output)
}

/// Parse a linear-PCM WAV file, normalizing integer samples to [-1, 1].
/// Handles 8/16/32-bit integer and 32-bit float sample formats.
fn read_wav(path: &Path) -> Result<RawAudio, String> {
    let reader = hound::WavReader::open(path).map_err(|e| format!("wav open: {}", e))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("wav read: {}", e))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| format!("wav read: {}", e))?
        }
    };

    if samples.is_empty() {
        return Err("wav contains no samples".to_string());
    }

    Ok(RawAudio {
        samples,
        channels: spec.channels as usize,
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo_averages_frames() {
        let interleaved = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = downmix_to_mono(&interleaved, 2);

        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.5).abs() < f32::EPSILON);
        assert!((mono[1] - 0.5).abs() < f32::EPSILON);
        assert!(mono[2].abs() < f32::EPSILON);
    }

    #[test]
    fn test_downmix_mono_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples = vec![0.0f32; 32_000];
        let out = resample(&samples, 32_000, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn test_strategy_order() {
        let names: Vec<&str> = STRATEGIES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["native", "raw-wav", "ffmpeg"]);
    }
}
