//! Decoding of audio files into the 16 kHz mono `f32` samples whisper.cpp consumes.
//!
//! WAV input is read directly with hound. Anything else is first converted to a
//! 16 kHz mono WAV by `ffmpeg` when it can be found on `PATH`.

use std::path::{Path, PathBuf};
use std::process::Command;

use eyre::{bail, eyre, Result, WrapErr};
use hound::{SampleFormat, WavReader};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::SAMPLE_RATE;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Reads `path` and returns mono samples at [`SAMPLE_RATE`]. Conversion files,
/// if any, are created in `temp_dir` (the system temp dir when `None`).
pub fn decode_file(path: &Path, temp_dir: Option<&Path>) -> Result<Vec<f32>> {
    decode_with(path, find_ffmpeg().as_deref(), temp_dir)
}

fn decode_with(path: &Path, ffmpeg: Option<&Path>, temp_dir: Option<&Path>) -> Result<Vec<f32>> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    if is_wav {
        match read_wav(path) {
            Ok(samples) => return Ok(samples),
            Err(error) => {
                tracing::debug!("hound could not read {}: {:#}, trying ffmpeg", path.display(), error)
            }
        }
    }

    let ffmpeg = ffmpeg.ok_or_else(|| {
        eyre!(
            "cannot decode {}: only WAV is read natively and ffmpeg was not found on PATH",
            path.display()
        )
    })?;
    let mut builder = tempfile::Builder::new();
    builder.prefix("scribe-").suffix(".wav");
    let converted = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .wrap_err("failed to create conversion file")?
    .into_temp_path();
    convert_with_ffmpeg(ffmpeg, path, &converted)?;
    read_wav(&converted)
}

fn find_ffmpeg() -> Option<PathBuf> {
    which::which("ffmpeg").ok()
}

fn convert_with_ffmpeg(ffmpeg: &Path, input: &Path, output: &Path) -> Result<()> {
    tracing::debug!("converting {} with {}", input.display(), ffmpeg.display());
    let rate = SAMPLE_RATE.to_string();
    let result = Command::new(ffmpeg)
        .args(["-nostdin", "-loglevel", "error", "-y", "-i"])
        .arg(input)
        .args(["-ar", rate.as_str(), "-ac", "1", "-c:a", "pcm_s16le"])
        .arg(output)
        .output()
        .wrap_err("failed to run ffmpeg")?;
    if !result.status.success() {
        bail!(
            "ffmpeg failed to convert {}: {}",
            input.display(),
            String::from_utf8_lossy(&result.stderr).trim()
        );
    }
    Ok(())
}

/// Reads a WAV file of any integer or float encoding, downmixes and resamples.
pub fn read_wav(path: &Path) -> Result<Vec<f32>> {
    let reader =
        WavReader::open(path).wrap_err_with(|| format!("failed to open wav {}", path.display()))?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .wrap_err("failed to read float samples")?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()
                .wrap_err("failed to read integer samples")?
        }
    };
    let mono = to_mono(&samples, spec.channels);
    resample(&mono, spec.sample_rate)
}

/// Averages interleaved channels into one.
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => samples
            .chunks_exact(n as usize)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

/// Band-limited sinc resampling from `source_rate` to [`SAMPLE_RATE`].
///
/// The output is aligned with the input (the filter delay is dropped) and has
/// `len * SAMPLE_RATE / source_rate` samples.
pub fn resample(samples: &[f32], source_rate: u32) -> Result<Vec<f32>> {
    if source_rate == SAMPLE_RATE || source_rate == 0 || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = SAMPLE_RATE as f64 / source_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLER_CHUNK_SIZE, 1)
        .wrap_err("failed to create resampler")?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + RESAMPLER_CHUNK_SIZE);
    let mut position = 0;
    // trailing chunks are zero padded until the delayed tail has been flushed
    while output.len() < expected + delay {
        let mut chunk = vec![0.0_f32; RESAMPLER_CHUNK_SIZE];
        if position < samples.len() {
            let end = (position + RESAMPLER_CHUNK_SIZE).min(samples.len());
            chunk[..end - position].copy_from_slice(&samples[position..end]);
        }
        position += RESAMPLER_CHUNK_SIZE;

        let out = resampler
            .process(&[chunk], None)
            .wrap_err("resampling failed")?;
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
