use std::path::{Path, PathBuf};

use eyre::{eyre, Result, WrapErr};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{audio, Device, Segment, TranscribeOptions, Transcriber, Transcript};

/// whisper.cpp model loaded once and shared by every request.
///
/// Each call creates its own `WhisperState`, the context itself is never mutated.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    temp_dir: Option<PathBuf>,
}

impl WhisperTranscriber {
    /// Loads the weights at `model_path`. Audio conversions made while
    /// transcribing are written to `temp_dir`.
    pub fn load(model_path: &Path, device: Device, temp_dir: Option<PathBuf>) -> Result<Self> {
        whisper_rs::install_logging_hooks();

        let path = model_path
            .to_str()
            .ok_or_else(|| eyre!("model path is not valid utf-8: {}", model_path.display()))?;
        let mut params = WhisperContextParameters::default();
        params.use_gpu(device == Device::Gpu);

        tracing::info!("loading whisper model {} on {}", model_path.display(), device);
        let ctx = WhisperContext::new_with_params(path, params)
            .wrap_err_with(|| format!("failed to load model {}", model_path.display()))?;
        Ok(Self { ctx, temp_dir })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, path: &Path, options: &TranscribeOptions) -> Result<Transcript> {
        let samples = audio::decode_file(path, self.temp_dir.as_deref())?;
        tracing::debug!("decoded {} samples from {}", samples.len(), path.display());

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(options.lang.as_deref());
        if let Some(n_threads) = options.n_threads {
            params.set_n_threads(n_threads);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let mut state = self.ctx.create_state().wrap_err("failed to create whisper state")?;
        state.full(params, &samples).wrap_err("whisper inference failed")?;

        let count = state.full_n_segments().wrap_err("failed to read segment count")?;
        let mut segments = Vec::with_capacity(count.max(0) as usize);
        for i in 0..count {
            let text = state
                .full_get_segment_text(i)
                .wrap_err_with(|| format!("failed to read segment {}", i))?;
            // whisper.cpp timestamps are in centiseconds
            let start = state.full_get_segment_t0(i).unwrap_or(0);
            let end = state.full_get_segment_t1(i).unwrap_or(0);
            segments.push(Segment {
                start_ms: start * 10,
                end_ms: end * 10,
                text,
            });
        }
        Ok(Transcript::from_segments(segments))
    }
}
