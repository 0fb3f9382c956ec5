use std::path::PathBuf;
use std::sync::Arc;

use eyre::Result;
use scribe_core::{model, Device, Transcriber};

use crate::config::Config;

/// Everything a request handler needs: the loaded model and per-request settings.
#[derive(Clone)]
pub struct ModelContext {
    pub model: String,
    pub transcriber: Arc<dyn Transcriber>,
    pub n_threads: Option<i32>,
    pub temp_dir: Option<PathBuf>,
}

impl ModelContext {
    /// Resolves, fetches if needed, and loads the configured model. Runs once at startup.
    pub async fn load(config: &Config) -> Result<Self> {
        let variant = config.model_variant()?;
        let device = config.device_preference()?.resolve();
        tracing::info!("using whisper model {} on {}", variant, device);

        let path = model::ensure_model(variant, &config.models_dir(), config.download_missing).await?;
        let transcriber = load_transcriber(path, device, config.temp_dir.clone()).await?;
        tracing::info!("model {} loaded", variant);

        Ok(Self {
            model: variant.to_string(),
            transcriber,
            n_threads: config.n_threads,
            temp_dir: config.temp_dir.clone(),
        })
    }
}

#[cfg(feature = "whisper")]
async fn load_transcriber(
    path: PathBuf,
    device: Device,
    temp_dir: Option<PathBuf>,
) -> Result<Arc<dyn Transcriber>> {
    use scribe_core::whisper::WhisperTranscriber;

    let transcriber =
        tokio::task::spawn_blocking(move || WhisperTranscriber::load(&path, device, temp_dir))
            .await??;
    Ok(Arc::new(transcriber))
}

#[cfg(not(feature = "whisper"))]
async fn load_transcriber(
    path: PathBuf,
    _device: Device,
    _temp_dir: Option<PathBuf>,
) -> Result<Arc<dyn Transcriber>> {
    eyre::bail!(
        "cannot load {}: built without the whisper backend, rebuild with --features whisper",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config(models_dir: &std::path::Path) -> Config {
        Config {
            models_dir: Some(models_dir.to_path_buf()),
            download_missing: false,
            device: "cpu".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn load_fails_when_weights_are_missing_and_downloads_are_off() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelContext::load(&offline_config(dir.path()))
            .await
            .err()
            .expect("load should fail");
        assert!(format!("{:#}", err).contains("ggml-base.bin"), "{:#}", err);
    }

    #[tokio::test]
    async fn load_fails_for_unknown_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            model: "enormous".to_string(),
            ..offline_config(dir.path())
        };
        assert!(ModelContext::load(&config).await.is_err());
    }

    #[tokio::test]
    async fn load_fails_for_unreadable_weights() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ggml-base.bin"), b"not a model").unwrap();
        let err = ModelContext::load(&offline_config(dir.path()))
            .await
            .err()
            .expect("load should fail");
        assert!(format!("{:#}", err).contains("ggml-base.bin"), "{:#}", err);
    }
}
