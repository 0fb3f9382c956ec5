use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use eyre::{bail, eyre, Result, WrapErr};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

const MODELS_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Whisper model sizes, trading accuracy for memory and speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelVariant {
    Tiny,
    TinyEn,
    #[default]
    Base,
    BaseEn,
    Small,
    SmallEn,
    Medium,
    MediumEn,
    Large,
    LargeV1,
    LargeV2,
    LargeV3,
    LargeV3Turbo,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 13] = [
        ModelVariant::Tiny,
        ModelVariant::TinyEn,
        ModelVariant::Base,
        ModelVariant::BaseEn,
        ModelVariant::Small,
        ModelVariant::SmallEn,
        ModelVariant::Medium,
        ModelVariant::MediumEn,
        ModelVariant::Large,
        ModelVariant::LargeV1,
        ModelVariant::LargeV2,
        ModelVariant::LargeV3,
        ModelVariant::LargeV3Turbo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelVariant::Tiny => "tiny",
            ModelVariant::TinyEn => "tiny.en",
            ModelVariant::Base => "base",
            ModelVariant::BaseEn => "base.en",
            ModelVariant::Small => "small",
            ModelVariant::SmallEn => "small.en",
            ModelVariant::Medium => "medium",
            ModelVariant::MediumEn => "medium.en",
            ModelVariant::Large => "large",
            ModelVariant::LargeV1 => "large-v1",
            ModelVariant::LargeV2 => "large-v2",
            ModelVariant::LargeV3 => "large-v3",
            ModelVariant::LargeV3Turbo => "large-v3-turbo",
        }
    }

    /// Name of the ggml weights file. Plain `large` tracks the newest release.
    pub fn filename(&self) -> String {
        match self {
            ModelVariant::Large => "ggml-large-v3.bin".to_string(),
            other => format!("ggml-{}.bin", other.name()),
        }
    }

    pub fn url(&self) -> String {
        format!("{}/{}", MODELS_URL, self.filename())
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelVariant {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        ModelVariant::ALL
            .into_iter()
            .find(|variant| variant.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = ModelVariant::ALL.iter().map(|v| v.name()).collect();
                eyre!("unknown model '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

/// Where inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    /// True when the crate was compiled against an accelerated whisper.cpp backend.
    pub fn accelerator_available() -> bool {
        cfg!(any(
            feature = "cuda",
            feature = "metal",
            feature = "coreml",
            feature = "rocm",
            feature = "vulkan"
        ))
    }

    pub fn detect() -> Self {
        if Self::accelerator_available() {
            Device::Gpu
        } else {
            Device::Cpu
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Gpu => f.write_str("gpu"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

impl DevicePreference {
    pub fn resolve(self) -> Device {
        match self {
            DevicePreference::Auto => Device::detect(),
            DevicePreference::Cpu => Device::Cpu,
            DevicePreference::Gpu if Device::accelerator_available() => Device::Gpu,
            DevicePreference::Gpu => {
                tracing::warn!("gpu requested but no accelerator backend was compiled in, using cpu");
                Device::Cpu
            }
        }
    }
}

impl FromStr for DevicePreference {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "gpu" | "cuda" => Ok(DevicePreference::Gpu),
            other => bail!("unknown device '{}', expected auto, cpu or gpu", other),
        }
    }
}

/// Default location for downloaded weights.
pub fn default_models_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("scribe")
        .join("models")
}

pub fn model_path(variant: ModelVariant, dir: &Path) -> PathBuf {
    dir.join(variant.filename())
}

/// Returns the path of the weights for `variant`, downloading them into `dir`
/// first when they are absent and `download` is set.
pub async fn ensure_model(variant: ModelVariant, dir: &Path, download: bool) -> Result<PathBuf> {
    let path = model_path(variant, dir);
    if path.exists() {
        tracing::info!("found model weights at {}", path.display());
        return Ok(path);
    }
    if !download {
        bail!(
            "model weights for '{}' not found at {} and downloading is disabled",
            variant,
            path.display()
        );
    }
    tokio::fs::create_dir_all(dir)
        .await
        .wrap_err_with(|| format!("failed to create models dir {}", dir.display()))?;
    download_file(&variant.url(), &path).await?;
    Ok(path)
}

async fn download_file(url: &str, path: &Path) -> Result<()> {
    tracing::info!("downloading {} to {}", url, path.display());
    let response = reqwest::get(url)
        .await
        .wrap_err_with(|| format!("failed to request {}", url))?;
    if !response.status().is_success() {
        bail!("failed to download {}: status {}", url, response.status());
    }
    let total = response.content_length();

    let partial = path.with_extension("part");
    let mut file = tokio::fs::File::create(&partial)
        .await
        .wrap_err_with(|| format!("failed to create {}", partial.display()))?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_percent = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.wrap_err("download interrupted")?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        if let Some(total) = total.filter(|t| *t > 0) {
            let percent = downloaded * 100 / total;
            if percent >= last_percent + 10 {
                last_percent = percent;
                tracing::info!("download progress {}%", percent);
            }
        }
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&partial, path)
        .await
        .wrap_err_with(|| format!("failed to move {} into place", partial.display()))?;
    tracing::info!("downloaded {} bytes", downloaded);
    Ok(())
}
