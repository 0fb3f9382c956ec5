use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

/// Name used for an uploaded file: the last path component of `filename` with
/// unsafe characters replaced, ending in `.<format>` exactly once.
pub fn audio_file_name(filename: &str, format: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let mut name: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push_str("audio");
    }
    let format = format.trim_start_matches('.');
    if format.is_empty() {
        return name;
    }
    let extension = format!(".{}", format);
    if !name.to_lowercase().ends_with(&extension.to_lowercase()) {
        name.push_str(&extension);
    }
    name
}

/// Uploaded audio on disk for the duration of one request.
///
/// The file is closed once written and removed when the guard is dropped.
#[derive(Debug)]
pub struct TempAudio {
    path: PathBuf,
}

impl TempAudio {
    pub fn write(dir: Option<&Path>, name: &str, bytes: &[u8]) -> Result<Self> {
        let suffix = format!("-{}", name);
        let mut builder = tempfile::Builder::new();
        builder.prefix("scribe-").suffix(&suffix);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .wrap_err("failed to create temporary audio file")?;

        file.write_all(bytes).wrap_err("failed to write temporary audio file")?;
        file.flush()?;
        let (handle, temp_path) = file.into_parts();
        drop(handle);
        let path = temp_path
            .keep()
            .wrap_err("failed to persist temporary audio file")?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            tracing::debug!("failed to remove {}: {}", self.path.display(), error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_format_once() {
        assert_eq!(audio_file_name("audio", "wav"), "audio.wav");
        assert_eq!(audio_file_name("clip.wav", "wav"), "clip.wav");
        assert_eq!(audio_file_name("CLIP.WAV", "wav"), "CLIP.WAV");
        assert_eq!(audio_file_name("clip.mp3", "wav"), "clip.mp3.wav");
    }

    #[test]
    fn strips_directories_and_odd_characters() {
        assert_eq!(audio_file_name("../../etc/passwd", "ogg"), "passwd.ogg");
        assert_eq!(audio_file_name("mi nota (1)", "m4a"), "mi_nota__1_.m4a");
        assert_eq!(audio_file_name("", "wav"), "audio.wav");
    }

    #[test]
    fn file_exists_while_held_and_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let audio = TempAudio::write(Some(dir.path()), "audio.wav", b"RIFF").unwrap();
        let path = audio.path().to_path_buf();

        assert_eq!(fs::read(&path).unwrap(), b"RIFF");
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("-audio.wav"));

        drop(audio);
        assert!(!path.exists());
    }

    #[test]
    fn names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = TempAudio::write(Some(dir.path()), "audio.wav", b"a").unwrap();
        let b = TempAudio::write(Some(dir.path()), "audio.wav", b"b").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn drop_ignores_already_removed_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = TempAudio::write(Some(dir.path()), "gone.wav", b"x").unwrap();
        fs::remove_file(audio.path()).unwrap();
        drop(audio);
    }
}
