use std::path::Path;

use eyre::Result;
use serde::Serialize;

use crate::TranscribeOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Segment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

/// Everything the model produced for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<Segment>,
}

impl Transcript {
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let text = segments.iter().map(|segment| segment.text.as_str()).collect();
        Self { text, segments }
    }
}

/// A loaded speech-recognition model.
///
/// Implementations are shared read-only between requests, so `transcribe` must
/// not mutate shared state.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, path: &Path, options: &TranscribeOptions) -> Result<Transcript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_joins_segments_in_order() {
        let transcript = Transcript::from_segments(vec![
            Segment { start_ms: 0, end_ms: 900, text: " Hola".into() },
            Segment { start_ms: 900, end_ms: 1800, text: " mundo.".into() },
        ]);
        assert_eq!(transcript.text, " Hola mundo.");
        assert_eq!(transcript.segments.len(), 2);
    }

    #[test]
    fn no_segments_means_empty_text() {
        assert_eq!(Transcript::from_segments(Vec::new()).text, "");
    }
}
