use core::fmt;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sentinel language value meaning "let the model detect it".
pub const AUTO_LANGUAGE: &str = "auto";

#[derive(Deserialize, Serialize, ToSchema, Clone, Default, PartialEq)]
pub struct TranscribeOptions {
    /// Language hint forwarded to the model. `None` means auto-detect.
    pub lang: Option<String>,
    pub n_threads: Option<i32>,
}

impl TranscribeOptions {
    /// Builds options from a request language, where `"auto"` and the empty
    /// string both leave detection to the model.
    pub fn from_language(language: Option<&str>) -> Self {
        let lang = language
            .filter(|lang| !lang.is_empty() && *lang != AUTO_LANGUAGE)
            .map(str::to_string);
        Self { lang, n_threads: None }
    }

    pub fn with_threads(mut self, n_threads: Option<i32>) -> Self {
        self.n_threads = n_threads;
        self
    }
}

impl fmt::Debug for TranscribeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json_string = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_language_is_not_forwarded() {
        assert_eq!(TranscribeOptions::from_language(Some("auto")).lang, None);
        assert_eq!(TranscribeOptions::from_language(Some("")).lang, None);
        assert_eq!(TranscribeOptions::from_language(None).lang, None);
    }

    #[test]
    fn explicit_language_is_forwarded_verbatim() {
        let options = TranscribeOptions::from_language(Some("es"));
        assert_eq!(options.lang.as_deref(), Some("es"));
    }

    #[test]
    fn debug_renders_json() {
        let options = TranscribeOptions::from_language(Some("en")).with_threads(Some(4));
        assert_eq!(format!("{:?}", options), r#"{"lang":"en","n_threads":4}"#);
    }
}
