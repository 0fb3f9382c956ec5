pub mod audio;
pub mod config;
pub mod model;
pub mod tempaudio;
pub mod transcript;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use config::TranscribeOptions;
pub use model::{Device, DevicePreference, ModelVariant};
pub use tempaudio::TempAudio;
pub use transcript::{Segment, Transcriber, Transcript};

/// Sample rate whisper.cpp expects its input in.
pub const SAMPLE_RATE: u32 = 16_000;
