pub mod chunker;
pub mod loader;
pub mod vad;

pub use chunker::{chunk_interval, Chunk, ChunkConfig, WindowIter};
pub use loader::{load_audio, load_audio_bytes, AudioBuffer};
pub use vad::{
    EnergyVad, EnergyVadConfig, FrameVad, FrameVadConfig, SpeechInterval, SpeechSegmenter,
};
