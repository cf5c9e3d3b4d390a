//! Core library for the Voice Mixer engine.
//!
//! A fixed-point polyphonic sample mixer: immutable 16-bit sample buffers
//! are played by a fixed pool of voices, each stepping through its buffer
//! with a 32.32 fixed-point position, and summed with an optional music
//! stream into saturated stereo 16-bit output. The [`SoundPlayer`] owns the
//! shared state and hands a [`RenderHandle`] to whichever backend drives
//! the audio callback.

pub mod backend;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod error;
pub mod fixed;
pub mod mixer;
pub mod music;
pub mod player;
pub mod voice;

pub use backend::{AudioBackend, NullBackend};
#[cfg(feature = "cpal")]
pub use backend::CpalBackend;
pub use buffer::{BufferHandle, SampleBuffer};
pub use cache::{decode_wav, SoundCache};
pub use config::{AppConfig, MixerConfig};
pub use error::{MixerError, Result};
pub use fixed::{Fixed64, RESAMPLE_FIXED_BITS};
pub use mixer::Mixer;
pub use music::{AudioStream, MusicChannel, PcmStream, ResampleStream};
pub use player::{RenderHandle, SoundPlayer};
pub use voice::{PlayId, Voice, VoicePool};
