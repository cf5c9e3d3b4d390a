//! Fixed-capacity voice pool with oldest-first stealing.

use std::{fmt, sync::Weak};

use crate::{buffer::SampleBuffer, BufferHandle, Fixed64};

/// Fractional bits of a voice's fixed-point gain.
pub const GAIN_BITS: u32 = 16;
const MAX_VOLUME: f32 = 8.0;

/// Identity of one playback request. Ids increase monotonically per pool
/// and are never handed out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayId(u64);

impl PlayId {
    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Converts a linear volume into a Q16 gain. Unity volume maps to exactly
/// `1 << GAIN_BITS`, so samples pass through unchanged.
pub fn volume_to_gain(volume: f32) -> i32 {
    if !volume.is_finite() {
        return 0;
    }
    (volume.clamp(0.0, MAX_VOLUME) * (1 << GAIN_BITS) as f32).round() as i32
}

/// One playback cursor into a shared sample buffer.
#[derive(Clone)]
pub struct Voice {
    pub(crate) buffer: Weak<SampleBuffer>,
    pub(crate) position: Fixed64,
    pub(crate) increment: Fixed64,
    pub(crate) play_id: Option<PlayId>,
    pub(crate) looping: bool,
    pub(crate) volume: f32,
    pub(crate) gain: i32,
}

impl Voice {
    fn free_slot() -> Self {
        Self {
            buffer: Weak::new(),
            position: Fixed64::ZERO,
            increment: Fixed64::ZERO,
            play_id: None,
            looping: false,
            volume: 0.0,
            gain: 0,
        }
    }

    /// A voice is active while it has an id and its buffer is still alive.
    pub fn is_active(&self) -> bool {
        self.play_id.is_some() && self.buffer.strong_count() > 0
    }

    /// Id of the playback this slot serves, `None` when free.
    pub fn play_id(&self) -> Option<PlayId> {
        self.play_id
    }

    /// Current read cursor.
    pub fn position(&self) -> Fixed64 {
        self.position
    }

    /// Cursor advance per output frame.
    pub fn increment(&self) -> Fixed64 {
        self.increment
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Linear volume last set for this voice.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.gain = volume_to_gain(volume);
    }

    pub(crate) fn free(&mut self) {
        self.play_id = None;
        self.buffer = Weak::new();
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("play_id", &self.play_id)
            .field("position", &self.position)
            .field("increment", &self.increment)
            .field("looping", &self.looping)
            .field("volume", &self.volume)
            .finish()
    }
}

/// Fixed array of voices plus the next play id to hand out.
#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<Voice>,
    next_play_id: u64,
}

impl VoicePool {
    /// Creates a pool of `capacity` free voices.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            voices: vec![Voice::free_slot(); capacity],
            next_play_id: 0,
        }
    }

    /// Number of slots, free or not.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Every slot, for inspection.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub(crate) fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    /// Number of slots currently playing.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_active()).count()
    }

    /// True while `id` still owns a live voice.
    pub fn is_playing(&self, id: PlayId) -> bool {
        self.voices
            .iter()
            .any(|voice| voice.play_id == Some(id) && voice.is_active())
    }

    /// Starts `buffer` on a free slot, stealing the oldest non-looping voice
    /// when the pool is full. Returns `None` when every voice is looping or
    /// the pool has no slots at all.
    pub fn allocate(
        &mut self,
        buffer: &BufferHandle,
        volume: f32,
        looping: bool,
        output_rate: u32,
    ) -> Option<PlayId> {
        let slot = self.find_slot()?;

        let id = PlayId(self.next_play_id);
        self.next_play_id += 1;

        let voice = &mut self.voices[slot];
        voice.buffer = buffer.downgrade();
        voice.position = Fixed64::ZERO;
        voice.increment = Fixed64::ratio(buffer.sample_rate(), output_rate);
        voice.play_id = Some(id);
        voice.looping = looping;
        voice.set_volume(volume);

        Some(id)
    }

    fn find_slot(&mut self) -> Option<usize> {
        if let Some(index) = self.voices.iter().position(|voice| !voice.is_active()) {
            return Some(index);
        }

        let (index, stolen) = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, voice)| !voice.looping)
            .filter_map(|(index, voice)| voice.play_id.map(|id| (index, id)))
            .min_by_key(|(_, id)| *id)?;

        tracing::debug!(%stolen, slot = index, "stealing oldest voice");
        self.voices[index].free();
        Some(index)
    }

    /// Frees the voice playing `id`. Unknown or already stopped ids are
    /// ignored.
    pub fn stop(&mut self, id: PlayId) -> bool {
        match self.voices.iter_mut().find(|voice| voice.play_id == Some(id)) {
            Some(voice) => {
                voice.free();
                true
            }
            None => false,
        }
    }

    /// Frees every voice reading from `buffer` and returns how many were
    /// stopped.
    pub fn stop_buffer(&mut self, buffer: &BufferHandle) -> usize {
        let mut stopped = 0;
        for voice in &mut self.voices {
            if voice.play_id.is_some() && buffer.is_target_of(&voice.buffer) {
                voice.free();
                stopped += 1;
            }
        }
        stopped
    }

    /// Frees every slot.
    pub fn stop_all(&mut self) {
        for voice in &mut self.voices {
            voice.free();
        }
    }

    /// Changes the volume of `id`. Returns false when it is not playing.
    pub fn set_volume(&mut self, id: PlayId, volume: f32) -> bool {
        match self.voices.iter_mut().find(|voice| voice.play_id == Some(id)) {
            Some(voice) => {
                voice.set_volume(volume);
                true
            }
            None => false,
        }
    }
}
