//! Per-callback mixing of the music channel and every active voice into
//! interleaved stereo 16-bit output.

use crate::{
    music::MusicChannel,
    voice::{Voice, VoicePool, GAIN_BITS},
};

/// Sums voices into a 32-bit accumulator and saturates the result to 16 bits.
///
/// The accumulator is sized once for the configured callback length, so the
/// steady-state callback does not allocate.
#[derive(Debug)]
pub struct Mixer {
    accumulator: Vec<[i32; 2]>,
    music_frames: Vec<[i16; 2]>,
}

impl Mixer {
    /// Sizes the scratch buffers for callbacks of up to `frames` frames.
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            accumulator: vec![[0; 2]; frames],
            music_frames: vec![[0; 2]; frames],
        }
    }

    /// Produces `out.len() / 2` stereo frames. A trailing odd sample is
    /// zeroed.
    pub fn mix(&mut self, pool: &mut VoicePool, music: &mut MusicChannel, out: &mut [i16]) {
        let frames = out.len() / 2;

        if !music.is_open() && pool.active_count() == 0 {
            out.fill(0);
            return;
        }

        if frames > self.accumulator.len() {
            self.accumulator.resize(frames, [0; 2]);
            self.music_frames.resize(frames, [0; 2]);
        }
        let accumulator = &mut self.accumulator[..frames];

        if music.is_open() {
            let pulled = &mut self.music_frames[..frames];
            let read = music.provide(pulled);
            pulled[read..].fill([0; 2]);

            let gain = i64::from(music.gain());
            for (slot, frame) in accumulator.iter_mut().zip(pulled.iter()) {
                *slot = [scale(frame[0], gain), scale(frame[1], gain)];
            }
        } else {
            accumulator.fill([0; 2]);
        }

        for voice in pool.voices_mut() {
            if voice.is_active() {
                mix_voice(voice, accumulator);
            }
        }

        for (pair, slot) in out.chunks_exact_mut(2).zip(accumulator.iter()) {
            pair[0] = clip(slot[0]);
            pair[1] = clip(slot[1]);
        }
        if out.len() % 2 == 1 {
            out[out.len() - 1] = 0;
        }
    }
}

fn mix_voice(voice: &mut Voice, accumulator: &mut [[i32; 2]]) {
    let Some(buffer) = voice.buffer.upgrade() else {
        voice.free();
        return;
    };
    let sample_count = buffer.sample_count();
    let gain = i64::from(voice.gain);

    for slot in accumulator.iter_mut() {
        let index = voice.position.index();
        // A negative cursor can never walk back into the buffer.
        if index < 0 {
            voice.free();
            break;
        }

        if let Some((left, right)) = buffer.frame(index as usize) {
            slot[0] = slot[0].saturating_add(scale(left, gain));
            slot[1] = slot[1].saturating_add(scale(right, gain));
        }

        voice.position += voice.increment;

        if voice.position.index() >= sample_count as i64 {
            if voice.looping {
                voice.position = voice.position.wrap_into(sample_count);
            } else {
                voice.free();
                break;
            }
        }
    }
}

#[inline]
fn scale(sample: i16, gain: i64) -> i32 {
    ((i64::from(sample) * gain) >> GAIN_BITS) as i32
}

#[inline]
fn clip(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}
