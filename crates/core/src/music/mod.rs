//! Streaming music path: a stereo PCM source, a fixed-point rate converter
//! and the channel the mixer pulls from.

use std::{fmt, path::Path};

use crate::{cache::decode_wav, voice::volume_to_gain, Fixed64, Result, SampleBuffer};

const RESAMPLE_BLOCK_FRAMES: usize = 256;

/// Pull-based source of stereo 16-bit frames.
pub trait AudioStream: Send {
    /// Fills `out` from the front and returns how many frames were written.
    /// Fewer than `out.len()` means the stream ran dry.
    fn provide(&mut self, out: &mut [[i16; 2]]) -> usize;

    fn sample_rate(&self) -> u32;

    /// False once a non-looping stream has delivered its last frame.
    fn is_open(&self) -> bool {
        true
    }
}

impl<S: AudioStream + ?Sized> AudioStream for Box<S> {
    fn provide(&mut self, out: &mut [[i16; 2]]) -> usize {
        (**self).provide(out)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Fully decoded stereo PCM held in memory.
pub struct PcmStream {
    frames: Vec<[i16; 2]>,
    sample_rate: u32,
    position: usize,
    looping: bool,
}

impl PcmStream {
    /// Wraps already decoded stereo frames.
    pub fn new(frames: Vec<[i16; 2]>, sample_rate: u32, looping: bool) -> Self {
        Self {
            frames,
            sample_rate,
            position: 0,
            looping,
        }
    }

    /// Copies a sample buffer into a stream, duplicating mono to stereo.
    pub fn from_buffer(buffer: &SampleBuffer, looping: bool) -> Self {
        let frames = (0..buffer.sample_count())
            .filter_map(|index| buffer.frame(index))
            .map(|(left, right)| [left, right])
            .collect();
        Self::new(frames, buffer.sample_rate(), looping)
    }

    /// Decodes a WAV file from disk.
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self> {
        let buffer = decode_wav(path.as_ref())?;
        Ok(Self::from_buffer(&buffer, looping))
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl AudioStream for PcmStream {
    fn provide(&mut self, out: &mut [[i16; 2]]) -> usize {
        let mut written = 0;
        while written < out.len() && !self.frames.is_empty() {
            if self.position >= self.frames.len() {
                if !self.looping {
                    break;
                }
                self.position = 0;
            }

            let count = (out.len() - written).min(self.frames.len() - self.position);
            out[written..written + count]
                .copy_from_slice(&self.frames[self.position..self.position + count]);
            written += count;
            self.position += count;
        }
        written
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_open(&self) -> bool {
        !self.frames.is_empty() && (self.looping || self.position < self.frames.len())
    }
}

impl fmt::Debug for PcmStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmStream")
            .field("frames", &self.frames.len())
            .field("sample_rate", &self.sample_rate)
            .field("position", &self.position)
            .field("looping", &self.looping)
            .finish()
    }
}

/// Converts an inner stream to another rate by stepping a fixed-point
/// cursor through its frames (nearest sample, no interpolation).
pub struct ResampleStream<S> {
    inner: S,
    output_rate: u32,
    increment: Fixed64,
    position: Fixed64,
    block: Vec<[i16; 2]>,
    block_len: usize,
    exhausted: bool,
}

impl<S: AudioStream> ResampleStream<S> {
    /// Converts `inner` to `output_rate`.
    pub fn new(inner: S, output_rate: u32) -> Self {
        let increment = Fixed64::ratio(inner.sample_rate(), output_rate);
        Self {
            inner,
            output_rate,
            increment,
            position: Fixed64::ZERO,
            block: vec![[0; 2]; RESAMPLE_BLOCK_FRAMES],
            block_len: 0,
            exhausted: false,
        }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn refill(&mut self) -> bool {
        while self.position.index() >= self.block_len as i64 {
            self.position = Fixed64::from_raw(
                self.position.raw() - Fixed64::from_index(self.block_len as i64).raw(),
            );
            self.block_len = self.inner.provide(&mut self.block);
            if self.block_len == 0 {
                self.exhausted = true;
                return false;
            }
        }
        true
    }
}

impl<S: AudioStream> AudioStream for ResampleStream<S> {
    fn provide(&mut self, out: &mut [[i16; 2]]) -> usize {
        if self.exhausted || self.increment == Fixed64::ZERO {
            return 0;
        }

        for (written, frame) in out.iter_mut().enumerate() {
            if !self.refill() {
                return written;
            }
            *frame = self.block[self.position.index() as usize];
            self.position += self.increment;
        }
        out.len()
    }

    fn sample_rate(&self) -> u32 {
        self.output_rate
    }

    /// Stays open while frames already pulled from the inner stream are
    /// still waiting to be output.
    fn is_open(&self) -> bool {
        !self.exhausted
            && (self.position.index() < self.block_len as i64 || self.inner.is_open())
    }
}

/// Music slot owned by the mixer state: at most one open stream plus its
/// volume.
pub struct MusicChannel {
    stream: Option<Box<dyn AudioStream>>,
    volume: f32,
    gain: i32,
}

impl MusicChannel {
    /// Empty channel at `volume`.
    pub fn new(volume: f32) -> Self {
        Self {
            stream: None,
            volume,
            gain: volume_to_gain(volume),
        }
    }

    /// True while a stream is installed and still producing frames.
    pub fn is_open(&self) -> bool {
        self.stream.as_ref().is_some_and(|stream| stream.is_open())
    }

    /// Installs `stream`, handing back the one it replaces so the caller can
    /// drop it outside any lock.
    pub fn open(&mut self, stream: Box<dyn AudioStream>) -> Option<Box<dyn AudioStream>> {
        self.stream.replace(stream)
    }

    /// Removes the current stream, if any.
    pub fn close(&mut self) -> Option<Box<dyn AudioStream>> {
        self.stream.take()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Sets the linear music volume.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.gain = volume_to_gain(volume);
    }

    pub(crate) fn gain(&self) -> i32 {
        self.gain
    }

    pub(crate) fn provide(&mut self, out: &mut [[i16; 2]]) -> usize {
        match self.stream.as_mut() {
            Some(stream) => stream.provide(out),
            None => 0,
        }
    }
}

impl Default for MusicChannel {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl fmt::Debug for MusicChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MusicChannel")
            .field("open", &self.is_open())
            .field("volume", &self.volume)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: i16, rate: u32, looping: bool) -> PcmStream {
        PcmStream::new((0..len).map(|v| [v, -v]).collect(), rate, looping)
    }

    #[test]
    fn pcm_stream_under_delivers_at_end() {
        let mut stream = ramp(3, 44_100, false);
        let mut out = [[0; 2]; 5];
        assert_eq!(stream.provide(&mut out), 3);
        assert_eq!(out[2], [2, -2]);
        assert!(!stream.is_open());
        assert_eq!(stream.provide(&mut out), 0);
    }

    #[test]
    fn looping_pcm_stream_wraps() {
        let mut stream = ramp(2, 44_100, true);
        let mut out = [[0; 2]; 5];
        assert_eq!(stream.provide(&mut out), 5);
        let left: Vec<i16> = out.iter().map(|f| f[0]).collect();
        assert_eq!(left, vec![0, 1, 0, 1, 0]);
        assert!(stream.is_open());
    }

    #[test]
    fn resampler_doubles_frames_when_upsampling() {
        let mut stream = ResampleStream::new(ramp(4, 22_050, false), 44_100);
        let mut out = [[0; 2]; 10];
        assert_eq!(stream.provide(&mut out), 8);
        let left: Vec<i16> = out[..8].iter().map(|f| f[0]).collect();
        assert_eq!(left, vec![0, 0, 1, 1, 2, 2, 3, 3]);
        assert!(!stream.is_open());
    }

    #[test]
    fn resampler_skips_frames_when_downsampling() {
        let mut stream = ResampleStream::new(ramp(600, 88_200, false), 44_100);
        let mut out = [[0; 2]; 300];
        assert_eq!(stream.provide(&mut out), 300);
        assert_eq!(out[0][0], 0);
        assert_eq!(out[1][0], 2);
        assert_eq!(out[299][0], 598);
    }

    #[test]
    fn resampler_stays_open_until_buffered_frames_are_output() {
        let mut stream = ResampleStream::new(ramp(2, 22_050, false), 44_100);
        let mut out = [[0; 2]; 2];

        assert_eq!(stream.provide(&mut out), 2);
        assert_eq!(out, [[0, 0], [0, 0]]);
        assert!(stream.is_open());

        assert_eq!(stream.provide(&mut out), 2);
        assert_eq!(out, [[1, -1], [1, -1]]);
        assert!(!stream.is_open());
    }

    #[test]
    fn channel_reports_open_state() {
        let mut channel = MusicChannel::default();
        assert!(!channel.is_open());
        assert!(channel.open(Box::new(ramp(2, 44_100, true))).is_none());
        assert!(channel.is_open());
        assert!(channel.close().is_some());
        assert!(!channel.is_open());
    }
}
