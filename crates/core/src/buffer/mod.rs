use std::{fmt, ops::Deref, sync::Arc, sync::Weak};

use crate::{MixerError, Result};

/// Highest accepted buffer rate. Keeps the 32.32 resampling step positive.
pub const MAX_SAMPLE_RATE: u32 = i32::MAX as u32;

/// Decoded 16-bit PCM, mono or interleaved stereo. Immutable once built so
/// any number of voices can read it without locking.
#[derive(Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Vec<i16>,
    sample_count: usize,
    sample_rate: u32,
    channel_count: u16,
}

impl SampleBuffer {
    /// Builds a buffer from raw little-endian PCM bytes.
    ///
    /// Only 16-bit samples (`channel_size == 2`) with one or two channels are
    /// accepted, and `data` must hold at least `sample_count` frames.
    pub fn from_bytes(
        data: &[u8],
        sample_count: usize,
        sample_rate: u32,
        channel_size: usize,
        channel_count: u16,
    ) -> Result<Self> {
        if channel_size != 2 {
            return Err(MixerError::InvalidInput("only 16-bit samples are supported"));
        }
        Self::check_layout(sample_count, sample_rate, channel_count)?;

        let byte_count = sample_count
            .checked_mul(channel_count as usize)
            .and_then(|values| values.checked_mul(channel_size))
            .ok_or(MixerError::InvalidInput("sample count is too large"))?;
        if data.len() < byte_count {
            return Err(MixerError::InvalidInput(
                "sample data is shorter than the declared sample count",
            ));
        }

        let samples = data[..byte_count]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self {
            samples,
            sample_count,
            sample_rate,
            channel_count,
        })
    }

    /// Builds a buffer from already decoded samples. Stereo data is expected
    /// interleaved; a trailing partial frame is discarded.
    pub fn from_samples(mut samples: Vec<i16>, sample_rate: u32, channel_count: u16) -> Result<Self> {
        let channels = channel_count.max(1) as usize;
        let sample_count = samples.len() / channels;
        Self::check_layout(sample_count, sample_rate, channel_count)?;
        samples.truncate(sample_count * channels);

        Ok(Self {
            samples,
            sample_count,
            sample_rate,
            channel_count,
        })
    }

    fn check_layout(sample_count: usize, sample_rate: u32, channel_count: u16) -> Result<()> {
        if channel_count != 1 && channel_count != 2 {
            return Err(MixerError::InvalidInput("buffers must be mono or stereo"));
        }
        if sample_count == 0 {
            return Err(MixerError::InvalidInput("buffers must hold at least one sample"));
        }
        if sample_rate == 0 {
            return Err(MixerError::InvalidInput("sample rate must be non-zero"));
        }
        if sample_rate > MAX_SAMPLE_RATE {
            return Err(MixerError::InvalidInput("sample rate is out of range"));
        }
        Ok(())
    }

    /// Number of frames (one value per channel each).
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Native rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 1 for mono, 2 for interleaved stereo.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Raw interleaved values.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Returns the frame at `index` as a stereo pair. Mono frames are
    /// duplicated to both channels.
    #[inline]
    pub fn frame(&self, index: usize) -> Option<(i16, i16)> {
        if index >= self.sample_count {
            return None;
        }
        match self.channel_count {
            1 => {
                let value = self.samples[index];
                Some((value, value))
            }
            _ => Some((self.samples[index * 2], self.samples[index * 2 + 1])),
        }
    }

    /// Playback length in seconds at the buffer's own rate.
    pub fn duration(&self) -> f32 {
        self.sample_count as f32 / self.sample_rate as f32
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("sample_count", &self.sample_count)
            .field("sample_rate", &self.sample_rate)
            .field("channel_count", &self.channel_count)
            .finish()
    }
}

/// Shared, read-only handle to a [`SampleBuffer`].
///
/// Voices only keep a weak reference, so once every handle is gone the
/// buffer stops contributing to the mix.
#[derive(Debug, Clone)]
pub struct BufferHandle(Arc<SampleBuffer>);

impl BufferHandle {
    /// Moves `buffer` behind a shared handle.
    pub fn new(buffer: SampleBuffer) -> Self {
        Self(Arc::new(buffer))
    }

    pub(crate) fn downgrade(&self) -> Weak<SampleBuffer> {
        Arc::downgrade(&self.0)
    }

    /// True when `weak` points at this handle's buffer.
    pub(crate) fn is_target_of(&self, weak: &Weak<SampleBuffer>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.0), weak.as_ptr())
    }

    /// True when both handles share one buffer.
    pub fn ptr_eq(&self, other: &BufferHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for BufferHandle {
    type Target = SampleBuffer;

    fn deref(&self) -> &SampleBuffer {
        &self.0
    }
}

impl From<SampleBuffer> for BufferHandle {
    fn from(value: SampleBuffer) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_little_endian_pcm() {
        let data = bytes(&[1000, -1000, 500, -500]);
        let buffer = SampleBuffer::from_bytes(&data, 4, 44_100, 2, 1).unwrap();
        assert_eq!(buffer.samples(), &[1000, -1000, 500, -500]);
        assert_eq!(buffer.frame(1), Some((-1000, -1000)));
        assert_eq!(buffer.frame(4), None);
    }

    #[test]
    fn stereo_frames_keep_channels_apart() {
        let data = bytes(&[1, 2, 3, 4]);
        let buffer = SampleBuffer::from_bytes(&data, 2, 22_050, 2, 2).unwrap();
        assert_eq!(buffer.frame(1), Some((3, 4)));
        assert!((buffer.duration() - 2.0 / 22_050.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_unsupported_layouts() {
        let data = bytes(&[0; 8]);
        assert!(SampleBuffer::from_bytes(&data, 4, 44_100, 1, 1).is_err());
        assert!(SampleBuffer::from_bytes(&data, 4, 44_100, 2, 3).is_err());
        assert!(SampleBuffer::from_bytes(&data, 0, 44_100, 2, 1).is_err());
        assert!(SampleBuffer::from_bytes(&data, 5, 44_100, 2, 2).is_err());
    }

    #[test]
    fn rejects_rates_beyond_fixed_point_range() {
        let data = bytes(&[0; 4]);
        let err = SampleBuffer::from_bytes(&data, 4, 3_000_000_000, 2, 1).unwrap_err();
        assert!(matches!(err, MixerError::InvalidInput(_)));
        assert!(SampleBuffer::from_bytes(&data, 4, MAX_SAMPLE_RATE, 2, 1).is_ok());
    }

    #[test]
    fn huge_sample_count_is_rejected_not_overflowed() {
        let err = SampleBuffer::from_bytes(&[0; 4], usize::MAX, 44_100, 2, 2).unwrap_err();
        assert!(matches!(err, MixerError::InvalidInput(_)));
        assert!(SampleBuffer::from_bytes(&[0; 4], usize::MAX / 2, 44_100, 2, 1).is_err());
    }

    #[test]
    fn from_samples_drops_partial_frame() {
        let buffer = SampleBuffer::from_samples(vec![1, 2, 3], 8_000, 2).unwrap();
        assert_eq!(buffer.sample_count(), 1);
        assert_eq!(buffer.samples(), &[1, 2]);
    }

    #[test]
    fn handle_identity() {
        let a = BufferHandle::new(SampleBuffer::from_samples(vec![1], 8_000, 1).unwrap());
        let b = a.clone();
        let c = BufferHandle::new(SampleBuffer::from_samples(vec![1], 8_000, 1).unwrap());
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(a.is_target_of(&b.downgrade()));
    }
}
