use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{BufferHandle, MixerError, Result, SampleBuffer, SoundPlayer};

/// Decodes a WAV file into a 16-bit [`SampleBuffer`]. Integer formats of any
/// width are requantised to 16 bits and float samples are scaled from
/// `[-1.0, 1.0]`.
pub fn decode_wav(path: &Path) -> Result<SampleBuffer> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels != 1 && spec.channels != 2 {
        return Err(MixerError::InvalidInput("only mono and stereo WAV files are supported"));
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = u32::from(spec.bits_per_sample);
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| requantise(value, bits)))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map(|value| (value.clamp(-1.0, 1.0) * 32_767.0) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    SampleBuffer::from_samples(samples, spec.sample_rate, spec.channels)
}

fn requantise(value: i32, bits: u32) -> i16 {
    if bits > 16 {
        (value >> (bits - 16)) as i16
    } else {
        (value << (16 - bits)) as i16
    }
}

/// Owns decoded sounds keyed by the path they were loaded from.
#[derive(Debug, Default)]
pub struct SoundCache {
    entries: HashMap<PathBuf, BufferHandle>,
}

impl SoundCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached buffer for `path`, decoding it on first use.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<BufferHandle> {
        let path = path.as_ref();
        if let Some(handle) = self.entries.get(path) {
            return Ok(handle.clone());
        }

        let buffer = decode_wav(path).map_err(|err| {
            tracing::warn!(path = %path.display(), %err, "failed to decode sound");
            err
        })?;
        tracing::debug!(
            path = %path.display(),
            samples = buffer.sample_count(),
            rate = buffer.sample_rate(),
            "loaded sound"
        );

        let handle = BufferHandle::new(buffer);
        self.entries.insert(path.to_path_buf(), handle.clone());
        Ok(handle)
    }

    /// Cached buffer for `path`, without decoding.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<BufferHandle> {
        self.entries.get(path.as_ref()).cloned()
    }

    /// Drops the entry for `path`, stopping any voice still playing it.
    pub fn unload(&mut self, path: impl AsRef<Path>, player: &SoundPlayer) -> Result<bool> {
        match self.entries.remove(path.as_ref()) {
            Some(handle) => {
                player.destroy_buffer(handle)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Destroys every cached buffer through `player`.
    pub fn clear(&mut self, player: &SoundPlayer) -> Result<()> {
        for (_, handle) in self.entries.drain() {
            player.destroy_buffer(handle)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MixerConfig;

    fn write_wav(name: &str, spec: hound::WavSpec, values: &[i32]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("voice-mixer-{}-{name}.wav", std::process::id()));
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &value in values {
            match spec.bits_per_sample {
                8 => writer.write_sample(value as i8).unwrap(),
                16 => writer.write_sample(value as i16).unwrap(),
                _ => writer.write_sample(value).unwrap(),
            }
        }
        writer.finalize().unwrap();
        path
    }

    fn spec(channels: u16, bits: u16) -> hound::WavSpec {
        hound::WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn decodes_16_bit_stereo() {
        let path = write_wav("stereo16", spec(2, 16), &[100, -100, 200, -200]);
        let buffer = decode_wav(&path).unwrap();
        assert_eq!(buffer.sample_count(), 2);
        assert_eq!(buffer.sample_rate(), 22_050);
        assert_eq!(buffer.frame(1), Some((200, -200)));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn requantises_24_bit_samples() {
        let path = write_wav("mono24", spec(1, 24), &[0x12_3400, -0x10_0000]);
        let buffer = decode_wav(&path).unwrap();
        assert_eq!(buffer.samples(), &[0x1234, -0x1000]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut cache = SoundCache::new();
        assert!(cache.load("/definitely/not/here.wav").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn loads_once_and_unloads_through_player() {
        let path = write_wav("cached", spec(1, 8), &[1, 2, 3, 4]);
        let mut cache = SoundCache::new();
        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.samples()[0], 1 << 8);
        drop(second);

        let player = SoundPlayer::with_null_backend(MixerConfig::default()).unwrap();
        let id = player.play_sound(&first, 1.0, true).unwrap().unwrap();
        drop(first);
        assert!(player.is_playing(id).unwrap());

        assert!(cache.unload(&path, &player).unwrap());
        assert!(!player.is_playing(id).unwrap());
        assert!(!cache.unload(&path, &player).unwrap());
        std::fs::remove_file(path).ok();
    }
}
