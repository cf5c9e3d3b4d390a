use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    backend::{AudioBackend, NullBackend},
    music::{AudioStream, MusicChannel, PcmStream, ResampleStream},
    BufferHandle, Mixer, MixerConfig, MixerError, PlayId, Result, SampleBuffer, VoicePool,
};

/// Everything the audio callback touches. Guarded by a single lock shared
/// between the control thread and the callback.
#[derive(Debug)]
struct PlayerState {
    pool: VoicePool,
    mixer: Mixer,
    music: MusicChannel,
}

/// Explicitly owned sound engine: a voice pool, a music channel and the
/// backend that pulls mixed output from them.
pub struct SoundPlayer {
    config: MixerConfig,
    shared: Arc<Mutex<PlayerState>>,
    backend: Box<dyn AudioBackend>,
    running: bool,
}

impl SoundPlayer {
    /// Builds a stopped player. Call [`Self::init`] to start the backend.
    pub fn new(config: MixerConfig, backend: Box<dyn AudioBackend>) -> Result<Self> {
        config.validate()?;
        let state = PlayerState {
            pool: VoicePool::with_capacity(config.voice_count),
            mixer: Mixer::with_capacity(config.buffer_frames),
            music: MusicChannel::new(config.music_volume),
        };
        Ok(Self {
            config,
            shared: Arc::new(Mutex::new(state)),
            backend,
            running: false,
        })
    }

    /// Creates a player whose output is only produced by [`Self::render`].
    pub fn with_null_backend(config: MixerConfig) -> Result<Self> {
        Self::new(config, Box::new(NullBackend::new()))
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts the backend. A failure leaves the player usable for offline
    /// rendering.
    pub fn init(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }

        let handle = self.render_handle();
        if let Err(err) = self.backend.start(handle, &self.config) {
            tracing::error!(backend = self.backend.name(), %err, "failed to start audio output");
            return Err(err);
        }

        self.running = true;
        tracing::info!(
            backend = self.backend.name(),
            voices = self.config.voice_count,
            rate = self.config.sample_rate,
            "sound player started"
        );
        Ok(())
    }

    /// Stops the backend, every voice and the music stream.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.running {
            self.backend.stop();
            self.running = false;
        }

        let music = {
            let mut state = self.lock_state()?;
            state.pool.stop_all();
            state.music.close()
        };
        drop(music);

        tracing::info!(backend = self.backend.name(), "sound player shut down");
        Ok(())
    }

    /// Builds a shared buffer from raw little-endian PCM. See
    /// [`SampleBuffer::from_bytes`] for the accepted layouts.
    pub fn create_buffer(
        &self,
        data: &[u8],
        sample_count: usize,
        sample_rate: u32,
        channel_size: usize,
        channel_count: u16,
    ) -> Result<BufferHandle> {
        let buffer =
            SampleBuffer::from_bytes(data, sample_count, sample_rate, channel_size, channel_count)?;
        Ok(BufferHandle::new(buffer))
    }

    /// Stops every voice reading `buffer` and releases this handle.
    pub fn destroy_buffer(&self, buffer: BufferHandle) -> Result<()> {
        let stopped = self.stop_sounds_for_buffer(&buffer)?;
        tracing::debug!(stopped, "destroyed buffer");
        drop(buffer);
        Ok(())
    }

    /// Starts playback of `buffer`. `Ok(None)` means no voice could be
    /// freed because every active voice is looping.
    pub fn play_sound(&self, buffer: &BufferHandle, volume: f32, looping: bool) -> Result<Option<PlayId>> {
        let id = {
            let mut state = self.lock_state()?;
            state
                .pool
                .allocate(buffer, volume, looping, self.config.sample_rate)
        };

        if id.is_none() {
            tracing::warn!("no voice available, dropping sound");
        }
        Ok(id)
    }

    /// Stops `id`. Returns false when it was no longer playing.
    pub fn stop_sound(&self, id: PlayId) -> Result<bool> {
        Ok(self.lock_state()?.pool.stop(id))
    }

    /// Stops every voice reading `buffer` and returns how many there were.
    pub fn stop_sounds_for_buffer(&self, buffer: &BufferHandle) -> Result<usize> {
        Ok(self.lock_state()?.pool.stop_buffer(buffer))
    }

    /// Frees every voice under a single lock acquisition.
    pub fn stop_all_sounds(&self) -> Result<()> {
        self.lock_state()?.pool.stop_all();
        Ok(())
    }

    /// Changes the volume of a playing sound.
    pub fn set_sound_volume(&self, id: PlayId, volume: f32) -> Result<bool> {
        Ok(self.lock_state()?.pool.set_volume(id, volume))
    }

    /// True while `id` is still producing output.
    pub fn is_playing(&self, id: PlayId) -> Result<bool> {
        Ok(self.lock_state()?.pool.is_playing(id))
    }

    pub fn active_voices(&self) -> Result<usize> {
        Ok(self.lock_state()?.pool.active_count())
    }

    /// Decodes a WAV file and plays it as the music track, replacing any
    /// current one.
    pub fn play_music(&self, path: impl AsRef<Path>, looping: bool) -> Result<()> {
        let path = path.as_ref();
        let stream = PcmStream::open(path, looping)?;
        tracing::info!(path = %path.display(), looping, "opening music");
        self.play_music_stream(stream)
    }

    /// Plays an arbitrary stream as the music track, converting its rate to
    /// the output rate when they differ.
    pub fn play_music_stream<S: AudioStream + 'static>(&self, stream: S) -> Result<()> {
        let stream: Box<dyn AudioStream> = if stream.sample_rate() == self.config.sample_rate {
            Box::new(stream)
        } else {
            Box::new(ResampleStream::new(stream, self.config.sample_rate))
        };

        let previous = self.lock_state()?.music.open(stream);
        drop(previous);
        Ok(())
    }

    /// Closes the music track. It is dropped after the lock is released.
    pub fn stop_music(&self) -> Result<()> {
        let previous = self.lock_state()?.music.close();
        if previous.is_some() {
            tracing::info!("music stopped");
        }
        Ok(())
    }

    /// Sets the linear music volume.
    pub fn set_music_volume(&self, volume: f32) -> Result<()> {
        self.lock_state()?.music.set_volume(volume);
        Ok(())
    }

    /// Mixes `out.len() / 2` interleaved stereo frames on the calling thread.
    pub fn render(&self, out: &mut [i16]) {
        self.render_handle().provide(out);
    }

    /// Handle for the thread that consumes audio.
    pub fn render_handle(&self) -> RenderHandle {
        RenderHandle::new(self.shared.clone())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, PlayerState>> {
        self.shared
            .lock()
            .map_err(|_| MixerError::Poisoned("voice pool"))
    }
}

impl Drop for SoundPlayer {
    fn drop(&mut self) {
        if self.running {
            self.backend.stop();
        }
    }
}

impl std::fmt::Debug for SoundPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundPlayer")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("running", &self.running)
            .finish()
    }
}

/// Shared, thread-safe entry point for the audio callback.
#[derive(Clone)]
pub struct RenderHandle {
    shared: Arc<Mutex<PlayerState>>,
}

impl RenderHandle {
    fn new(shared: Arc<Mutex<PlayerState>>) -> Self {
        Self { shared }
    }

    /// Fills `out` with interleaved stereo frames. Never fails: a poisoned
    /// lock produces silence.
    pub fn provide(&self, out: &mut [i16]) {
        match self.shared.lock() {
            Ok(mut guard) => {
                let state = &mut *guard;
                state.mixer.mix(&mut state.pool, &mut state.music, out);
            }
            Err(_) => out.fill(0),
        }
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle").finish()
    }
}
