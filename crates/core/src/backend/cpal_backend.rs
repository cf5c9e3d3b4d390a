use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::{MixerConfig, MixerError, RenderHandle, Result};

use super::AudioBackend;

/// Plays through the host's default output device. The device's real-time
/// thread calls [`RenderHandle::provide`] for every buffer it needs.
#[derive(Default)]
pub struct CpalBackend {
    stream: Option<cpal::Stream>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn start(&mut self, source: RenderHandle, config: &MixerConfig) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MixerError::Device("no default output device".to_string()))?;

        let stream_config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_frames as u32),
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| source.provide(data),
                |err| tracing::error!(%err, "output stream error"),
                None,
            )
            .map_err(|err| MixerError::Device(err.to_string()))?;
        stream
            .play()
            .map_err(|err| MixerError::Device(err.to_string()))?;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            rate = config.sample_rate,
            frames = config.buffer_frames,
            "opened output stream"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                tracing::warn!(%err, "failed to pause output stream");
            }
        }
    }
}
