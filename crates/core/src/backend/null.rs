use crate::{MixerConfig, RenderHandle, Result};

use super::AudioBackend;

/// Backend without a device. Nothing pulls samples on its own; callers
/// render through [`crate::SoundPlayer::render`] or the stored handle.
#[derive(Debug, Default)]
pub struct NullBackend {
    source: Option<RenderHandle>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.source.is_some()
    }

    /// Handle received from the player on `start`.
    pub fn source(&self) -> Option<&RenderHandle> {
        self.source.as_ref()
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn start(&mut self, source: RenderHandle, _config: &MixerConfig) -> Result<()> {
        self.source = Some(source);
        Ok(())
    }

    fn stop(&mut self) {
        self.source = None;
    }
}
