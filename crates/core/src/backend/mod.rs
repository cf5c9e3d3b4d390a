//! Platform audio backends that drive a [`RenderHandle`].

use crate::{MixerConfig, RenderHandle, Result};

#[cfg(feature = "cpal")]
mod cpal_backend;
mod null;

#[cfg(feature = "cpal")]
pub use cpal_backend::CpalBackend;
pub use null::NullBackend;

/// Backend interface used by [`crate::SoundPlayer`].
pub trait AudioBackend {
    /// Short identifier used in log output.
    fn name(&self) -> &'static str;
    /// Begins pulling stereo 16-bit frames from `source` at the configured
    /// rate and buffer size.
    fn start(&mut self, source: RenderHandle, config: &MixerConfig) -> Result<()>;
    /// Stops pulling and releases the device.
    fn stop(&mut self);
}
