/// Result alias that carries the custom [`MixerError`] type.
pub type Result<T> = std::result::Result<T, MixerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    /// Free-form failure reported by a subsystem.
    #[error("{0}")]
    Message(String),
    /// Caller supplied parameters that can never be valid, such as a sample
    /// buffer with an unsupported channel layout.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A thread panicked while holding the voice pool lock.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    /// The platform audio device could not be opened or driven.
    #[error("audio device: {0}")]
    Device(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// WAV decoding or encoding failed.
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
    /// Configuration file could not be parsed.
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
}

impl MixerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MixerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MixerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
