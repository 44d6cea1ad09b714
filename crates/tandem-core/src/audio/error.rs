//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while starting or running the audio system
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio output devices available
    #[error("no audio output devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("failed to get default audio device")]
    NoDefaultDevice,

    /// Named device not found
    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get device configuration
    #[error("failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
