//! Crate-wide error type and the CLI exit codes that map onto it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("password is empty")]
    EmptyPassword,

    #[error("input file not found: {0}")]
    FileNotFound(std::path::PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("container parse error: {0}")]
    Format(String),

    #[error("no usable HEVC video track / AAC audio track found")]
    MissingTrack,

    #[error("HEVC parameter sets (VPS/SPS/PPS) absent from stsd")]
    MissingHevcParameterSets,

    #[error("AudioSpecificConfig bytes absent from esds")]
    MissingAudioSpecificConfig,

    #[error("presentation window creation failed: {0}")]
    WindowInit(String),

    #[error("presentation renderer creation failed: {0}")]
    RendererInit(String),

    #[error("presentation texture creation failed: {0}")]
    TextureInit(String),

    #[error("audio output initialization failed: {0}")]
    AudioInit(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl PlayerError {
    /// Exit code for the CLI front-end, per the external-interfaces table.
    pub fn exit_code(&self) -> i32 {
        match self {
            PlayerError::EmptyPassword => 2,
            PlayerError::FileNotFound(_) => 3,
            PlayerError::Io(_) | PlayerError::Decrypt(_) => 4,
            PlayerError::Format(_) => 5,
            PlayerError::MissingTrack | PlayerError::AudioInit(_) => 6,
            PlayerError::MissingHevcParameterSets => 7,
            PlayerError::MissingAudioSpecificConfig => 8,
            PlayerError::WindowInit(_) => 9,
            PlayerError::RendererInit(_) => 10,
            PlayerError::TextureInit(_) => 11,
            PlayerError::Codec(_) => 1,
        }
    }
}
