//! Unified error types for sf2synth

use std::fmt;
use std::path::PathBuf;

/// Result type for sf2synth operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all sf2synth operations
#[derive(Debug)]
pub enum Error {
    /// The SoundFont file could not be opened or read
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The outermost RIFF chunk was missing or its magic did not match `RIFF....sfbk`
    InvalidRiff(String),
    /// `ifil` reported a major/minor version newer than this parser supports
    UnsupportedVersion { major: u16, minor: u16 },
    /// A `pdta` sub-chunk's byte length was not a multiple of its record size,
    /// or a required sub-chunk was missing
    MalformedChunk(String),
    /// `find_preset` exhausted its fallback ladder
    PresetNotFound { bank: u16, program: u8 },
    /// A channel index passed to the synthesizer was outside `0..channel_count`
    InvalidChannel(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { path, source } => {
                write!(f, "failed to read soundfont '{}': {}", path.display(), source)
            }
            Error::InvalidRiff(msg) => write!(f, "not a valid SoundFont RIFF file: {}", msg),
            Error::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported SoundFont version {}.{}", major, minor)
            }
            Error::MalformedChunk(msg) => write!(f, "malformed SoundFont chunk: {}", msg),
            Error::PresetNotFound { bank, program } => {
                write!(f, "failed to find preset {}:{}", bank, program)
            }
            Error::InvalidChannel(index) => write!(f, "invalid channel index: {}", index),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
