//! Error types shared by the container model, the sniffer and the builders.
//!
//! Everything in here is fatal for the conversion that raised it. Advisory
//! conditions (clamped loops, ignored chunks, missed packet targets) are only
//! logged and never surface as an [`Error`].

use thiserror::Error;

use crate::packet::toc;

/// Nintendo Opus container errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Fewer bytes are available than the field requires.
    #[error("Truncated buffer: need {needed} bytes at offset 0x{offset:x}, have {available}")]
    TruncatedBuffer {
        /// Offset of the field that was being read.
        offset: usize,
        /// Number of bytes the field needs.
        needed: usize,
        /// Number of bytes left in the buffer from `offset`.
        available: usize,
    },

    /// Expected chunk tag absent.
    #[error("Chunk at offset 0x{offset:x} has ID 0x{found:08x}, expected 0x{expected:08x}")]
    MagicMismatch {
        /// Offset of the chunk.
        offset: usize,
        /// ID the chunk should carry.
        expected: u32,
        /// ID actually found.
        found: u32,
    },

    /// A regular Ogg Opus file was passed where a Nintendo one was expected.
    #[error("Ogg Opus stream found; a Nintendo Opus container is required")]
    OggOpus,

    /// Sample rate outside of what Opus supports.
    #[error("Invalid sample rate: {0} Hz (must be 8000, 12000, 16000, 24000, or 48000)")]
    InvalidSampleRate(u32),

    /// Channel count the container or builder cannot carry.
    #[error("Invalid channel count: {0}")]
    InvalidChannels(u32),

    /// No dialect in the sniffer chain accepted the buffer.
    #[error("Unrecognized Nintendo Opus variant")]
    UnknownVariant,

    /// Opus packet with a malformed TOC.
    #[error("Malformed Opus packet #{index}: {reason:?}")]
    MalformedPacket {
        /// Index of the packet in its data chunk.
        index: usize,
        /// TOC parser failure.
        reason: toc::Error,
    },

    /// Structure that parses but cannot be handled.
    #[error("Unsupported stream: {0}")]
    Unsupported(String),

    /// Codec engine failure (initialization, encode, decode or a CTL request).
    #[error("Codec engine error: {0}")]
    Codec(String),

    /// One sub-stream of a layered stream failed; the whole operation aborts.
    #[error("Layer {index} failed: {source}")]
    Layer {
        /// Index of the failing layer.
        index: usize,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;
