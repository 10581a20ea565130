//! Encoding PCM into containers.
//!
//! [`standard`] writes a plain Nintendo Opus stream, [`capcom`] the Capcom
//! wrapper with optional packet size matching against a reference file.
//! Both are generic over the codec [`Engine`](crate::codec::Engine).

pub mod capcom;
pub mod standard;

use std::borrow::Cow;

use crate::codec::FrameEncoder;
use crate::container::Packet;
use crate::error::Result;

pub use capcom::{CapcomOptions, ReferenceFile};

/// What happens to samples that do not fill a whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tail {
    Drop,
    /// Zero-fill up to a full frame.
    Pad,
}

/// Cuts interleaved `pcm` into frames of `frame_samples` per channel.
pub(crate) fn split_frames(pcm: &[i16], channels: usize, frame_samples: usize, tail: Tail) -> Vec<Cow<'_, [i16]>> {
    let frame_len = frame_samples * channels;
    if frame_len == 0 {
        return Vec::new();
    }

    let mut chunks = pcm.chunks_exact(frame_len);
    let mut frames: Vec<Cow<'_, [i16]>> = chunks.by_ref().map(Cow::Borrowed).collect();

    let rest = chunks.remainder();
    if tail == Tail::Pad && !rest.is_empty() {
        let mut padded = rest.to_vec();
        padded.resize(frame_len, 0);
        frames.push(Cow::Owned(padded));
    }
    frames
}

/// Encodes one frame and pairs it with the encoder's final range.
pub(crate) fn encode_frame<F: FrameEncoder>(encoder: &mut F, frame: &[i16], frame_samples: usize) -> Result<Packet> {
    let payload = encoder.encode(frame, frame_samples)?;
    let final_range = encoder.final_range()?;
    Ok(Packet { payload, final_range })
}
