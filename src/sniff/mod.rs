//! Telling the Nintendo Opus dialects apart.
//!
//! [`identify`] runs the wrappers in [`DIALECTS`] order. A dialect wins when
//! its extension allow-list accepts the hint, its probe accepts the wrapper
//! and the nested basic info + data chunks it points at are well formed.
//! Everything the decoder needs is then resolved into a [`VariantMatch`].

pub mod dialect;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::container::cursor::u32_le_at;
use crate::container::standard::{HEADER_ID, OGG_ID};
use crate::container::{
    AudioStreamDescriptor, ContextChunk, DataChunk, LoopRange, MultistreamChunk, StandardHeader, PLAYBACK_RATE,
};
use crate::error::{Error, Result};
use crate::layered::LAYER_COUNT;
use crate::packet::toc;

pub use dialect::{Dialect, Probe, DIALECTS};

/// Access to files sharing the stream's base name, e.g. `bgm01.psi` next to
/// `bgm01.opus`.
pub trait SiblingFileLookup {
    /// Contents of the sibling with `extension`, if there is one.
    fn sibling(&self, extension: &str) -> Option<Vec<u8>>;
}

/// For streams that come without companions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSiblings;

impl SiblingFileLookup for NoSiblings {
    fn sibling(&self, _extension: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Siblings keyed by lowercase extension.
impl SiblingFileLookup for HashMap<String, Vec<u8>> {
    fn sibling(&self, extension: &str) -> Option<Vec<u8>> {
        self.get(&extension.to_ascii_lowercase()).cloned()
    }
}

/// A recognized stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantMatch {
    pub dialect: Dialect,
    /// Absolute offset of the nested basic info chunk.
    pub header_offset: usize,
    pub header: StandardHeader,
    pub data: DataChunk,
    /// 6 for layered streams, otherwise the nested header's count.
    pub channel_count: u8,
    /// Three stereo streams interleaved packet by packet.
    pub layered: bool,
    /// Samples per channel after pre-skip, at [`PLAYBACK_RATE`].
    pub sample_count: u32,
    /// Loop used for playback. When enabled, `start < end <= sample_count`.
    pub loop_range: LoopRange,
    /// Loop end exactly as the metadata declared it.
    pub declared_loop_end: i32,
    pub multistream: Option<MultistreamChunk>,
}

impl VariantMatch {
    /// Absolute offset of the first packet.
    pub fn data_offset(&self) -> usize {
        self.data.packets_range().start
    }

    pub fn descriptor(&self) -> AudioStreamDescriptor {
        AudioStreamDescriptor {
            channel_count: self.channel_count,
            sample_rate: self.header.sample_rate,
            pre_skip: self.header.pre_skip,
        }
    }

    /// Channels of each independently coded stream.
    pub fn stream_channels(&self) -> u8 {
        self.header.channel_count
    }
}

/// First dialect accepting `buf`, or `None`.
pub fn identify(buf: &[u8], extension_hint: Option<&str>, siblings: &dyn SiblingFileLookup) -> Option<VariantMatch> {
    DIALECTS.iter().find_map(|dialect| {
        if !dialect.accepts_extension(extension_hint) {
            return None;
        }
        let probe = dialect.probe(buf, siblings).ok()?;
        match resolve(buf, *dialect, &probe) {
            Ok(found) => {
                debug!(%dialect, offset = found.header_offset, "identified");
                Some(found)
            }
            Err(err) => {
                debug!(%dialect, %err, "wrapper matched but nested stream is invalid");
                None
            }
        }
    })
}

/// Like [`identify`], with an error describing why nothing matched.
pub fn open(buf: &[u8], extension_hint: Option<&str>, siblings: &dyn SiblingFileLookup) -> Result<VariantMatch> {
    if let Some(found) = identify(buf, extension_hint, siblings) {
        return Ok(found);
    }
    match u32_le_at(buf, 0x00) {
        Ok(OGG_ID) => Err(Error::OggOpus),
        // a plain stream the extension ruled out, or a broken one: report
        // what is wrong with it rather than a bare "unknown"
        Ok(HEADER_ID) => match Dialect::Standard
            .probe(buf, siblings)
            .and_then(|probe| resolve(buf, Dialect::Standard, &probe))
        {
            Err(err) => Err(err),
            Ok(_) => Err(Error::UnknownVariant),
        },
        _ => Err(Error::UnknownVariant),
    }
}

/// Reads the nested stream a wrapper points at and settles sample count and
/// loop points.
pub fn resolve(buf: &[u8], dialect: Dialect, probe: &Probe) -> Result<VariantMatch> {
    let offset = probe.header_offset;
    let header = StandardHeader::read(buf, offset)?;

    if header.channel_count == 0 {
        return Err(Error::InvalidChannels(0));
    }

    let (layered, channel_count) = match probe.channel_count {
        Some(6) => {
            if header.channel_count != 2 {
                return Err(Error::Unsupported(format!(
                    "layered stream with {} channels per layer",
                    header.channel_count
                )));
            }
            (true, 6)
        }
        Some(wrapper) => {
            if wrapper != header.channel_count as u32 {
                warn!(wrapper, stream = header.channel_count, "channel count mismatch, using the stream's");
            }
            (false, header.channel_count)
        }
        None => (false, header.channel_count),
    };

    let mut sample_count = probe.sample_count;
    let mut loop_start = probe.loop_start;
    let mut loop_end = probe.loop_end;
    let mut loop_flag = loop_end > 0;

    if header.context_offset != 0 {
        match ContextChunk::read(buf, offset + header.context_offset as usize) {
            Ok(context) => {
                // overrides whatever the wrapper said
                loop_flag = context.loop_flag;
                sample_count = context.num_samples;
                loop_start = context.loop_start;
                loop_end = context.loop_end;
            }
            Err(err) => warn!(%err, "context chunk is present but will be ignored"),
        }
    }

    let multistream = MultistreamChunk::find(buf, offset, header.channel_count)?;

    if header.sample_rate != PLAYBACK_RATE {
        // some games store the original rate [Grandia HD Collection, Lego Marvel]
        debug!(sample_rate = header.sample_rate, "non-standard sample rate, decoding at {PLAYBACK_RATE}");
    }

    let data = DataChunk::read(buf, offset + header.data_offset as usize)?;

    let declared_loop_end = loop_end;
    let sample_count = if sample_count <= 0 {
        let layers = if layered { LAYER_COUNT } else { 1 };
        let counted = count_samples(buf, &data, layers)?.saturating_sub(header.playback_pre_skip());
        if sample_count < 0 && loop_end > 0 && loop_end as u32 > counted {
            debug!(loop_end, counted, "loop end past the stream, clamping playback loop");
            loop_end = counted as i32;
        }
        counted
    } else {
        sample_count as u32
    };

    let mut loop_range = if loop_flag {
        LoopRange::new(loop_start.max(0) as u32, loop_end.max(0) as u32)
    } else {
        LoopRange::DISABLED
    };
    if loop_range.enabled && (loop_range.start >= loop_range.end || loop_range.end > sample_count) {
        warn!(
            start = loop_range.start,
            end = loop_range.end,
            sample_count,
            "loop points out of range, looping disabled"
        );
        loop_range = LoopRange::DISABLED;
    }

    Ok(VariantMatch {
        dialect,
        header_offset: offset,
        header,
        data,
        channel_count,
        layered,
        sample_count,
        loop_range,
        declared_loop_end,
        multistream,
    })
}

/// Samples per channel in a data chunk according to the packet TOCs. For
/// layered streams only the first layer is counted.
pub fn count_samples(buf: &[u8], data: &DataChunk, layers: usize) -> Result<u32> {
    let mut total = 0u32;
    for (index, packet) in data.packets(buf).enumerate().step_by(layers) {
        let packet = packet?;
        let samples = toc::packet_samples(packet.payload).map_err(|reason| Error::MalformedPacket { index, reason })?;
        total = total.saturating_add(samples);
    }
    Ok(total)
}
