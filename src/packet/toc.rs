use bitvec::prelude::*;

pub use super::config::*;

/// Code or type of packet. Dictates how many frames the packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    /// One frame.
    Code0 = 0,
    /// Two frames, equal size.
    Code1 = 1,
    /// Two frames, variable size.
    Code2 = 2,
    /// Arbitrary number of frames, count in the second byte.
    Code3 = 3,
}

impl From<u8> for Code {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => Code::Code0,
            1 => Code::Code1,
            2 => Code::Code2,
            _ => Code::Code3,
        }
    }
}

/// What the TOC (and for Code 3, the frame count byte) says about a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toc {
    pub config: Config,
    pub is_stereo: bool,
    pub code: Code,
    /// Number of frames in the packet.
    pub num_frames: u32,
}

impl Toc {
    /// Samples per channel the packet decodes to, at 48 kHz.
    pub fn samples(&self) -> u32 {
        self.config.frame_samples * self.num_frames
    }
}

/// A violation of the packet rules in [RFC 6716, Sec 3.4][1].
///
/// [1]: https://datatracker.ietf.org/doc/html/rfc6716#section-3.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No TOC exists in the packet.
    NoToc,
    /// Code 3 packet without its frame count byte.
    PacketTooSmall,
    /// Code 3 packet having zero audio frames.
    ///
    /// Note: Only thrown if `strict` feature is enabled.
    NoAudio,
    /// Packet exceeding the maximum duration of 120 ms.
    ///
    /// Note: Only thrown if `strict` feature is enabled.
    TooMuchAudio,
}

/// Reads the TOC of a non-self-delimiting Opus packet.
pub fn parse(packet: &[u8]) -> Result<Toc, Error> {
    let Some(&first) = packet.first() else {
        return Err(Error::NoToc);
    };

    //  0 1 2 3 4 5 6 7
    // +-+-+-+-+-+-+-+-+
    // | config  |s| c |
    // +-+-+-+-+-+-+-+-+
    let toc = first.view_bits::<Msb0>();

    let config = OPUS_CONFIG_TABLE[toc[..5].load_be::<usize>()];
    let is_stereo = toc[5];
    let code = Code::from(toc[6..].load_be::<u8>());

    let num_frames = match code {
        Code::Code0 => 1,
        Code::Code1 | Code::Code2 => 2,
        Code::Code3 => {
            //  0 1 2 3 4 5 6 7
            // +-+-+-+-+-+-+-+-+
            // |v|p|     M     |
            // +-+-+-+-+-+-+-+-+
            let fcb = packet.get(1).ok_or(Error::PacketTooSmall)?.view_bits::<Msb0>();
            fcb[2..].load_be::<u32>()
        }
    };

    #[cfg(feature = "strict")]
    if num_frames == 0 {
        return Err(Error::NoAudio);
    }

    // At most 120 ms of audio per packet, i.e. 5760 samples at 48 kHz.
    #[cfg(feature = "strict")]
    if config.frame_samples * num_frames > 5760 {
        return Err(Error::TooMuchAudio);
    }

    Ok(Toc {
        config,
        is_stereo,
        code,
        num_frames,
    })
}

/// Samples per channel (at 48 kHz) carried by `packet`.
pub fn packet_samples(packet: &[u8]) -> Result<u32, Error> {
    parse(packet).map(|toc| toc.samples())
}
