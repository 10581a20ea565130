//! Just enough RIFF/WAVE for 16-bit PCM.

use anyhow::{bail, ensure, Context, Result};
use byteorder::{ByteOrder, LittleEndian};

const RIFF: &[u8; 4] = b"RIFF";
const WAVE: &[u8; 4] = b"WAVE";
const FMT: &[u8; 4] = b"fmt ";
const DATA: &[u8; 4] = b"data";
const FORMAT_PCM: u16 = 0x0001;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;
const HEADER_SIZE: usize = 44;

pub struct Wav {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved.
    pub samples: Vec<i16>,
}

impl Wav {
    pub fn samples_per_channel(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure!(buf.len() >= 12 && &buf[0..4] == RIFF && &buf[8..12] == WAVE, "not a RIFF/WAVE file");

        let mut format = None;
        let mut offset = 12;
        while offset + 8 <= buf.len() {
            let id = &buf[offset..offset + 4];
            let size = LittleEndian::read_u32(&buf[offset + 4..offset + 8]) as usize;
            let body = buf
                .get(offset + 8..offset + 8 + size)
                // some writers leave the data size too large
                .or_else(|| (id == DATA).then(|| &buf[offset + 8..]))
                .with_context(|| format!("chunk {} at 0x{offset:x} is truncated", String::from_utf8_lossy(id)))?;

            if id == FMT {
                ensure!(body.len() >= 16, "fmt chunk too small");
                let tag = LittleEndian::read_u16(&body[0..2]);
                let channels = LittleEndian::read_u16(&body[2..4]);
                let sample_rate = LittleEndian::read_u32(&body[4..8]);
                let bits = LittleEndian::read_u16(&body[14..16]);
                if !matches!(tag, FORMAT_PCM | FORMAT_EXTENSIBLE) || bits != 16 {
                    bail!("only 16-bit PCM is supported (format 0x{tag:04x}, {bits} bits)");
                }
                ensure!(channels > 0, "WAV has no channels");
                format = Some((channels, sample_rate));
            } else if id == DATA {
                let (channels, sample_rate) = format.context("data chunk before fmt chunk")?;
                let mut samples = vec![0i16; body.len() / 2];
                LittleEndian::read_i16_into(&body[..samples.len() * 2], &mut samples);
                return Ok(Self {
                    channels,
                    sample_rate,
                    samples,
                });
            }

            // chunks are word aligned
            offset += 8 + size + (size & 1);
        }

        bail!("WAV has no data chunk")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let data_size = self.samples.len() * 2;
        let block_align = self.channels * 2;

        let mut out = vec![0u8; HEADER_SIZE + data_size];
        out[0..4].copy_from_slice(RIFF);
        LittleEndian::write_u32(&mut out[4..8], (HEADER_SIZE - 8 + data_size) as u32);
        out[8..12].copy_from_slice(WAVE);

        out[12..16].copy_from_slice(FMT);
        LittleEndian::write_u32(&mut out[16..20], 16);
        LittleEndian::write_u16(&mut out[20..22], FORMAT_PCM);
        LittleEndian::write_u16(&mut out[22..24], self.channels);
        LittleEndian::write_u32(&mut out[24..28], self.sample_rate);
        LittleEndian::write_u32(&mut out[28..32], self.sample_rate * block_align as u32);
        LittleEndian::write_u16(&mut out[32..34], block_align);
        LittleEndian::write_u16(&mut out[34..36], 16);

        out[36..40].copy_from_slice(DATA);
        LittleEndian::write_u32(&mut out[40..44], data_size as u32);
        LittleEndian::write_i16_into(&self.samples, &mut out[HEADER_SIZE..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_parse() {
        let wav = Wav {
            channels: 2,
            sample_rate: 48000,
            samples: vec![1, -1, 300, -300],
        };
        let parsed = Wav::parse(&wav.to_bytes()).unwrap();
        assert_eq!(parsed.channels, 2);
        assert_eq!(parsed.sample_rate, 48000);
        assert_eq!(parsed.samples, wav.samples);
        assert_eq!(parsed.samples_per_channel(), 2);
    }

    #[test]
    fn skips_unknown_chunks() {
        let wav = Wav {
            channels: 1,
            sample_rate: 24000,
            samples: vec![5, 6, 7],
        };
        let bytes = wav.to_bytes();
        let mut patched = bytes[..36].to_vec();
        patched.extend_from_slice(b"LIST\x03\x00\x00\x00abc\x00");
        patched.extend_from_slice(&bytes[36..]);

        assert_eq!(Wav::parse(&patched).unwrap().samples, [5, 6, 7]);
    }

    #[test]
    fn rejects_float() {
        let mut bytes = Wav {
            channels: 1,
            sample_rate: 48000,
            samples: vec![0],
        }
        .to_bytes();
        bytes[20] = 3;
        assert!(Wav::parse(&bytes).is_err());
    }
}
