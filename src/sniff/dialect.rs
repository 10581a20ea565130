//! Vendor wrappers around the Nintendo Opus basic info chunk.
//!
//! Each probe only looks at the wrapper: magic values, where the nested
//! basic info chunk starts and whatever sample/loop numbers the vendor put
//! in front. Validating the nested chunk is left to the caller.

use std::fmt;

use crate::container::cursor::{i32_be_at, i32_le_at, u32_be_at, u32_le_at, u8_at};
use crate::container::standard::HEADER_ID;
use crate::error::{Error, Result};

use super::SiblingFileLookup;

/// Nested basic info chunk ID as seen by a big-endian read.
const HEADER_ID_BE: u32 = HEADER_ID.swap_bytes();

/// Known container dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Plain Nintendo header + raw data [Lego City Undercover (Switch)].
    Standard,
    /// Nippon1 [Disgaea 5 (Switch)].
    Nippon1,
    /// Capcom [Ultra Street Fighter II (Switch), Resident Evil: Revelations (Switch)].
    Capcom,
    /// Procyon Studio `sadf` [Xenoblade Chronicles 2 (Switch)].
    Procyon,
    /// Shin'en [Fast RMX (Switch)].
    Shinen,
    /// Bandai Namco, found in NUS3Banks [Taiko no Tatsujin (Switch)].
    Nus3,
    /// Nippon Ichi SPS, non-segmented [Ys VIII (Switch)].
    SpsN1,
    /// AQUASTYLE [Touhou Genso Wanderer -Reloaded- (Switch)].
    Opusx,
    /// Prototype [Clannad (Switch)].
    Prototype,
    /// Edelweiss [Astebreed (Switch)].
    OpusNx,
    /// Edelweiss [Sakuna: Of Rice and Ruin (Switch)].
    NsOpus,
    /// Square Enix [Dragon Quest I-III (Switch)].
    Sqex,
    /// Idea Factory(?) [Birushana: Ichijuu no Kaze (Switch)].
    Rsnd,
}

/// Probe order. Several dialects share their leading magic (`OPUS` alone
/// opens three of them), so earlier entries win.
pub const DIALECTS: [Dialect; 13] = [
    Dialect::Standard,
    Dialect::Nippon1,
    Dialect::Capcom,
    Dialect::Procyon,
    Dialect::Shinen,
    Dialect::Nus3,
    Dialect::SpsN1,
    Dialect::Opusx,
    Dialect::Prototype,
    Dialect::OpusNx,
    Dialect::NsOpus,
    Dialect::Sqex,
    Dialect::Rsnd,
];

/// What a wrapper says about the stream it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Absolute offset of the nested basic info chunk.
    pub header_offset: usize,
    /// 0 if unknown, negative to flag "count it and allow a loop end past it".
    pub sample_count: i32,
    pub loop_start: i32,
    /// 0 when the stream does not loop.
    pub loop_end: i32,
    /// Channel count from the wrapper, only Capcom has one.
    pub channel_count: Option<u32>,
}

impl Probe {
    fn at(header_offset: usize) -> Self {
        Self {
            header_offset,
            sample_count: 0,
            loop_start: 0,
            loop_end: 0,
            channel_count: None,
        }
    }

    fn samples(self, sample_count: i32) -> Self {
        Self { sample_count, ..self }
    }

    fn looping(self, loop_start: i32, loop_end: i32) -> Self {
        Self {
            loop_start,
            loop_end,
            ..self
        }
    }
}

fn is_id(buf: &[u8], offset: usize, id: &[u8]) -> bool {
    buf.get(offset..offset + id.len()) == Some(id)
}

fn mismatch() -> Error {
    Error::UnknownVariant
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Standard => "Nintendo Opus",
            Dialect::Nippon1 => "Nippon1 Opus",
            Dialect::Capcom => "Capcom Opus",
            Dialect::Procyon => "Procyon Studio Opus",
            Dialect::Shinen => "Shin'en Opus",
            Dialect::Nus3 => "Bandai Namco NUS3 Opus",
            Dialect::SpsN1 => "Nippon Ichi SPS Opus",
            Dialect::Opusx => "AQUASTYLE Opus",
            Dialect::Prototype => "Prototype Opus",
            Dialect::OpusNx => "Edelweiss OPUSNX",
            Dialect::NsOpus => "Edelweiss EWNO",
            Dialect::Sqex => "Square Enix Opus",
            Dialect::Rsnd => "RSND Opus",
        }
    }

    /// File extensions the dialect is seen with.
    ///
    /// `.lopus`, `.logg` and `.lwav` are the renamed forms players use.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            // .bgm: Cotton Reboot, .opu: Ys Memoire, .ogg: Trouble Witches Origin,
            // .opusnx: Sweet Cafe Collection
            Dialect::Standard => &["opus", "lopus", "bgm", "opu", "ogg", "logg", "opusnx"],
            Dialect::Procyon => &["nop"],
            // .nlsd: Disgaea Refine, .at9: Void Terrarium, .opus: Asatsugutori
            Dialect::SpsN1 => &["sps", "nlsd", "at9", "opus", "lopus"],
            Dialect::Opusx => &["opusx"],
            Dialect::NsOpus => &["nsopus"],
            Dialect::Sqex => &["wav", "lwav"],
            Dialect::Rsnd => &["rsnd"],
            Dialect::Nippon1
            | Dialect::Capcom
            | Dialect::Shinen
            | Dialect::Nus3
            | Dialect::Prototype
            | Dialect::OpusNx => &["opus", "lopus"],
        }
    }

    /// No hint means the extension is not checked.
    pub fn accepts_extension(&self, hint: Option<&str>) -> bool {
        match hint {
            None => true,
            Some(ext) => self.extensions().iter().any(|known| known.eq_ignore_ascii_case(ext)),
        }
    }

    /// Checks the wrapper magic and reads its fields. Any error means the
    /// dialect does not apply.
    pub fn probe(&self, buf: &[u8], siblings: &dyn SiblingFileLookup) -> Result<Probe> {
        match self {
            Dialect::Standard => {
                if u32_le_at(buf, 0x00)? != HEADER_ID {
                    return Err(mismatch());
                }
                Ok(psi_metadata(siblings).unwrap_or(Probe::at(0x00)))
            }

            Dialect::Nippon1 => {
                let (a, b) = (u32_be_at(buf, 0x04)?, u32_be_at(buf, 0x0C)?);
                if !((a == 0 && b == 0) || (a == u32::MAX && b == u32::MAX)) {
                    return Err(mismatch());
                }
                Ok(Probe::at(0x10).looping(i32_le_at(buf, 0x00)?, i32_le_at(buf, 0x08)?))
            }

            Dialect::Capcom => {
                let channels = i32_le_at(buf, 0x04)?;
                if !matches!(channels, 1 | 2 | 6) {
                    return Err(mismatch());
                }
                // 0x10: frame size, 0x14: extra chunk count, 0x18: null,
                // 0x20: config, 0x30+: extra chunks
                Ok(Probe {
                    channel_count: Some(channels as u32),
                    ..Probe::at(u32_le_at(buf, 0x1C)? as usize)
                        .samples(i32_le_at(buf, 0x00)?)
                        .looping(i32_le_at(buf, 0x08)?, i32_le_at(buf, 0x0C)?)
                })
            }

            Dialect::Procyon => {
                if !is_id(buf, 0x00, b"sadf") || !is_id(buf, 0x08, b"opus") {
                    return Err(mismatch());
                }
                let probe = Probe::at(u32_le_at(buf, 0x1C)? as usize).samples(i32_le_at(buf, 0x28)?);
                if u8_at(buf, 0x19)? != 0 {
                    Ok(probe.looping(i32_le_at(buf, 0x2C)?, i32_le_at(buf, 0x30)?))
                } else {
                    Ok(probe)
                }
            }

            Dialect::Shinen => {
                if u32_be_at(buf, 0x08)? != HEADER_ID_BE {
                    return Err(mismatch());
                }
                let loop_start = i32_le_at(buf, 0x00)?;
                let loop_end = i32_le_at(buf, 0x04)?;
                if loop_start > loop_end {
                    return Err(mismatch());
                }
                // Loop ends slightly past the stream exist (tepaneca.opus) and
                // loop fine, hence the negative count.
                Ok(Probe::at(0x08).samples(-1).looping(loop_start, loop_end))
            }

            Dialect::Nus3 => {
                if !is_id(buf, 0x00, b"OPUS") {
                    return Err(mismatch());
                }
                // big-endian wrapper around a little-endian stream
                let probe = Probe::at(u32_be_at(buf, 0x20)? as usize).samples(i32_be_at(buf, 0x08)?);
                if i32_be_at(buf, 0x18)? != 0 {
                    Ok(probe.looping(i32_be_at(buf, 0x14)?, i32_be_at(buf, 0x18)?))
                } else {
                    Ok(probe)
                }
            }

            Dialect::SpsN1 => {
                if u32_be_at(buf, 0x00)? != 0x0900_0000 {
                    return Err(mismatch());
                }
                let sample_count = i32_le_at(buf, 0x0C)?;

                let (offset, loop_start, loop_end, loop_flag) = if u32_be_at(buf, 0x1C)? == HEADER_ID_BE {
                    // older games: intro, loop and end lengths
                    let intro = i32_le_at(buf, 0x10)?;
                    let body = i32_le_at(buf, 0x14)?;
                    (0x1C, intro, intro.wrapping_add(body), i32_le_at(buf, 0x18)? != 0)
                } else {
                    // newer games: start == end (== sample count) when not looping
                    let start = i32_le_at(buf, 0x10)?;
                    let end = i32_le_at(buf, 0x14)?;
                    (0x18, start, end, start != end)
                };

                let probe = Probe::at(offset).samples(sample_count);
                if loop_flag {
                    Ok(probe.looping(loop_start, loop_end))
                } else {
                    Ok(probe)
                }
            }

            Dialect::Opusx => {
                if !is_id(buf, 0x00, b"OPUS") {
                    return Err(mismatch());
                }
                // loop points are for the original 44100 Hz files
                let modifier = 48000.0f32 / 44100.0;
                let mut loop_start = (i32_le_at(buf, 0x08)? as f32 * modifier) as i32;
                let mut loop_end = (i32_le_at(buf, 0x0C)? as f32 * modifier) as i32;
                if loop_start >= 120 {
                    loop_start -= 128;
                    loop_end -= 128;
                } else {
                    loop_end = 0;
                }
                // the stored count is for 44100 Hz too, count the packets instead
                Ok(Probe::at(0x10).looping(loop_start, loop_end))
            }

            Dialect::Prototype => {
                if !is_id(buf, 0x00, b"OPUS") || u32_be_at(buf, 0x18)? != HEADER_ID_BE {
                    return Err(mismatch());
                }
                let probe = Probe::at(0x18).samples(i32_le_at(buf, 0x08)?);
                if i32_le_at(buf, 0x10)? != 0 {
                    Ok(probe.looping(i32_le_at(buf, 0x0C)?, i32_le_at(buf, 0x10)?))
                } else {
                    Ok(probe)
                }
            }

            Dialect::OpusNx => {
                if !is_id(buf, 0x00, b"OPUSNX\0\0") || u32_le_at(buf, 0x0C)? != 0 {
                    return Err(mismatch());
                }
                // 0x08 holds samples with encoder delay
                Ok(Probe::at(0x10))
            }

            Dialect::NsOpus => {
                if !is_id(buf, 0x00, b"EWNO") {
                    return Err(mismatch());
                }
                Ok(Probe::at(0x08))
            }

            Dialect::Sqex => {
                if u32_be_at(buf, 0x00)? != 0x0100_0000 {
                    return Err(mismatch());
                }
                // 0x04: channels, 0x08: data size
                let probe = Probe::at(u32_le_at(buf, 0x0C)? as usize).samples(i32_le_at(buf, 0x1C)?);
                if i32_le_at(buf, 0x18)? != 0 {
                    Ok(probe.looping(i32_le_at(buf, 0x14)?, i32_le_at(buf, 0x18)?))
                } else {
                    Ok(probe)
                }
            }

            Dialect::Rsnd => {
                if !is_id(buf, 0x00, b"RSND") {
                    return Err(mismatch());
                }
                // loop end is not set when looping is off, so it cannot be
                // used as sample count
                let probe = Probe::at(u32_le_at(buf, 0x10)? as usize);
                if u8_at(buf, 0x07)? != 0 {
                    Ok(probe.looping(i32_le_at(buf, 0x08)?, i32_le_at(buf, 0x0C)?))
                } else {
                    Ok(probe)
                }
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// BlazBlue: Cross Tag Battle keeps loop points in a `.psi` next to the stream.
fn psi_metadata(siblings: &dyn SiblingFileLookup) -> Option<Probe> {
    let psi = siblings.sibling("psi")?;
    let read = || -> Result<Probe> {
        Ok(Probe::at(0x00)
            .samples(i32_le_at(&psi, 0x8C)?)
            .looping(i32_le_at(&psi, 0x84)?, i32_le_at(&psi, 0x88)?))
    };
    match read() {
        Ok(probe) => Some(probe),
        Err(err) => {
            tracing::warn!(%err, "PSI metadata is too short and will be ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::NoSiblings;

    #[test]
    fn nested_id_big_endian() {
        assert_eq!(HEADER_ID_BE, 0x0100_0080);
    }

    #[test]
    fn every_dialect_is_probed_once() {
        for (i, dialect) in DIALECTS.iter().enumerate() {
            assert!(!DIALECTS[i + 1..].contains(dialect), "{dialect} listed twice");
        }
    }

    #[test]
    fn extension_hint_is_case_insensitive() {
        assert!(Dialect::Procyon.accepts_extension(Some("NOP")));
        assert!(!Dialect::Procyon.accepts_extension(Some("opus")));
        assert!(Dialect::Procyon.accepts_extension(None));
    }

    #[test]
    fn shinen_rejects_inverted_loop() {
        let mut buf = vec![0u8; 0x10];
        buf[0x00..0x04].copy_from_slice(&10i32.to_le_bytes());
        buf[0x04..0x08].copy_from_slice(&5i32.to_le_bytes());
        buf[0x08..0x0C].copy_from_slice(&HEADER_ID.to_le_bytes());
        assert!(Dialect::Shinen.probe(&buf, &NoSiblings).is_err());

        buf[0x04..0x08].copy_from_slice(&0i32.to_le_bytes());
        buf[0x00..0x04].copy_from_slice(&0i32.to_le_bytes());
        let probe = Dialect::Shinen.probe(&buf, &NoSiblings).unwrap();
        assert_eq!(probe.sample_count, -1);
        assert_eq!(probe.loop_end, 0);
    }

    #[test]
    fn sps_new_style_equal_points_mean_no_loop() {
        let mut buf = vec![0u8; 0x20];
        buf[0x00..0x04].copy_from_slice(&0x0900_0000u32.to_be_bytes());
        buf[0x0C..0x10].copy_from_slice(&48000i32.to_le_bytes());
        buf[0x10..0x14].copy_from_slice(&48000i32.to_le_bytes());
        buf[0x14..0x18].copy_from_slice(&48000i32.to_le_bytes());
        let probe = Dialect::SpsN1.probe(&buf, &NoSiblings).unwrap();
        assert_eq!(probe.header_offset, 0x18);
        assert_eq!((probe.loop_start, probe.loop_end), (0, 0));
    }

    #[test]
    fn sps_old_style_adds_loop_length() {
        let mut buf = vec![0u8; 0x20];
        buf[0x00..0x04].copy_from_slice(&0x0900_0000u32.to_be_bytes());
        buf[0x10..0x14].copy_from_slice(&1000i32.to_le_bytes());
        buf[0x14..0x18].copy_from_slice(&2000i32.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&500i32.to_le_bytes());
        buf[0x1C..0x20].copy_from_slice(&HEADER_ID.to_le_bytes());
        let probe = Dialect::SpsN1.probe(&buf, &NoSiblings).unwrap();
        assert_eq!(probe.header_offset, 0x1C);
        assert_eq!((probe.loop_start, probe.loop_end), (1000, 3000));
    }

    #[test]
    fn opusx_rescales_loop_points() {
        let mut buf = vec![0u8; 0x10];
        buf[0x00..0x04].copy_from_slice(b"OPUS");
        buf[0x08..0x0C].copy_from_slice(&44100i32.to_le_bytes());
        buf[0x0C..0x10].copy_from_slice(&88200i32.to_le_bytes());
        let probe = Dialect::Opusx.probe(&buf, &NoSiblings).unwrap();
        assert_eq!(probe.loop_start, 48000 - 128);
        assert_eq!(probe.loop_end, 96000 - 128);

        buf[0x08..0x0C].copy_from_slice(&100i32.to_le_bytes());
        let probe = Dialect::Opusx.probe(&buf, &NoSiblings).unwrap();
        assert_eq!(probe.loop_end, 0);
    }

    #[test]
    fn capcom_needs_known_layout() {
        let mut buf = vec![0u8; 0x30];
        buf[0x04..0x08].copy_from_slice(&4i32.to_le_bytes());
        assert!(Dialect::Capcom.probe(&buf, &NoSiblings).is_err());
        buf[0x04..0x08].copy_from_slice(&6i32.to_le_bytes());
        buf[0x1C..0x20].copy_from_slice(&0x30u32.to_le_bytes());
        let probe = Dialect::Capcom.probe(&buf, &NoSiblings).unwrap();
        assert_eq!(probe.channel_count, Some(6));
        assert_eq!(probe.header_offset, 0x30);
    }
}
