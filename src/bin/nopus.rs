use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nopus::build::{capcom, standard, CapcomOptions, ReferenceFile};
use nopus::codec::Libopus;
use nopus::packet::toc;
use nopus::sniff::{self, SiblingFileLookup};
use nopus::LoopRange;

mod wav;

use wav::Wav;

/// Converts between WAV and Nintendo Opus containers.
#[derive(Parser, Debug)]
#[command(name = "nopus", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log every step
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "snake_case")]
enum Command {
    /// Decode any recognized Nintendo Opus file to 48 kHz WAV
    MakeWav { input: PathBuf, output: PathBuf },

    /// Encode a WAV into a standard Nintendo Opus file
    MakeOpus { input: PathBuf, output: PathBuf },

    /// Encode a WAV into a Capcom Opus file
    MakeCapcomOpus {
        input: PathBuf,
        output: PathBuf,

        /// `<start> <end>` in samples per channel, or `auto` to loop the whole file
        #[arg(value_name = "LOOP", num_args = 0..=2)]
        loop_points: Vec<String>,

        /// Original Capcom file whose packet sizes and opaque fields are reproduced
        #[arg(long, conflicts_with = "reference_dir")]
        reference: Option<PathBuf>,

        /// Directory holding originals named after the output file
        #[arg(long, default_value = "opus_originales")]
        reference_dir: PathBuf,
    },

    /// Print what a Nintendo Opus file contains
    Stat { input: PathBuf },
}

/// Siblings sit next to the input with the same base name.
struct SiblingFiles<'a> {
    base: &'a Path,
}

impl SiblingFileLookup for SiblingFiles<'_> {
    fn sibling(&self, extension: &str) -> Option<Vec<u8>> {
        fs::read(self.base.with_extension(extension)).ok()
    }
}

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn open(path: &Path) -> Result<(Vec<u8>, nopus::VariantMatch)> {
    let bytes = read(path)?;
    let stream = sniff::open(&bytes, extension_of(path), &SiblingFiles { base: path })
        .with_context(|| format!("{} is not a supported Nintendo Opus file", path.display()))?;
    Ok((bytes, stream))
}

fn make_wav(input: &Path, output: &Path) -> Result<()> {
    let (bytes, stream) = open(input)?;
    info!(dialect = %stream.dialect, channels = stream.channel_count, samples = stream.sample_count, "decoding");

    let audio = nopus::decode(&Libopus, &bytes, &stream)?;
    if audio.loop_range.enabled {
        info!(start = audio.loop_range.start, end = audio.loop_range.end, "stream loops");
    }

    let wav = Wav {
        channels: audio.channels as u16,
        sample_rate: audio.sample_rate,
        samples: audio.pcm,
    };
    write(output, &wav.to_bytes())
}

fn read_wav(path: &Path) -> Result<Wav> {
    let wav = Wav::parse(&read(path)?).with_context(|| format!("failed to parse {}", path.display()))?;
    info!(channels = wav.channels, sample_rate = wav.sample_rate, samples = wav.samples_per_channel(), "read WAV");
    Ok(wav)
}

fn make_opus(input: &Path, output: &Path) -> Result<()> {
    let wav = read_wav(input)?;
    let channels = u8::try_from(wav.channels).map_err(|_| nopus::Error::InvalidChannels(wav.channels as u32))?;
    let bytes = standard::build(&Libopus, &wav.samples, wav.sample_rate, channels)?;
    write(output, &bytes)
}

fn parse_loop(points: &[String], samples_per_channel: u32) -> Result<LoopRange> {
    match points {
        [] => Ok(LoopRange::DISABLED),
        [auto] if auto == "auto" => Ok(LoopRange::full(samples_per_channel)),
        [start, end] => {
            let start = start.parse().with_context(|| format!("invalid loop start {start:?}"))?;
            let end = end.parse().with_context(|| format!("invalid loop end {end:?}"))?;
            Ok(LoopRange::new(start, end))
        }
        _ => {
            warn!("both loop start and loop end are required, not looping");
            Ok(LoopRange::DISABLED)
        }
    }
}

/// The output replaces a game file, so the original is looked up under the
/// output's name.
fn reference_for(reference_dir: &Path, output: &Path) -> PathBuf {
    let stem = output.file_stem().unwrap_or_default().to_string_lossy();
    reference_dir.join(format!("{stem}.opus"))
}

fn make_capcom_opus(
    input: &Path,
    output: &Path,
    loop_points: &[String],
    reference: Option<PathBuf>,
    reference_dir: &Path,
) -> Result<()> {
    let wav = read_wav(input)?;
    let channels = u8::try_from(wav.channels).map_err(|_| nopus::Error::InvalidChannels(wav.channels as u32))?;
    let loop_range = parse_loop(loop_points, wav.samples_per_channel() as u32)?;

    let reference = reference.unwrap_or_else(|| reference_for(reference_dir, output));

    let options = match fs::read(&reference) {
        Ok(bytes) => {
            let original = ReferenceFile::read(&bytes)
                .with_context(|| format!("{} is not a Capcom Opus file", reference.display()))?;
            info!(
                reference = %reference.display(),
                packets = original.packet_sizes.len(),
                "matching packet sizes"
            );
            original.options(loop_range)
        }
        Err(err) => {
            warn!(reference = %reference.display(), %err, "no reference file, encoding without packet size targets");
            CapcomOptions {
                loop_range,
                ..CapcomOptions::default()
            }
        }
    };

    let bytes = capcom::build(&Libopus, &wav.samples, wav.sample_rate, channels, &options)?;
    write(output, &bytes)
}

fn stat(input: &Path) -> Result<()> {
    let (bytes, stream) = open(input)?;
    let descriptor = stream.descriptor();

    println!("dialect={} header@0x{:x} data@0x{:x}", stream.dialect, stream.header_offset, stream.data_offset());
    println!(
        "channels={} rate={} pre_skip={} samples={} layered={}",
        descriptor.channel_count, descriptor.sample_rate, descriptor.pre_skip, stream.sample_count, stream.layered
    );
    if stream.loop_range.enabled {
        println!(
            "loop={}..{} (declared end {})",
            stream.loop_range.start, stream.loop_range.end, stream.declared_loop_end
        );
    }
    if let Some(multistream) = &stream.multistream {
        println!(
            "streams={} coupled={} mapping={:?}",
            multistream.stream_count,
            multistream.coupled_count,
            multistream.channel_mapping()
        );
    }

    let mut last = None;
    let mut run = 0;
    for (index, packet) in stream.data.packets(&bytes).enumerate() {
        let packet = packet?;
        let toc = toc::parse(packet.payload).map_err(|reason| nopus::Error::MalformedPacket { index, reason })?;

        if last == Some(toc) {
            run += 1;
            continue;
        }
        if run > 0 {
            println!("  ... {run} more");
        }
        println!(
            "#{index} mode={:?} bwidth={:?} dur={}ms nframes={} code={} stereo?={}",
            toc.config.mode,
            toc.config.bandwidth,
            toc.config.frame_ms(),
            toc.num_frames,
            toc.code as u8,
            toc.is_stereo
        );
        last = Some(toc);
        run = 0;
    }
    if run > 0 {
        println!("  ... {run} more");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    match args.command {
        Command::MakeWav { input, output } => make_wav(&input, &output),
        Command::MakeOpus { input, output } => make_opus(&input, &output),
        Command::MakeCapcomOpus {
            input,
            output,
            loop_points,
            reference,
            reference_dir,
        } => make_capcom_opus(&input, &output, &loop_points, reference, &reference_dir),
        Command::Stat { input } => stat(&input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn loop_arguments() {
        assert_eq!(parse_loop(&[], 1000).unwrap(), LoopRange::DISABLED);
        assert_eq!(parse_loop(&strings(&["auto"]), 1000).unwrap(), LoopRange::full(1000));
        assert_eq!(parse_loop(&strings(&["100", "5000"]), 1000).unwrap(), LoopRange::new(100, 5000));
        assert_eq!(parse_loop(&strings(&["100"]), 1000).unwrap(), LoopRange::DISABLED);
        assert!(parse_loop(&strings(&["a", "5"]), 1000).is_err());
    }

    #[test]
    fn reference_is_named_after_the_output() {
        let reference = reference_for(Path::new("opus_originales"), Path::new("out/bgm01.opus"));
        assert_eq!(reference, PathBuf::from("opus_originales/bgm01.opus"));

        let dotted = reference_for(Path::new("refs"), Path::new("st.01.lopus"));
        assert_eq!(dotted, PathBuf::from("refs/st.01.opus"));
    }

    #[test]
    fn subcommands_parse() {
        let args = Args::try_parse_from(["nopus", "make_capcom_opus", "in.wav", "out.opus", "auto", "-v"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Command::MakeCapcomOpus {
                loop_points,
                reference_dir,
                ..
            } => {
                assert_eq!(loop_points, ["auto"]);
                assert_eq!(reference_dir, PathBuf::from("opus_originales"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
