//! Nintendo Opus containers: reading them in the many dialects games ship
//! them in, and writing the plain and Capcom flavours.
//!
//! * [`sniff`] identifies a buffer and resolves its nested stream.
//! * [`decode`] turns a [`VariantMatch`] into 48 kHz PCM.
//! * [`build`] encodes PCM into a standard or Capcom container.
//! * [`container`] holds the byte layouts themselves, [`packet`] the Opus
//!   TOC parser used to count samples.
//!
//! The codec is abstracted behind [`codec::Engine`]; enable the `libopus`
//! feature for an implementation backed by the system library.
//!
//! ```no_run
//! # #[cfg(feature = "libopus")]
//! # fn main() -> nopus::Result<()> {
//! let bytes = std::fs::read("bgm01.opus").unwrap();
//! let stream = nopus::sniff::open(&bytes, Some("opus"), &nopus::sniff::NoSiblings)?;
//! let audio = nopus::decode(&nopus::codec::Libopus, &bytes, &stream)?;
//! println!("{} samples at {} Hz", audio.samples_per_channel(), audio.sample_rate);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "libopus"))]
//! # fn main() {}
//! ```

pub mod build;
pub mod codec;
pub mod container;
pub mod decode;
pub mod error;
pub mod layered;
pub mod packet;
pub mod sniff;

pub use container::{AudioStreamDescriptor, LoopRange};
pub use decode::{decode, DecodedAudio};
pub use error::{Error, Result};
pub use sniff::{identify, Dialect, VariantMatch};
