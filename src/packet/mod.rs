//! Opus packets as they sit inside a Nintendo data chunk.
//!
//! The containers never store a sample count per packet, so the only way to
//! learn how long a stream is without decoding it is to read the TOC byte of
//! every packet. This module does exactly that and nothing more; for the
//! Ogg-specific self-delimiting framing of [RFC 6716, Appendix B][1] see a
//! real demuxer.
//!
//! [1]: https://datatracker.ietf.org/doc/html/rfc6716#appendix-B

pub mod config;
pub mod toc;
