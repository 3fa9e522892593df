//! Streaming audio classifier and skip-editor: mono-mixes, filters, and
//! windows PCM audio into trailing-window features, classifies each window
//! against a trained tensor, smooths those scores into confirmed MUSIC/TALK
//! transitions, and crossfades the output stream around them.
//!
//! See `SPEC_FULL.md` for the module map and `DESIGN.md` for where each part
//! is grounded.

pub mod analysis;
pub mod biquad;
pub mod builder;
pub mod cli;
pub mod constants;
pub mod dither;
pub mod envelope;
pub mod error;
pub mod histogram;
pub mod lzw;
pub mod reporter;
pub mod segmentation;
pub mod splicer;
pub mod streamer;
pub mod tensor;
