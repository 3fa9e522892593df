//! CLI argument surfaces for both binaries (spec.md §6), reimplemented with
//! `clap` derive macros in place of the original hand-rolled `argv` loop.
//!
//! `-m`/`-t`/`-v` accept an optional attached signed integer exactly like
//! the original (`-m-20`, `-v5`), which an ordinary `Option<i32>` flag can't
//! express, so they use `num_args(0..=1)` plus a small value parser that
//! mirrors the original's `strtol`-on-remaining-chars behavior.

use clap::Parser;
use std::path::PathBuf;

use crate::constants::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use crate::splicer::SkipMode;

fn parse_threshold_offset(s: &str) -> Result<i32, String> {
    let v: i32 = s
        .parse()
        .map_err(|_| format!("threshold offset must be an integer, got \"{s}\""))?;
    if !(-99..=99).contains(&v) {
        return Err("threshold is from -99 (most skipped) to 99 (least skipped)".to_string());
    }
    Ok(v)
}

fn parse_verbose_period(s: &str) -> Result<u32, String> {
    s.parse()
        .map_err(|_| format!("verbose period must be a positive integer, got \"{s}\""))
}

fn parse_debug_channel(s: &str) -> Result<u8, String> {
    let v: u8 = s
        .parse()
        .map_err(|_| format!("debug channel source must be 0-4, got \"{s}\""))?;
    if v > 4 {
        return Err("debug channel source must be 0 (audio), 1 (mono), 2 (filtered), 3 (level dB), or 4 (tensor score)".to_string());
    }
    Ok(v)
}

/// `skipper` — the streaming filter binary (spec.md §1-§4, §6).
#[derive(Parser, Debug)]
#[command(name = "skipper", about = "Streaming audio classifier and skip-editor")]
pub struct SkipperArgs {
    /// Dump raw AnalysisResult records to this file as they're produced.
    #[arg(short = 'a', value_name = "FILE")]
    pub analysis_output: Option<PathBuf>,

    /// Input channel count (1 or 2).
    #[arg(short = 'c', default_value_t = DEFAULT_CHANNELS, value_parser = clap::value_parser!(u32).range(1..=2))]
    pub channels: u32,

    /// Alternate classification tensor file (falls back to an unbiased
    /// all-zero tensor when omitted; see DESIGN.md).
    #[arg(short = 'd', value_name = "FILE")]
    pub tensor_file: Option<PathBuf>,

    /// Insert periodic keep-alive crossfades during long skips.
    #[arg(short = 'k')]
    pub keepalive: bool,

    /// Left-channel debug source: 0=audio, 1=mono, 2=filtered, 3=level-dB, 4=tensor-score.
    #[arg(short = 'l', value_name = "N", value_parser = parse_debug_channel)]
    pub left_output: Option<u8>,

    /// Right-channel debug source, same encoding as `-l`.
    #[arg(short = 'r', value_name = "N", value_parser = parse_debug_channel)]
    pub right_output: Option<u8>,

    /// Skip music, with an optional threshold offset (+/- 99).
    #[arg(short = 'm', num_args = 0..=1, allow_hyphen_values = true, default_missing_value = "0", value_parser = parse_threshold_offset)]
    pub skip_music: Option<i32>,

    /// Skip everything (used mainly for testing the splicer in isolation).
    #[arg(short = 'n')]
    pub skip_everything: bool,

    /// Pass audio through unmodified (default).
    #[arg(short = 'p')]
    pub pass: bool,

    /// Suppress informational stderr output.
    #[arg(short = 'q')]
    pub quiet: bool,

    /// Input/output sample rate.
    #[arg(short = 's', default_value_t = DEFAULT_SAMPLE_RATE, value_parser = clap::value_parser!(u32).range(MIN_SAMPLE_RATE as i64..=MAX_SAMPLE_RATE as i64))]
    pub sample_rate: u32,

    /// Skip talk, with an optional threshold offset (+/- 99).
    #[arg(short = 't', num_args = 0..=1, allow_hyphen_values = true, default_missing_value = "0", value_parser = parse_threshold_offset)]
    pub skip_talk: Option<i32>,

    /// Verbose progress, with an optional reporting period in seconds (default 300).
    #[arg(short = 'v', num_args = 0..=1, default_missing_value = "300", value_parser = parse_verbose_period)]
    pub verbose: Option<u32>,
}

impl SkipperArgs {
    /// Resolve the mutually-exclusive `-m`/`-t`/`-n`/`-p` flags into one
    /// `SkipMode` plus the threshold offset that mode carries.
    pub fn skip_mode(&self) -> (SkipMode, i32) {
        if self.skip_everything {
            (SkipMode::Everything, 0)
        } else if let Some(offset) = self.skip_music {
            (SkipMode::Music, offset)
        } else if let Some(offset) = self.skip_talk {
            (SkipMode::Talk, -offset)
        } else {
            (SkipMode::Nothing, 0)
        }
    }
}

/// `tensor-gen` — the offline tensor builder binary (spec.md §4.5, §6).
#[derive(Parser, Debug)]
#[command(name = "tensor-gen", about = "Build a skipper classification tensor from labeled analysis files")]
pub struct TensorGenArgs {
    /// Alternate windows between the training histogram and the self-test.
    #[arg(short = 'a')]
    pub alternate: bool,

    /// Effective dimension count (1-4); axes beyond this collapse and are
    /// broadcast back after border-fill.
    #[arg(short = 'd', default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=4))]
    pub dimensions: u32,

    /// Labeled "music" analysis-result file.
    pub music_file: PathBuf,

    /// Labeled "talk" analysis-result file.
    pub talk_file: PathBuf,

    /// Output tensor file (if omitted, only the build statistics are printed).
    pub out_file: Option<PathBuf>,
}
