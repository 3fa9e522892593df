//! Splicer / crossfader (C6): a large output ring that either writes or
//! discards confirmed audio according to the skip mode, equal-power
//! crossfading around confirmed transitions, and periodic keep-alive
//! crossfades during long skips (spec.md §4.4).

use crate::error::PipelineError;
use crate::segmentation::{Mode, Transition};
use log::trace;
use std::io::Write;

/// Which class of audio to omit from the output stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipMode {
    Nothing,
    Talk,
    Music,
    Everything,
}

impl SkipMode {
    /// True when this skip mode is the one that specifically targets `mode`
    /// (i.e. `SkipMode::Music` targets `Mode::Music`, never `Mode::Talk`).
    fn targets(self, mode: Mode) -> bool {
        matches!(
            (self, mode),
            (SkipMode::Music, Mode::Music) | (SkipMode::Talk, Mode::Talk)
        )
    }

    /// Whether this skip mode ever performs crossfade restructuring (only
    /// `Music`/`Talk` do; `Nothing`/`Everything` just pass the whole stream
    /// through unmodified except for the written/discarded distinction).
    fn crossfades(self) -> bool {
        matches!(self, SkipMode::Music | SkipMode::Talk)
    }

    /// Whether audio currently tagged `mode` should be written (kept) given
    /// this skip mode, mirroring `skip_mode == SKIP_NOTHING || skip_mode ==
    /// (current_mode == MODE_MUSIC ? SKIP_TALK : SKIP_MUSIC)` from the
    /// original source (unclassified audio is treated like talk).
    fn keeps(self, mode: Mode) -> bool {
        match self {
            SkipMode::Nothing => true,
            SkipMode::Everything => false,
            SkipMode::Music => mode != Mode::Music,
            SkipMode::Talk => mode == Mode::Music,
        }
    }
}

/// Outcome of a confirmed transition, enough for the reporter to print the
/// same wording the original tool prints to stderr.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub mode: Mode,
    pub transition_sample: i64,
    pub crossfaded: bool,
}

/// Outcome of a periodic flush, enough for verbose reporting.
#[derive(Debug)]
pub enum FlushOutcome {
    Plain { wrote: bool, frames: usize },
    KeepAlive { frames_written: usize, frames_discarded: usize },
}

pub struct Splicer {
    output: Vec<i16>, // flat interleaved stereo, len = l_out * 2
    output_idx: usize, // frames currently buffered
    crossfade: Vec<i16>, // flat interleaved, len = l_xf * 2; the stored fade-out tail
    l_out: usize,
    l_xf: usize,
    sample_rate: u32,
    num_samples: i64,
    pub samples_written: i64,
    pub samples_discarded: i64,
    current_mode: Mode,
    skip_mode: SkipMode,
    keepalive: bool,
}

impl Splicer {
    pub fn new(sample_rate: u32, l_out: usize, l_xf: usize, skip_mode: SkipMode, keepalive: bool) -> Self {
        Self {
            output: vec![0i16; l_out * 2],
            output_idx: 0,
            crossfade: vec![0i16; l_xf * 2],
            l_out,
            l_xf,
            sample_rate,
            num_samples: 0,
            samples_written: 0,
            samples_discarded: 0,
            current_mode: Mode::None,
            skip_mode,
            keepalive,
        }
    }

    pub fn current_mode(&self) -> Mode {
        self.current_mode
    }

    pub fn output_idx(&self) -> usize {
        self.output_idx
    }

    /// Overlay a debug-channel value into already-pushed frames, `count`
    /// frames starting `offset_from_tail` frames behind the current write
    /// position. Silently does nothing if the start would fall before the
    /// ring's beginning, matching the original's `outbuff_window >=
    /// output_buffer` guard (used by the `-l`/`-r` LEVEL and TENSOR debug
    /// channels, which overlay values after the fact rather than at the
    /// sample that produced them).
    pub fn overlay(&mut self, offset_from_tail: usize, count: usize, left: Option<i16>, right: Option<i16>) {
        if offset_from_tail > self.output_idx {
            return;
        }
        let start = self.output_idx - offset_from_tail;
        for f in start..(start + count).min(self.l_out) {
            if let Some(v) = left {
                self.output[f * 2] = v;
            }
            if let Some(v) = right {
                self.output[f * 2 + 1] = v;
            }
        }
    }

    /// Write one stereo frame into the ring and advance. Must be followed
    /// (same sample) by `flush_if_needed`, after any window-boundary
    /// transition has been applied, matching the original's per-sample
    /// ordering.
    pub fn push_sample(&mut self, left: i16, right: i16) {
        let idx = self.output_idx * 2;
        self.output[idx] = left;
        self.output[idx + 1] = right;
        self.output_idx += 1;
        self.num_samples += 1;
    }

    fn slide(&mut self, frames: usize) {
        trace!(
            "slide {} frames, output_idx {} -> {}",
            frames,
            self.output_idx,
            self.output_idx - frames
        );
        self.output.copy_within(frames * 2.., 0);
        self.output_idx -= frames;
    }

    fn flush_write<W: Write>(&mut self, frames: usize, sink: &mut W) {
        let bytes: Vec<u8> = self.output[..frames * 2]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        // Write failures to stdout are not checked (POSIX pipe semantics,
        // spec.md §7).
        let _ = sink.write_all(&bytes);
        self.samples_written += frames as i64;
        self.slide(frames);
    }

    fn flush_discard(&mut self, frames: usize) {
        self.samples_discarded += frames as i64;
        self.slide(frames);
    }

    /// Apply a confirmed transition: crossfade restructuring if this skip
    /// mode acts on `transition.mode`, otherwise just a mode update.
    pub fn apply_transition<W: Write>(
        &mut self,
        transition: Transition,
        sink: &mut W,
    ) -> Result<TransitionOutcome, PipelineError> {
        let crossfaded = if self.skip_mode.crossfades() {
            let audio_offset = transition.transition_sample - self.num_samples + self.output_idx as i64;
            let xf_start = audio_offset - (self.l_xf as i64) / 2;
            if xf_start < 0 {
                return Err(PipelineError::TransitionOutOfRange);
            }
            let xf_start = xf_start as usize;

            if self.skip_mode.targets(transition.mode) {
                // Entering a skip of `transition.mode`: the audio up to the
                // transition is the kept segment, write it, then stash a
                // fade-out copy of what follows.
                self.flush_write(xf_start, sink);
                let l_xf = self.l_xf;
                self.crossfade.copy_from_slice(&self.output[..l_xf * 2]);
                fade_out(&mut self.crossfade);
            } else {
                // Leaving a skip into `transition.mode`: the audio up to the
                // transition was the skipped segment, discard it, then
                // fade-in the kept tail and mix in the stored fade-out.
                self.flush_discard(xf_start);
                let l_xf = self.l_xf;
                fade_in(&mut self.output[..l_xf * 2]);
                for i in 0..l_xf * 2 {
                    let sum = self.output[i] as i32 + self.crossfade[i] as i32;
                    self.output[i] = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                }
            }
            true
        } else {
            false
        };

        self.current_mode = transition.mode;
        Ok(TransitionOutcome {
            mode: transition.mode,
            transition_sample: transition.transition_sample,
            crossfaded,
        })
    }

    /// Run the per-sample flush check: flush the whole ring when it's full,
    /// or once 60s of confirmed-but-unflushed audio has built up.
    pub fn flush_if_needed<W: Write>(
        &mut self,
        confirmed_sample: i64,
        step_samples: usize,
        sink: &mut W,
    ) -> Result<Option<FlushOutcome>, PipelineError> {
        let available =
            confirmed_sample - self.num_samples + self.output_idx as i64 + (step_samples as i64) / 2;

        if self.output_idx != self.l_out && available < 60 * self.sample_rate as i64 {
            return Ok(None);
        }

        if self.keepalive && available > 2 * self.l_xf as i64 && self.skip_mode.targets(self.current_mode)
        {
            let available = available as usize;
            let l_xf = self.l_xf;
            let crossfade_start = available / 2 - l_xf;
            let base = crossfade_start * 2;

            for v in self.output[base..base + 4 * l_xf].iter_mut() {
                *v /= 4;
            }

            fade_in(&mut self.output[base..base + 2 * l_xf]);
            for i in 0..2 * l_xf {
                self.output[base + i] = self.output[base + i].wrapping_add(self.crossfade[i]);
            }

            let bytes: Vec<u8> = self.output[base..base + 2 * l_xf]
                .iter()
                .flat_map(|s| s.to_le_bytes())
                .collect();
            let _ = sink.write_all(&bytes);

            self.crossfade
                .copy_from_slice(&self.output[base + 2 * l_xf..base + 4 * l_xf]);
            fade_out(&mut self.crossfade);

            self.samples_discarded += available as i64 - l_xf as i64;
            self.samples_written += l_xf as i64;
            self.slide(available);

            Ok(Some(FlushOutcome::KeepAlive {
                frames_written: l_xf,
                frames_discarded: available - l_xf,
            }))
        } else if available > 0 {
            let available = available as usize;
            let write_data = self.skip_mode.keeps(self.current_mode);
            if write_data {
                self.flush_write(available, sink);
            } else {
                self.flush_discard(available);
            }
            Ok(Some(FlushOutcome::Plain {
                wrote: write_data,
                frames: available,
            }))
        } else {
            Err(PipelineError::BufferOverrun)
        }
    }

    /// Drain whatever remains in the ring at EOF, matching the original's
    /// final unconditional write-or-discard (no further crossfading).
    /// Returns `(wrote, frames)` for the caller's final status line.
    pub fn drain<W: Write>(&mut self, sink: &mut W) -> (bool, usize) {
        let frames = self.output_idx;
        if frames == 0 {
            return (false, 0);
        }
        let write_data = self.skip_mode.keeps(self.current_mode);
        if write_data {
            self.flush_write(frames, sink);
        } else {
            self.flush_discard(frames);
        }
        (write_data, frames)
    }
}

/// Linear fade-out: sample `i` of `n` scaled by `(n-1-i)/n`.
fn fade_out(samples: &mut [i16]) {
    let n = samples.len() as i64;
    for (i, s) in samples.iter_mut().enumerate() {
        let scale = n - 1 - i as i64;
        *s = (*s as i64 * scale / n) as i16;
    }
}

/// Linear fade-in: sample `i` of `n` scaled by `(i+1)/n`, complementary to
/// `fade_out` (property 7: `fade_out[i] + fade_in[i] == 1` for a constant
/// input).
fn fade_in(samples: &mut [i16]) {
    let n = samples.len() as i64;
    for (i, s) in samples.iter_mut().enumerate() {
        let scale = i as i64 + 1;
        *s = (*s as i64 * scale / n) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complementary_fades_reconstruct_constant_signal() {
        let n = 64;
        let mut out = vec![1000i16; n];
        let mut inn = vec![1000i16; n];
        fade_out(&mut out);
        fade_in(&mut inn);
        for i in 0..n {
            let sum = out[i] as i32 + inn[i] as i32;
            assert!((sum - 1000).abs() <= 1, "index {i}: sum {sum}");
        }
    }

    #[test]
    fn pass_through_writes_everything_and_discards_nothing() {
        let l_out = 100;
        let l_xf = 10;
        let mut splicer = Splicer::new(8000, l_out, l_xf, SkipMode::Nothing, false);
        let mut sink: Vec<u8> = Vec::new();

        for i in 0..250i64 {
            splicer.push_sample(i as i16, -(i as i16));
            // confirmed_sample always caught up: nothing withheld.
            splicer
                .flush_if_needed(splicer_confirmed(&splicer), 1, &mut sink)
                .unwrap();
        }
        splicer.drain(&mut sink);

        assert_eq!(splicer.samples_discarded, 0);
        assert_eq!(splicer.samples_written, 250);
        assert_eq!(sink.len(), 250 * 4);
    }

    #[test]
    fn skip_everything_discards_all() {
        let l_out = 100;
        let l_xf = 10;
        let mut splicer = Splicer::new(8000, l_out, l_xf, SkipMode::Everything, false);
        let mut sink: Vec<u8> = Vec::new();

        for i in 0..250i64 {
            splicer.push_sample(i as i16, -(i as i16));
            splicer
                .flush_if_needed(splicer_confirmed(&splicer), 1, &mut sink)
                .unwrap();
        }
        splicer.drain(&mut sink);

        assert_eq!(splicer.samples_written, 0);
        assert_eq!(splicer.samples_discarded, 250);
        assert!(sink.is_empty());
    }

    fn splicer_confirmed(s: &Splicer) -> i64 {
        // Pretend everything up through the current sample is confirmed.
        s.num_samples
    }
}
