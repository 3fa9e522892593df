//! Streaming envelope extractor (C3): mono-mix, dither, highpass/lowpass
//! biquad cascades, and a sliding mean-square level ring (spec.md §4.1).
//!
//! The filtering stage is run sample-at-a-time here rather than in the
//! whole-block passes `skipper.c` uses, which is equivalent because neither
//! cascade section feeds back into the other (see `CascadedBiquad::tick`).

use crate::biquad::CascadedBiquad;
use crate::constants::{HIGHPASS_FREQ, LOWPASS_FREQ};
use crate::dither::Dither;

/// Mono-mixes, dithers, filters, and tracks the trailing mean-square level
/// over a ring of `ring_len` filtered samples.
pub struct Envelope {
    highpass: CascadedBiquad,
    lowpass: CascadedBiquad,
    dither: Dither,
    ring: Vec<f64>,
    ring_len: usize,
    ring_index: usize,
    sum_of_squares: f64,
    last_filtered: f64,
}

impl Envelope {
    pub fn new(sample_rate: u32, ring_len: usize) -> Self {
        let mut env = Self {
            highpass: CascadedBiquad::highpass(sample_rate as f64, HIGHPASS_FREQ),
            lowpass: CascadedBiquad::lowpass(sample_rate as f64, LOWPASS_FREQ),
            dither: Dither::new(),
            ring: vec![0.0; ring_len],
            ring_len,
            ring_index: 0,
            sum_of_squares: 0.0,
            last_filtered: 0.0,
        };
        env.prime();
        env
    }

    /// The most recent post-filter sample (used by the `-l`/`-r` FILTERED
    /// debug channel).
    pub fn last_filtered(&self) -> f64 {
        self.last_filtered
    }

    /// Pre-populate the ring with dithered, filtered white noise, exactly as
    /// `skipper.c` primes `ring_buffer` before accepting real input, so the
    /// first window's level doesn't start from silence.
    fn prime(&mut self) {
        for slot in self.ring.iter_mut() {
            let noise = self.dither.next();
            let hp = self.highpass.tick(noise);
            *slot = self.lowpass.tick(hp);
        }
        self.sum_of_squares = self.ring.iter().map(|v| v * v).sum();
    }

    /// Mix one multi-channel input frame to mono (arithmetic mean), dither,
    /// filter, and fold it into the level ring. Returns the instantaneous
    /// mean-square level (sum-of-squares / ring length) for this sample.
    pub fn process_frame(&mut self, frame: &[f64]) -> f64 {
        let mono = frame.iter().sum::<f64>() / frame.len() as f64;
        self.process_mono(mono)
    }

    /// Same as `process_frame` but for pre-mixed mono input.
    pub fn process_mono(&mut self, mono: f64) -> f64 {
        let dithered = mono + self.dither.next();
        let hp = self.highpass.tick(dithered);
        let filtered = self.lowpass.tick(hp);
        self.last_filtered = filtered;

        // Every wrap of the ring recomputes the running sum from scratch to
        // stop floating-point drift from incremental add/subtract.
        if self.ring_index == 0 {
            self.ring[0] = filtered;
            self.sum_of_squares = self.ring.iter().map(|v| v * v).sum();
        } else {
            let old = self.ring[self.ring_index];
            self.sum_of_squares -= old * old;
            self.ring[self.ring_index] = filtered;
            self.sum_of_squares += filtered * filtered;
        }

        self.ring_index += 1;
        if self.ring_index == self.ring_len {
            self.ring_index = 0;
        }

        self.sum_of_squares / self.ring_len as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_nonnegative_and_finite() {
        let mut env = Envelope::new(44_100, 2205);
        for i in 0..10_000 {
            let x = (i as f64 * 0.01).sin();
            let level = env.process_mono(x);
            assert!(level.is_finite());
            assert!(level >= 0.0);
        }
    }

    #[test]
    fn silence_after_priming_settles_toward_small_level() {
        let mut env = Envelope::new(44_100, 2205);
        let mut last = f64::MAX;
        for _ in 0..200_000 {
            last = env.process_mono(0.0);
        }
        // Dither alone is bounded; after many ring cycles of pure silence
        // input the level should not blow up.
        assert!(last.is_finite());
        assert!(last < 100.0);
    }

    #[test]
    fn louder_input_raises_the_level() {
        let mut quiet = Envelope::new(44_100, 2205);
        let mut loud = Envelope::new(44_100, 2205);
        let mut lq = 0.0;
        let mut ll = 0.0;
        for i in 0..20_000 {
            let phase = i as f64 * 0.05;
            lq = quiet.process_mono(phase.sin() * 0.01);
            ll = loud.process_mono(phase.sin() * 10.0);
        }
        assert!(ll > lq);
    }
}
