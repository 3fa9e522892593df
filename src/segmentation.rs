//! Segmentation state machine (C5): smooths tensor lookups over the results
//! ring and turns sustained scores into confirmed MUSIC/TALK transitions
//! with hysteresis and pending-cancel logic (spec.md §4.3).

use crate::constants::{Sizes, AVERAGE_COUNT, AVERAGE_SECONDS, WINDOW_SECONDS};
use std::collections::VecDeque;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    None,
    Music,
    Talk,
}

/// A confirmed transition, handed off to the splicer (C6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub mode: Mode,
    pub transition_sample: i64,
}

pub struct Segmentation {
    threshold: i32,
    current_mode: Mode,
    music_up: u32,
    talk_up: u32,
    pend_up: u32,
    results: VecDeque<i32>,
    /// Latched at the start of a detection attempt; becomes the event's
    /// `transition_sample` if the attempt is eventually confirmed.
    pending_transition_sample: i64,
    confirmed_sample: i64,
    min_music_windows: u32,
    min_talk_windows: u32,
    max_pend_windows: u32,
    window_span_samples: i64,
    confirmed_span_samples: i64,
    last_smoothed: Option<(i64, i64)>,
}

impl Segmentation {
    pub fn new(sizes: &Sizes, threshold: i32) -> Self {
        let window_span_samples =
            ((WINDOW_SECONDS + AVERAGE_SECONDS) as i64 * sizes.sample_rate as i64) / 2;
        let confirmed_span_samples = ((WINDOW_SECONDS + AVERAGE_SECONDS) as i64
            * sizes.sample_rate as i64
            + sizes.step_samples as i64
            + sizes.crossfade_buff_len as i64)
            / 2;

        Self {
            threshold,
            current_mode: Mode::None,
            music_up: 0,
            talk_up: 0,
            pend_up: 0,
            results: VecDeque::with_capacity(AVERAGE_COUNT),
            pending_transition_sample: 0,
            confirmed_sample: -confirmed_span_samples,
            min_music_windows: sizes.min_music_windows as u32,
            min_talk_windows: sizes.min_talk_windows as u32,
            max_pend_windows: sizes.max_pend_windows as u32,
            window_span_samples,
            confirmed_span_samples,
            last_smoothed: None,
        }
    }

    /// The `(sum, count)` of the results-ring average from the most recent
    /// call to `process_window` that actually evaluated hysteresis (`None`
    /// until the ring first fills). Used only by the `-l`/`-r` TENSOR debug
    /// channel, which overlays this smoothed value rather than the raw
    /// per-window lookup.
    pub fn last_smoothed(&self) -> Option<(i64, i64)> {
        self.last_smoothed
    }

    pub fn current_mode(&self) -> Mode {
        self.current_mode
    }

    pub fn confirmed_sample(&self) -> i64 {
        self.confirmed_sample
    }

    pub fn music_up(&self) -> u32 {
        self.music_up
    }

    pub fn talk_up(&self) -> u32 {
        self.talk_up
    }

    /// Feed one per-window tensor lookup (already a raw signed score in
    /// `[-99, 99]`, not yet summed). `num_samples` is the running PCM sample
    /// count at the moment this window completed.
    ///
    /// The results ring only starts evaluating hysteresis once it has
    /// accumulated `AVERAGE_COUNT` (25) values; from then on every push
    /// briefly grows the ring back to 25 before popping the oldest entry, so
    /// the sum is always taken over 25 values compared against a threshold
    /// scaled by the post-pop length of 24 — this quirk must match bit for
    /// bit.
    pub fn process_window(&mut self, tensor_value: i32, num_samples: i64) -> Option<Transition> {
        self.results.push_back(tensor_value);
        if self.results.len() != AVERAGE_COUNT {
            return None;
        }

        let sum: i64 = self.results.iter().map(|&v| v as i64).sum();
        self.results.pop_front();
        let n = self.results.len() as i64;
        self.last_smoothed = Some((sum, n));

        let mut detected = None;

        if sum > self.threshold as i64 * n {
            if self.current_mode == Mode::Music {
                if self.talk_up > 0 {
                    self.talk_up -= 1;
                    if self.talk_up > 0 {
                        self.pend_up += 1;
                        if self.pend_up >= self.max_pend_windows {
                            self.talk_up = 0;
                        }
                    }
                }
            } else {
                if self.music_up == 0 {
                    self.pending_transition_sample = num_samples - self.window_span_samples;
                    self.pend_up = 0;
                }
                self.music_up += 1;
                if self.music_up == self.min_music_windows {
                    detected = Some(Mode::Music);
                    self.music_up = 0;
                }
                self.pend_up += 1;
            }
        } else if self.current_mode == Mode::Talk {
            if self.music_up > 0 {
                self.music_up -= 1;
                if self.music_up > 0 {
                    self.pend_up += 1;
                    if self.pend_up >= self.max_pend_windows {
                        self.music_up = 0;
                    }
                }
            }
        } else {
            if self.talk_up == 0 {
                self.pending_transition_sample = num_samples - self.window_span_samples;
                self.pend_up = 0;
            }
            self.talk_up += 1;
            if self.talk_up == self.min_talk_windows {
                detected = Some(Mode::Talk);
                self.talk_up = 0;
            }
            self.pend_up += 1;
        }

        if let Some(mode) = detected {
            self.current_mode = mode;
        }

        if self.talk_up == 0 && self.music_up == 0 {
            self.confirmed_sample = num_samples - self.confirmed_span_samples;
        }

        detected.map(|mode| Transition {
            mode,
            transition_sample: self.pending_transition_sample,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> Sizes {
        Sizes::new(44_100)
    }

    #[test]
    fn confirms_music_after_min_music_secs_of_positive_score() {
        let s = sizes();
        let mut seg = Segmentation::new(&s, 0);
        let mut num_samples: i64 = 0;
        let mut confirmed = None;
        // 25 windows just to fill the ring, plus min_music_windows (100) more
        // to walk the up-counter to confirmation.
        for _ in 0..(AVERAGE_COUNT as u32 + s.min_music_windows as u32) {
            num_samples += s.step_samples as i64;
            if let Some(t) = seg.process_window(50, num_samples) {
                confirmed = Some(t);
            }
        }
        let t = confirmed.expect("expected a confirmed MUSIC transition");
        assert_eq!(t.mode, Mode::Music);
        assert_eq!(seg.current_mode(), Mode::Music);
    }

    #[test]
    fn confirms_talk_after_min_talk_secs_of_negative_score() {
        let s = sizes();
        let mut seg = Segmentation::new(&s, 0);
        let mut num_samples: i64 = 0;
        let mut confirmed = None;
        for _ in 0..(AVERAGE_COUNT as u32 + s.min_talk_windows as u32) {
            num_samples += s.step_samples as i64;
            if let Some(t) = seg.process_window(-50, num_samples) {
                confirmed = Some(t);
            }
        }
        let t = confirmed.expect("expected a confirmed TALK transition");
        assert_eq!(t.mode, Mode::Talk);
    }

    #[test]
    fn alternating_dissent_never_confirms_the_opposing_mode() {
        let s = sizes();
        let mut seg = Segmentation::new(&s, 0);
        let mut num_samples: i64 = 0;

        for _ in 0..(AVERAGE_COUNT as u32 + s.min_music_windows as u32) {
            num_samples += s.step_samples as i64;
            seg.process_window(50, num_samples);
        }
        assert_eq!(seg.current_mode(), Mode::Music);

        // A single dissenting (talk-tendency) window starts talk_up at 1;
        // the very next reinforcing window immediately decrements it back
        // to 0 (the cancel branch for current_mode == MUSIC), so talk_up
        // never approaches MIN_TALK_SECS and MUSIC is never displaced, no
        // matter how long this alternation continues.
        for round in 0..(s.max_pend_windows as u32 + 50) {
            num_samples += s.step_samples as i64;
            let score = if round % 2 == 0 { -50 } else { 50 };
            let t = seg.process_window(score, num_samples);
            assert!(t.is_none());
        }
        assert_eq!(seg.current_mode(), Mode::Music);
    }

    #[test]
    fn no_transition_before_results_ring_fills() {
        let s = sizes();
        let mut seg = Segmentation::new(&s, 0);
        for i in 0..(AVERAGE_COUNT as i64 - 1) {
            assert!(seg.process_window(99, i * s.step_samples as i64).is_none());
        }
    }
}
