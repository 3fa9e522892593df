//! Runtime feature histograms (spec.md supplemental: `-a` diagnostics).
//!
//! The window analyzer accumulates one of these per feature whenever an
//! analysis-output file is requested; at shutdown each is summarized with
//! range/mean/median/mode and a handful of population bands, exactly as
//! `display_histogram`/`display_population` do in `skipper.c`.

/// A fixed-width integer-valued histogram plus the range/mean/median/mode
/// and population-band statistics `skipper.c`'s `display_histogram` prints.
#[derive(Clone)]
pub struct Histogram {
    bins: Vec<u64>,
}

/// One line of `display_histogram`'s summary.
#[derive(Debug, PartialEq)]
pub struct Summary {
    pub min_value: usize,
    pub max_value: usize,
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub hits: u64,
}

/// One `display_population` line.
#[derive(Debug, PartialEq)]
pub struct Population {
    pub percent: u32,
    pub sum: u64,
    pub low_value: usize,
    pub high_value: usize,
}

impl Histogram {
    pub fn new(bin_count: usize) -> Self {
        Self {
            bins: vec![0u64; bin_count],
        }
    }

    pub fn record(&mut self, value: u8) {
        self.bins[value as usize] += 1;
    }

    pub fn total_hits(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Mirrors `display_histogram`'s range/mean/median/mode computation.
    /// Returns `None` if the histogram has no hits (nothing to summarize).
    pub fn summary(&self) -> Option<Summary> {
        let mut min_value = usize::MAX;
        let mut max_value = 0usize;
        let mut hits = 0u64;
        let mut sum = 0u64;
        let mut max_hits = 0u64;
        let mut mode1 = 0usize;
        let mut mode2 = 0usize;

        for (value, &count) in self.bins.iter().enumerate() {
            if count == 0 {
                continue;
            }
            if count > max_hits {
                max_hits = count;
                mode1 = value;
                mode2 = value;
            } else if count == max_hits {
                mode2 = value;
            }
            if value < min_value {
                min_value = value;
            }
            if value > max_value {
                max_value = value;
            }
            sum += count * value as u64;
            hits += count;
        }

        if hits == 0 {
            return None;
        }

        let mut median = 0.0;
        let mut hits2 = 0u64;
        for (value, &count) in self.bins.iter().enumerate() {
            if count == 0 {
                continue;
            }
            if hits2 as f64 + count as f64 > hits as f64 / 2.0 {
                median = value as f64 - 0.5 + (hits as f64 / 2.0 - hits2 as f64) / count as f64;
                break;
            }
            hits2 += count;
        }

        Some(Summary {
            min_value,
            max_value,
            mean: sum as f64 / hits as f64,
            median,
            mode: (mode1 + mode2) as f64 / 2.0,
            hits,
        })
    }

    /// Mirrors `display_population`: the narrowest contiguous value range
    /// that covers at least `percent`% of all hits, trimming the side with
    /// fewer hits at each boundary (ties alternate which side yields).
    pub fn population(&self, percent: u32) -> Option<Population> {
        let mut low_value = 0usize;
        let mut high_value = 0usize;
        let mut sum = 0u64;

        for (value, &count) in self.bins.iter().enumerate() {
            if count == 0 {
                continue;
            }
            if sum == 0 {
                low_value = value;
            }
            sum += count;
            high_value = value;
        }

        if sum == 0 {
            return None;
        }

        let target = (sum as f64 * percent as f64 / 100.0 + 0.5).floor() as u64;
        let mut sum2 = sum;
        let mut toggle = false;

        loop {
            if sum2 <= target {
                break;
            }
            let low_count = self.bins[low_value];
            let high_count = self.bins[high_value];

            let trim_low = if low_count < high_count {
                true
            } else if low_count == high_count {
                toggle = !toggle;
                toggle
            } else {
                false
            };

            if trim_low {
                if sum2 as i64 - low_count as i64 / 2 > target as i64 {
                    sum2 -= low_count;
                    low_value += 1;
                } else {
                    break;
                }
            } else if sum2 as i64 - high_count as i64 / 2 > target as i64 {
                sum2 -= high_count;
                if high_value == 0 {
                    break;
                }
                high_value -= 1;
            } else {
                break;
            }
        }

        Some(Population {
            percent,
            sum: sum2,
            low_value,
            high_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_single_spike_is_degenerate() {
        let mut h = Histogram::new(256);
        h.record(42);
        h.record(42);
        h.record(42);
        let s = h.summary().unwrap();
        assert_eq!(s.min_value, 42);
        assert_eq!(s.max_value, 42);
        assert_eq!(s.mean, 42.0);
        assert_eq!(s.mode, 42.0);
    }

    #[test]
    fn population_covers_full_range_at_100_percent() {
        let mut h = Histogram::new(256);
        for v in [1u8, 1, 5, 10, 10, 10, 20] {
            h.record(v);
        }
        let p = h.population(100).unwrap();
        assert_eq!(p.low_value, 1);
        assert_eq!(p.high_value, 20);
        assert_eq!(p.sum, 7);
    }

    #[test]
    fn empty_histogram_has_no_summary() {
        let h = Histogram::new(256);
        assert!(h.summary().is_none());
        assert!(h.population(50).is_none());
    }
}
