//! Window analyzer (C4): turns a trailing 5-second window of level samples
//! into one 8-byte `AnalysisResult`, and the tensor-lookup clamping that
//! turns a result into a tensor cell (spec.md §4.2).

use crate::error::PipelineError;
use crate::tensor::{BINS_1, BINS_2, BINS_3, BINS_4};

pub const MAX_CYCLES: usize = 128;

/// One 8-byte analysis record, identical on disk and in memory.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct AnalysisResult {
    pub range_db: u8,
    pub cycles: u8,
    pub low_third: u8,
    pub mid_third: u8,
    pub high_third: u8,
    pub attack_ratio: u8,
    pub peak_jitter: u8,
    pub spare: u8,
}

impl AnalysisResult {
    pub const BYTE_LEN: usize = 8;

    pub fn to_bytes(self) -> [u8; 8] {
        [
            self.range_db,
            self.cycles,
            self.low_third,
            self.mid_third,
            self.high_third,
            self.attack_ratio,
            self.peak_jitter,
            self.spare,
        ]
    }

    pub fn from_bytes(b: [u8; 8]) -> Self {
        Self {
            range_db: b[0],
            cycles: b[1],
            low_third: b[2],
            mid_third: b[3],
            high_third: b[4],
            attack_ratio: b[5],
            peak_jitter: b[6],
            spare: 0,
        }
    }

    /// Tensor-cell index, each axis saturated to its maximum (spec.md §4.2,
    /// property 4).
    pub fn tensor_index(&self) -> (usize, usize, usize, usize) {
        let h = (self.range_db as usize).min(BINS_1 - 1);
        let i = ((self.cycles >> 1) as usize).min(BINS_2 - 1);
        let j = ((self.low_third >> 4) as usize).min(BINS_3 - 1);
        let k = ((self.mid_third >> 4) as usize).min(BINS_4 - 1);
        (h, i, j, k)
    }
}

fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Analyze a trailing window of mean-square level samples, producing one
/// `AnalysisResult`. `levels` is always exactly `WINDOW_SECONDS * sample_rate`
/// samples long; `sample_index` is the absolute PCM sample index at the end
/// of the window, used only for the verbose progress line.
pub fn analyze_window(
    levels: &[f64],
    sample_index: i64,
    sample_rate: u32,
) -> Result<AnalysisResult, PipelineError> {
    let num_samples = levels.len();
    let mut peak = levels[0];
    let mut trough = levels[0];

    for &v in &levels[1..] {
        if v < trough {
            trough = v;
        }
        if v > peak {
            peak = v;
        }
    }

    let peak_to_trough_db = (peak / trough).log10() * 10.0;
    let square_root = (peak / trough).sqrt();
    let cube_root = (peak / trough).cbrt();

    let range_db = round_half_up(peak_to_trough_db).clamp(0.0, 95.0) as u8;

    let mut zones = [0u64; 3];
    let mut trigger_points = [0i32; MAX_CYCLES];
    let mut cycles: usize = 0;
    let mut prev_peak = levels[0];
    let mut prev_trough = levels[0];
    let mut prev_peak_pos = 0i32;
    let mut prev_trough_pos = 0i32;

    for (i, &level) in levels.iter().enumerate().skip(1) {
        let zone = if level > peak / cube_root {
            2
        } else if level > trough * cube_root {
            1
        } else {
            0
        };
        zones[zone] += 1;

        if cycles & 1 == 1 {
            // odd: searching for a peak, trigger on falling below prev_peak/s
            if level > prev_peak {
                prev_peak = level;
                prev_peak_pos = i as i32;
            } else if level < prev_peak / square_root {
                trigger_points[cycles] = prev_peak_pos;
                cycles += 1;
                prev_trough = level;
                if cycles == MAX_CYCLES {
                    cycles -= 2;
                }
            }
        } else {
            // even: searching for a trough, trigger on rising above prev_trough*s
            if level < prev_trough {
                prev_trough = level;
                prev_trough_pos = i as i32;
            } else if level > prev_trough * square_root {
                trigger_points[cycles] = prev_trough_pos;
                cycles += 1;
                prev_peak = level;
            }
        }
    }

    let mut attack_ratio = 0.5;

    if cycles >= 4 {
        let mut attack_count = 0i32;
        let mut attack_time = 0i64;
        let mut decay_count = 0i32;
        let mut decay_time = 0i64;

        for i in 2..cycles {
            let delta = (trigger_points[i] - trigger_points[i - 1]) as i64;
            if i & 1 == 1 {
                attack_time += delta;
                attack_count += 1;
            } else {
                decay_time += delta;
                decay_count += 1;
            }
        }

        if attack_count > 0 && decay_count > 0 {
            attack_ratio = attack_time as f64 / (attack_time + decay_time) as f64;

            if attack_count != decay_count {
                attack_ratio *= (attack_count + decay_count) as f64 / (attack_count as f64 * 2.0);
            }
        } else {
            return Err(PipelineError::DegenerateAttackRatio);
        }
    }

    let mut peak_jitter = 1.0;

    if cycles >= 6 {
        let num_peaks = cycles >> 1;
        let period = (trigger_points[num_peaks * 2 - 1] - trigger_points[1]) as f64
            / (num_peaks - 1) as f64;
        let mut error_sum = 0.0;

        let mut i = 3;
        while i < cycles - 2 {
            let prediction = trigger_points[1] as f64 + period * ((i >> 1) as f64);
            error_sum += (trigger_points[i] as f64 - prediction).abs();
            i += 2;
        }

        peak_jitter = (error_sum / (num_peaks - 2) as f64) / period;
        if peak_jitter > 1.0 {
            peak_jitter = 1.0;
        }
    }

    let low_fraction = zones[0] as f64 / num_samples as f64;
    let mid_fraction = zones[1] as f64 / num_samples as f64;
    let high_fraction = zones[2] as f64 / num_samples as f64;

    let normalize = |f: f64| f * ((1.0 - f) * 0.75 + 1.0);

    let low_third = round_half_up(normalize(low_fraction) * 255.0) as u8;
    let mid_third = round_half_up(normalize(mid_fraction) * 255.0) as u8;
    let high_third = round_half_up(normalize(high_fraction) * 255.0) as u8;
    let attack_ratio_byte = round_half_up(attack_ratio * 255.0) as u8;
    let peak_jitter_byte = round_half_up(peak_jitter * 255.0) as u8;

    let _ = sample_index;
    let _ = sample_rate;

    Ok(AnalysisResult {
        range_db,
        cycles: cycles as u8,
        low_third,
        mid_third,
        high_third,
        attack_ratio: attack_ratio_byte,
        peak_jitter: peak_jitter_byte,
        spare: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_levels(n: usize, period_samples: f64) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * (i as f64) / period_samples;
                // level is a squared quantity: keep it positive and bounded away from 0
                (phase.sin() * 0.5 + 1.0).powi(2) * 1000.0
            })
            .collect()
    }

    #[test]
    fn tensor_index_clamps_every_axis() {
        let r = AnalysisResult {
            range_db: 200,
            cycles: 250,
            low_third: 255,
            mid_third: 255,
            high_third: 0,
            attack_ratio: 0,
            peak_jitter: 0,
            spare: 0,
        };
        let (h, i, j, k) = r.tensor_index();
        assert_eq!(h, BINS_1 - 1);
        assert_eq!(i, BINS_2 - 1);
        assert_eq!(j, BINS_3 - 1);
        assert_eq!(k, BINS_4 - 1);
    }

    #[test]
    fn analyze_window_produces_cycles_on_periodic_signal() {
        let levels = sine_levels(44100 * 5, 4410.0);
        let result = analyze_window(&levels, 0, 44100).unwrap();
        assert!(result.cycles > 0);
        assert!(result.range_db <= 95);
    }

    #[test]
    fn analyze_window_flat_signal_defaults() {
        let mut levels = vec![1000.0f64; 44100 * 5];
        levels[0] = 1000.0001; // avoid exact peak==trough division degeneracy
        let result = analyze_window(&levels, 0, 44100).unwrap();
        assert_eq!(result.attack_ratio, (0.5f64 * 255.0).round() as u8);
    }

    #[test]
    fn byte_roundtrip() {
        let r = AnalysisResult {
            range_db: 10,
            cycles: 20,
            low_third: 30,
            mid_third: 40,
            high_third: 50,
            attack_ratio: 60,
            peak_jitter: 70,
            spare: 0,
        };
        assert_eq!(AnalysisResult::from_bytes(r.to_bytes()), r);
    }
}
