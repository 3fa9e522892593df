//! Offline tensor builder (C7): fuses two labeled `AnalysisResult` histogram
//! files into a 4-D classifier via normalized-rate comparison and iterative
//! neighborhood border-fill, then broadcasts any collapsed dimensions back
//! to full rank (spec.md §4.5).
//!
//! Grounded on `tensor-gen.c`'s `main`/`read_analysis_results`/border-fill
//! loop; the guess-hit/guess-miss bookkeeping and the post-build self-test
//! are supplemental features recovered from that source (see SPEC_FULL.md
//! §3 and §8 scenario S4).

use crate::analysis::AnalysisResult;
use crate::tensor::{Tensor, BINS_1, BINS_2, BINS_3, BINS_4, TENSOR_CELLS};
use log::debug;

/// Effective per-axis bin counts for a requested dimension count (1-4):
/// axes beyond `dimensions` collapse to size 1, mirroring tensor-gen.c's
/// `switch (dimensions) { case 1: bins2=1; case 2: bins3=1; case 3: bins4=1; }`
/// fallthrough.
pub fn effective_bins(dimensions: u32) -> [usize; 4] {
    let mut bins = [BINS_1, BINS_2, BINS_3, BINS_4];
    if dimensions <= 1 {
        bins[1] = 1;
    }
    if dimensions <= 2 {
        bins[2] = 1;
    }
    if dimensions <= 3 {
        bins[3] = 1;
    }
    bins
}

#[inline]
fn offset(h: usize, i: usize, j: usize, k: usize) -> usize {
    ((h * BINS_2 + i) * BINS_3 + j) * BINS_4 + k
}

/// A 4-D histogram over the full `48x24x16x16` index space; counts recorded
/// against a reduced-dimension index collapse onto index 0 of the collapsed
/// axes, matching `read_analysis_results`'s clamp-to-`array_bins`.
#[derive(Clone)]
pub struct Distribution {
    counts: Vec<u64>,
}

impl Distribution {
    fn new() -> Self {
        Self {
            counts: vec![0u64; TENSOR_CELLS],
        }
    }

    fn add(&mut self, h: usize, i: usize, j: usize, k: usize, weight: u64) {
        self.counts[offset(h, i, j, k)] += weight;
    }

    fn get(&self, h: usize, i: usize, j: usize, k: usize) -> u64 {
        self.counts[offset(h, i, j, k)]
    }
}

/// Read a packed `AnalysisResult` file into a distribution. If `alternate`
/// is set, only odd-indexed (0-based) records contribute, each with weight
/// 2, matching `!alternate || (window_count & 1)` / `alternate + 1`.
pub fn read_analysis_results(bytes: &[u8], alternate: bool, bins: [usize; 4]) -> (Distribution, u32) {
    let mut dist = Distribution::new();
    let mut window_count: u32 = 0;

    for chunk in bytes.chunks_exact(AnalysisResult::BYTE_LEN) {
        let record = AnalysisResult::from_bytes(chunk.try_into().unwrap());
        let (mut h, mut i, mut j, mut k) = record.tensor_index();
        if h >= bins[0] {
            h = bins[0] - 1;
        }
        if i >= bins[1] {
            i = bins[1] - 1;
        }
        if j >= bins[2] {
            j = bins[2] - 1;
        }
        if k >= bins[3] {
            k = bins[3] - 1;
        }

        if !alternate || (window_count & 1) != 0 {
            dist.add(h, i, j, k, if alternate { 2 } else { 1 });
        }

        window_count += 1;
    }

    (dist, window_count)
}

/// Per-class bookkeeping from the fusion pass (tensor-gen.c lines 134-193).
#[derive(Debug, Default, Clone, Copy)]
pub struct FusionStats {
    pub unique_hits1: u64,
    pub unique_hits2: u64,
    pub unique_slots1: u64,
    pub unique_slots2: u64,
    pub guess_hits1: u64,
    pub guess_hits2: u64,
    pub guess_misses1: u64,
    pub guess_misses2: u64,
    pub common_hits1: u64,
    pub common_hits2: u64,
    pub common_slots: u64,
}

/// Working tensor during build: full shape, `i32` so intermediate
/// border-fill sums can't saturate before the final round-half-up clamp.
struct Grid {
    cells: Vec<i32>,
    bins: [usize; 4],
}

impl Grid {
    fn zeroed(bins: [usize; 4]) -> Self {
        Self {
            cells: vec![0i32; TENSOR_CELLS],
            bins,
        }
    }

    fn get(&self, h: usize, i: usize, j: usize, k: usize) -> i32 {
        self.cells[offset(h, i, j, k)]
    }

    fn set(&mut self, h: usize, i: usize, j: usize, k: usize, v: i32) {
        self.cells[offset(h, i, j, k)] = v;
    }
}

/// Fuse two distributions into an initial tensor grid plus bookkeeping
/// stats, per spec.md §4.5's fusion rule.
fn fuse(dist1: &Distribution, dist2: &Distribution, n1: u32, n2: u32, bins: [usize; 4]) -> (Grid, FusionStats) {
    let mut grid = Grid::zeroed(bins);
    let mut stats = FusionStats::default();

    for h in 0..bins[0] {
        for i in 0..bins[1] {
            for j in 0..bins[2] {
                for k in 0..bins[3] {
                    let c1 = dist1.get(h, i, j, k);
                    let c2 = dist2.get(h, i, j, k);

                    if c1 > 0 && c2 == 0 {
                        stats.unique_hits1 += c1;
                        stats.unique_slots1 += 1;
                        grid.set(h, i, j, k, 99);
                    } else if c1 == 0 && c2 > 0 {
                        stats.unique_hits2 += c2;
                        stats.unique_slots2 += 1;
                        grid.set(h, i, j, k, -99);
                    } else if c1 > 0 && c2 > 0 {
                        let mut w1 = c1 as f64 / n1 as f64;
                        let mut w2 = c2 as f64 / n2 as f64;

                        if w1 > w2 {
                            w2 /= w1;
                            w1 = 1.0;
                        } else {
                            w1 /= w2;
                            w2 = 1.0;
                        }

                        if w1 > w2 {
                            stats.guess_misses2 += c2;
                            stats.guess_hits1 += c1;
                        } else {
                            stats.guess_misses1 += c1;
                            stats.guess_hits2 += c2;
                        }

                        stats.common_hits1 += c1;
                        stats.common_hits2 += c2;
                        stats.common_slots += 1;

                        let value = (w1 * 99.0 + w2 * -99.0 + 0.5).floor() as i32;
                        grid.set(h, i, j, k, value);
                    }
                }
            }
        }
    }

    (grid, stats)
}

/// Report from one border-fill pass.
pub struct BorderFillReport {
    pub iterations: u32,
    pub used_slots: u64,
    pub total_slots: u64,
}

/// Repeatedly fill empty cells from their 3x3x3x3 neighborhood average until
/// no cell changes, per spec.md §4.5. Only ever writes to previously-empty
/// cells (property 8: border-fill monotonicity).
fn border_fill(grid: &mut Grid) -> BorderFillReport {
    let bins = grid.bins;
    let total_slots: u64 = (bins[0] * bins[1] * bins[2] * bins[3]) as u64;
    let mut iterations = 0u32;
    let mut used_slots = 0u64;

    loop {
        iterations += 1;
        let mut shadow = grid.cells.clone();
        let mut border_slots = 0u64;
        used_slots = 0;

        for h in 0..bins[0] {
            for i in 0..bins[1] {
                for j in 0..bins[2] {
                    for k in 0..bins[3] {
                        if grid.get(h, i, j, k) != 0 {
                            used_slots += 1;
                            continue;
                        }

                        let mut sum = 0i64;
                        let mut hits = 0i64;

                        for dh in -1i32..=1 {
                            let nh = h as i32 + dh;
                            if nh < 0 || nh >= bins[0] as i32 {
                                continue;
                            }
                            for di in -1i32..=1 {
                                let ni = i as i32 + di;
                                if ni < 0 || ni >= bins[1] as i32 {
                                    continue;
                                }
                                for dj in -1i32..=1 {
                                    let nj = j as i32 + dj;
                                    if nj < 0 || nj >= bins[2] as i32 {
                                        continue;
                                    }
                                    for dk in -1i32..=1 {
                                        let nk = k as i32 + dk;
                                        if nk < 0 || nk >= bins[3] as i32 {
                                            continue;
                                        }
                                        let v = grid.get(nh as usize, ni as usize, nj as usize, nk as usize);
                                        if v != 0 {
                                            sum += v as i64;
                                            hits += 1;
                                        }
                                    }
                                }
                            }
                        }

                        if hits > 0 {
                            let filled = (sum as f64 / hits as f64 + 0.5).floor() as i32;
                            shadow[offset(h, i, j, k)] = filled;
                            border_slots += 1;
                        }
                    }
                }
            }
        }

        let changed = shadow != grid.cells;
        grid.cells = shadow;

        if !changed || border_slots == 0 {
            break;
        }
    }

    debug!(
        "border_fill converged after {} iterations, {}/{} slots used",
        iterations, used_slots, total_slots
    );

    BorderFillReport {
        iterations,
        used_slots,
        total_slots,
    }
}

/// Broadcast collapsed-axis values (computed only at index 0) out to the
/// full `48x24x16x16` shape, so lookups always use a full-rank index.
fn broadcast(grid: &Grid) -> Tensor {
    let mut tensor = Tensor::zeroed();

    for h in 0..BINS_1 {
        let sh = if h < grid.bins[0] { h } else { 0 };
        for i in 0..BINS_2 {
            let si = if i < grid.bins[1] { i } else { 0 };
            for j in 0..BINS_3 {
                let sj = if j < grid.bins[2] { j } else { 0 };
                for k in 0..BINS_4 {
                    let sk = if k < grid.bins[3] { k } else { 0 };
                    tensor.set_saturating(h, i, j, k, grid.get(sh, si, sj, sk));
                }
            }
        }
    }

    tensor
}

/// Build a tensor from two raw analysis-result files.
pub fn build_tensor(
    music_bytes: &[u8],
    talk_bytes: &[u8],
    dimensions: u32,
    alternate: bool,
) -> (Tensor, FusionStats, BorderFillReport, u32, u32) {
    let bins = effective_bins(dimensions);
    let (dist1, n1) = read_analysis_results(music_bytes, alternate, bins);
    let (dist2, n2) = read_analysis_results(talk_bytes, alternate, bins);

    let (mut grid, stats) = fuse(&dist1, &dist2, n1.max(1), n2.max(1), bins);
    let report = border_fill(&mut grid);
    let tensor = broadcast(&grid);

    (tensor, stats, report, n1, n2)
}

/// Result of replaying a file's windows through the finished tensor
/// (tensor-gen.c's post-build self-test, scenario S4).
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfTestReport {
    pub window_count: u32,
    pub file1_hits: u32,
    pub file2_hits: u32,
}

/// Replay every window of `bytes` through `tensor`, honoring the same
/// alternate train/test partitioning used to build the histograms.
pub fn self_test(tensor: &Tensor, bytes: &[u8], alternate: bool) -> SelfTestReport {
    let mut report = SelfTestReport::default();

    for (window_count, chunk) in bytes.chunks_exact(AnalysisResult::BYTE_LEN).enumerate() {
        let record = AnalysisResult::from_bytes(chunk.try_into().unwrap());
        let (h, i, j, k) = record.tensor_index();
        let value = tensor.get(h, i, j, k);

        if !alternate || (window_count & 1) == 0 {
            if value > 0 {
                report.file1_hits += if alternate { 2 } else { 1 };
            } else if value < 0 {
                report.file2_hits += if alternate { 2 } else { 1 };
            }
        }

        report.window_count += 1;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(range_db: u8, cycles: u8, low_third: u8, mid_third: u8) -> AnalysisResult {
        AnalysisResult {
            range_db,
            cycles,
            low_third,
            mid_third,
            high_third: 0,
            attack_ratio: 0,
            peak_jitter: 0,
            spare: 0,
        }
    }

    #[test]
    fn unique_cells_saturate_to_plus_or_minus_99() {
        let music = result(10, 0, 0, 0).to_bytes();
        let talk = result(20, 0, 0, 0).to_bytes();
        let (tensor, stats, _report, _n1, _n2) = build_tensor(&music, &talk, 4, false);
        assert_eq!(tensor.get(10, 0, 0, 0), 99);
        assert_eq!(tensor.get(20, 0, 0, 0), -99);
        assert_eq!(stats.unique_slots1, 1);
        assert_eq!(stats.unique_slots2, 1);
    }

    #[test]
    fn border_fill_never_overwrites_an_existing_value() {
        let music = result(10, 0, 0, 0).to_bytes();
        let talk = result(12, 0, 0, 0).to_bytes();
        let (tensor, ..) = build_tensor(&music, &talk, 4, false);
        // The two seeded cells keep their saturated values after border-fill.
        assert_eq!(tensor.get(10, 0, 0, 0), 99);
        assert_eq!(tensor.get(12, 0, 0, 0), -99);
    }

    #[test]
    fn dimension_reduction_broadcasts_along_collapsed_axes() {
        let music = result(10, 40, 0, 0).to_bytes();
        let talk = result(20, 60, 0, 0).to_bytes();
        let (tensor, ..) = build_tensor(&music, &talk, 1, false);
        // With dimensions=1, axes 2-4 collapse to index 0, so every cycles
        // bucket at range_dB=10 must carry the same broadcast value.
        let v0 = tensor.get(10, 0, 0, 0);
        let v1 = tensor.get(10, 5, 3, 3);
        assert_eq!(v0, v1);
    }

    #[test]
    fn self_test_counts_positive_and_negative_lookups() {
        let music = result(10, 0, 0, 0).to_bytes();
        let talk = result(20, 0, 0, 0).to_bytes();
        let (tensor, ..) = build_tensor(&music, &talk, 4, false);
        let report = self_test(&tensor, &music, false);
        assert_eq!(report.window_count, 1);
        assert_eq!(report.file1_hits, 1);
        assert_eq!(report.file2_hits, 0);
    }
}
