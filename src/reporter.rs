//! Run-scoped reporting context (spec.md §9's "re-architect as a run-scoped
//! context structure" redesign note): owns the quiet/verbose flags and
//! prints the exact stderr protocol lines the original tool emits, so the
//! documented wording end-to-end tests key off (spec.md §8) survives the
//! rewrite untouched.
//!
//! This is deliberately *not* routed through `log`: these lines are part of
//! this tool's user-facing contract, not developer diagnostics.

use crate::builder::{BorderFillReport, FusionStats, SelfTestReport};
use crate::histogram::Histogram;
use crate::segmentation::Mode;
use std::io::Write;

fn mins_secs(samples: i64, sample_rate: u32) -> (i64, i64) {
    let total_secs = samples.div_euclid(sample_rate as i64).max(0);
    (total_secs / 60, total_secs % 60)
}

pub struct Reporter {
    quiet: bool,
    verbose_period_secs: Option<u32>,
    sample_rate: u32,
}

impl Reporter {
    pub fn new(quiet: bool, verbose_period_secs: Option<u32>, sample_rate: u32) -> Self {
        Self {
            quiet,
            verbose_period_secs,
            sample_rate,
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose_period_secs.is_some()
    }

    fn mode_name(mode: Mode) -> &'static str {
        match mode {
            Mode::Music => "MUSIC",
            Mode::Talk => "TALK",
            Mode::None => "NOTHING",
        }
    }

    pub fn detected<W: Write>(&self, out: &mut W, mode: Mode, num_samples: i64, transition_sample: i64) {
        if self.quiet {
            return;
        }
        let (nm, ns) = mins_secs(num_samples, self.sample_rate);
        let (tm, ts) = mins_secs(transition_sample, self.sample_rate);
        let _ = writeln!(
            out,
            "{:02}:{:02}: detected {} starting at {:02}:{:02}",
            nm, ns, Self::mode_name(mode), tm, ts
        );
    }

    pub fn crossfade_to<W: Write>(&self, out: &mut W, mode: Mode, at_sample: i64) {
        if self.quiet {
            return;
        }
        let (m, s) = mins_secs(at_sample, self.sample_rate);
        let _ = writeln!(out, "crossfade to {} at {:02}:{:02}", Self::mode_name(mode), m, s);
    }

    pub fn pending_cancelled<W: Write>(&self, out: &mut W, cancelling: Mode, pend_windows: u32, step_msecs: u32) {
        if !self.is_verbose() {
            return;
        }
        let secs = (pend_windows as u64 * step_msecs as u64 + 500) / 1000;
        let _ = writeln!(
            out,
            "{} detection pending for {} secs, cancelled...",
            Self::mode_name(cancelling), secs
        );
    }

    pub fn slide<W: Write>(&self, out: &mut W, action: &str, frames: usize, output_idx: usize, music_up: u32, talk_up: u32) {
        if !self.is_verbose() {
            return;
        }
        let _ = writeln!(
            out,
            "{} {} samples ({:.1} secs), output_buffer_index now {} ({:.1} secs), music/talk counts = {}/{}",
            action,
            frames,
            frames as f64 / self.sample_rate as f64,
            output_idx,
            output_idx as f64 / self.sample_rate as f64,
            music_up,
            talk_up,
        );
    }

    pub fn keep_alive<W: Write>(&self, out: &mut W, mode: Mode, discarded: usize, written_at: i64) {
        let (m, s) = mins_secs(written_at, self.sample_rate);
        if self.is_verbose() {
            let _ = writeln!(
                out,
                "discarded {} samples ({:.1} secs), inserted a {} crossfade at {:02}:{:02}",
                discarded,
                discarded as f64 / self.sample_rate as f64,
                if mode == Mode::Music { "MUSICAL" } else { "TALKING" },
                m, s
            );
        } else if !self.quiet {
            let _ = writeln!(
                out,
                "{} keep-alive at {:02}:{:02}",
                if mode == Mode::Music { "MUSICAL" } else { "TALKING" },
                m, s
            );
        }
    }

    pub fn total_windows<W: Write>(&self, out: &mut W, num_windows: u64) {
        if self.is_verbose() {
            let _ = writeln!(out, "total windows = {}", num_windows);
        }
    }

    pub fn final_drain<W: Write>(&self, out: &mut W, wrote: bool, frames: usize, music_up: u32, talk_up: u32) {
        if !self.is_verbose() {
            return;
        }
        let _ = writeln!(
            out,
            "final: {} {} samples ({:.1} secs), music/talk counts = {}/{}",
            if wrote { "wrote" } else { "discarded" },
            frames,
            frames as f64 / self.sample_rate as f64,
            music_up,
            talk_up,
        );
    }

    pub fn final_summary<W: Write>(
        &self,
        out: &mut W,
        num_samples: i64,
        samples_written: i64,
        samples_discarded: i64,
        music_hits: u64,
        talk_hits: u64,
        num_windows: u64,
    ) {
        if self.quiet {
            return;
        }
        let (m, s) = mins_secs(num_samples, self.sample_rate);
        let _ = writeln!(out, "total input duration = {:02}:{:02}", m, s);

        if num_windows > 0 {
            let unknowns = num_windows.saturating_sub(music_hits).saturating_sub(talk_hits);
            let _ = writeln!(
                out,
                "raw music hits = {} ({:.1}%), raw talk hits = {} ({:.1}%), unknowns = {} ({:.1}%)",
                music_hits,
                music_hits as f64 * 100.0 / num_windows as f64,
                talk_hits,
                talk_hits as f64 * 100.0 / num_windows as f64,
                unknowns,
                unknowns as f64 * 100.0 / num_windows as f64,
            );
        }

        let total = (samples_written + samples_discarded).max(1);
        let (wm, ws) = mins_secs(samples_written, self.sample_rate);
        let (dm, ds) = mins_secs(samples_discarded, self.sample_rate);
        let _ = writeln!(
            out,
            "audio written = {:02}:{:02} ({:.1}%), audio discarded = {:02}:{:02} ({:.1}%)\n",
            wm, ws, samples_written as f64 * 100.0 / total as f64,
            dm, ds, samples_discarded as f64 * 100.0 / total as f64,
        );
    }

    /// Prints the seven runtime histograms' summaries, as
    /// `display_analysis_results` does.
    pub fn display_histograms<W: Write>(&self, out: &mut W, named: &[(&str, &Histogram)]) {
        for (name, histogram) in named {
            if let Some(summary) = histogram.summary() {
                let _ = writeln!(
                    out,
                    "{}: range = {} to {}, mean = {:.4}, median = {:.4}, mode = {:.1}",
                    name, summary.min_value, summary.max_value, summary.mean, summary.median, summary.mode
                );
                for percent in [50, 75, 90, 95, 98] {
                    if let Some(p) = histogram.population(percent) {
                        let _ = writeln!(
                            out,
                            "    {} ({:.1}%): {} to {}",
                            p.sum,
                            p.sum as f64 * 100.0 / summary.hits as f64,
                            p.low_value,
                            p.high_value
                        );
                    }
                }
            }
        }
    }

    /// tensor-gen's per-class fusion bookkeeping (tensor-gen.c lines 134-193).
    pub fn fusion_stats<W: Write>(&self, out: &mut W, label: &str, windows: u32, stats_hits: u64, unique_hits: u64, unique_slots: u64, common_hits: u64, common_slots: u64, guess_hits: u64, guess_misses: u64) {
        let _ = stats_hits;
        let _ = writeln!(out, "{label}: {windows} windows");
        let _ = writeln!(
            out,
            "       {} unique hits in {} slots, {:.1}%",
            unique_hits, unique_slots, unique_hits as f64 * 100.0 / windows.max(1) as f64
        );
        let _ = writeln!(out, "       {} common hits in {} slots", common_hits, common_slots);
        let _ = writeln!(
            out,
            "       {} guess hits in {} slots, {:.1}%",
            guess_hits, common_slots, guess_hits as f64 * 100.0 / windows.max(1) as f64
        );
        let _ = writeln!(
            out,
            "       {} guess misses in {} slots, {:.1}%",
            guess_misses, common_slots, guess_misses as f64 * 100.0 / windows.max(1) as f64
        );
        let _ = writeln!(
            out,
            "       {} unique hits and {} guess hits = {:.1}%\n",
            unique_hits, guess_hits, (unique_hits + guess_hits) as f64 * 100.0 / windows.max(1) as f64
        );
    }

    pub fn build_report<W: Write>(&self, out: &mut W, n1: u32, n2: u32, stats: &FusionStats) {
        self.fusion_stats(out, "file1", n1, 0, stats.unique_hits1, stats.unique_slots1, stats.common_hits1, stats.common_slots, stats.guess_hits1, stats.guess_misses1);
        self.fusion_stats(out, "file2", n2, 0, stats.unique_hits2, stats.unique_slots2, stats.common_hits2, stats.common_slots, stats.guess_hits2, stats.guess_misses2);
    }

    pub fn border_fill_report<W: Write>(&self, out: &mut W, report: &BorderFillReport) {
        let _ = writeln!(
            out,
            "{} / {} slots used, {:.1}%, {} border-fill iteration(s)",
            report.used_slots,
            report.total_slots,
            report.used_slots as f64 * 100.0 / report.total_slots.max(1) as f64,
            report.iterations
        );
    }

    pub fn self_test_report<W: Write>(&self, out: &mut W, label: &str, report: &SelfTestReport) {
        let unknown = report
            .window_count
            .saturating_sub(report.file1_hits)
            .saturating_sub(report.file2_hits);
        let _ = writeln!(
            out,
            "{label}: read {} windows, file1 hits = {} ({:.1}%), file2 hits = {} ({:.1}%), ??? = {} ({:.1}%)",
            report.window_count,
            report.file1_hits,
            report.file1_hits as f64 * 100.0 / report.window_count.max(1) as f64,
            report.file2_hits,
            report.file2_hits as f64 * 100.0 / report.window_count.max(1) as f64,
            unknown,
            unknown as f64 * 100.0 / report.window_count.max(1) as f64,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_suppresses_detection_line() {
        let r = Reporter::new(true, None, 44_100);
        let mut buf = Vec::new();
        r.detected(&mut buf, Mode::Music, 44_100, 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn detected_line_matches_expected_wording() {
        let r = Reporter::new(false, None, 44_100);
        let mut buf = Vec::new();
        r.detected(&mut buf, Mode::Music, 44_100 * 65, 44_100 * 60);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("detected MUSIC starting at"));
    }
}
