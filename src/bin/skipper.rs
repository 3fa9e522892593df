//! `skipper` — streaming filter binary. Reads raw interleaved PCM from
//! stdin, classifies it window by window, and writes the edited stream to
//! stdout, narrating state transitions on stderr.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use skipper::analysis::analyze_window;
use skipper::cli::SkipperArgs;
use skipper::constants::Sizes;
use skipper::envelope::Envelope;
use skipper::error::AssetError;
use skipper::histogram::Histogram;
use skipper::reporter::Reporter;
use skipper::segmentation::Segmentation;
use skipper::splicer::Splicer;
use skipper::tensor::Tensor;

const FULL_SCALE_RMS: f64 = 32768.0 * 32767.0 * 0.5;

fn level_to_db(level: f64) -> i16 {
    let db = ((level / FULL_SCALE_RMS).log10() + 9.6) * 3413.0 + 0.5;
    db.floor().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

fn load_tensor(path: Option<&Path>) -> Result<Tensor, AssetError> {
    match path {
        None => Ok(Tensor::zeroed()),
        Some(p) => {
            let bytes = std::fs::read(p).map_err(|source| AssetError::Open {
                path: p.display().to_string(),
                source,
            })?;
            Ok(Tensor::load(&bytes)?)
        }
    }
}

struct RuntimeHistograms {
    range_db: Histogram,
    cycles: Histogram,
    low_third: Histogram,
    mid_third: Histogram,
    high_third: Histogram,
    attack_ratio: Histogram,
    peak_jitter: Histogram,
}

impl RuntimeHistograms {
    fn new() -> Self {
        Self {
            range_db: Histogram::new(256),
            cycles: Histogram::new(256),
            low_third: Histogram::new(256),
            mid_third: Histogram::new(256),
            high_third: Histogram::new(256),
            attack_ratio: Histogram::new(256),
            peak_jitter: Histogram::new(256),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = SkipperArgs::parse();
    let sizes = Sizes::new(args.sample_rate);
    let (skip_mode, threshold) = args.skip_mode();

    let tensor = load_tensor(args.tensor_file.as_deref()).context("loading classification tensor")?;
    let reporter = Reporter::new(args.quiet, args.verbose, args.sample_rate);

    let mut analysis_out = match &args.analysis_output {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("creating analysis output file {}", path.display()))?,
        )),
        None => None,
    };
    let mut histograms = RuntimeHistograms::new();

    let mut envelope = Envelope::new(args.sample_rate, sizes.ring_buff_len);
    let mut segmentation = Segmentation::new(&sizes, threshold);
    let mut splicer = Splicer::new(
        args.sample_rate,
        sizes.output_buff_len,
        sizes.crossfade_buff_len,
        skip_mode,
        args.keepalive,
    );

    let left_output = args.left_output.unwrap_or(0);
    let right_output = args.right_output.unwrap_or(0);
    let channels = args.channels as usize;
    let tensor_overlay_offset = sizes.level_buff_len + sizes.step_samples / 2;

    let mut level_buffer: Vec<f64> = Vec::with_capacity(sizes.level_buff_len);
    let mut num_samples: i64 = 0;
    let mut num_windows: u64 = 0;
    let mut music_hits: u64 = 0;
    let mut talk_hits: u64 = 0;

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut frame_bytes = vec![0u8; 2 * channels];

    loop {
        match reader.read_exact(&mut frame_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("reading PCM input"),
        }

        let left_in = i16::from_le_bytes([frame_bytes[0], frame_bytes[1]]);
        let right_in = if channels == 2 {
            i16::from_le_bytes([frame_bytes[2], frame_bytes[3]])
        } else {
            left_in
        };

        let mono = (left_in as f64 + right_in as f64) / 2.0;
        let level = envelope.process_mono(mono);
        level_buffer.push(level);

        let debug_sample = |which: u8| -> i16 {
            match which {
                1 => ((left_in as i32 + right_in as i32) >> 1) as i16,
                2 => envelope
                    .last_filtered()
                    .clamp(i16::MIN as f64, i16::MAX as f64) as i16,
                _ => 0,
            }
        };

        let left_sample = if left_output == 0 { left_in } else { debug_sample(left_output) };
        let right_sample = if right_output == 0 { right_in } else { debug_sample(right_output) };

        splicer.push_sample(left_sample, right_sample);
        num_samples += 1;

        let half_ring = sizes.ring_buff_len / 2;
        if splicer.output_idx() >= half_ring {
            let db = level_to_db(level);
            let left_db = if left_output == 3 { Some(db) } else { None };
            let right_db = if right_output == 3 { Some(db) } else { None };
            if left_db.is_some() || right_db.is_some() {
                splicer.overlay(half_ring, 1, left_db, right_db);
            }
        }

        if level_buffer.len() == sizes.level_buff_len {
            let result = analyze_window(&level_buffer, num_samples, args.sample_rate)
                .context("analyzing window")?;

            let (h, i, j, k) = result.tensor_index();
            let tensor_value = tensor.get(h, i, j, k) as i32;

            if tensor_value > threshold {
                music_hits += 1;
            } else if tensor_value < threshold {
                talk_hits += 1;
            }

            if let Some(out) = analysis_out.as_mut() {
                out.write_all(&result.to_bytes()).context("writing analysis output")?;
                histograms.range_db.record(result.range_db);
                histograms.cycles.record(result.cycles);
                histograms.low_third.record(result.low_third);
                histograms.mid_third.record(result.mid_third);
                histograms.high_third.record(result.high_third);
                histograms.attack_ratio.record(result.attack_ratio);
                histograms.peak_jitter.record(result.peak_jitter);
            }

            let transition = segmentation.process_window(tensor_value, num_samples);

            if (left_output == 4 || right_output == 4) && tensor_overlay_offset <= splicer.output_idx() {
                if let Some((sum, n)) = segmentation.last_smoothed() {
                    let value = ((sum * 100 + n / 2) / n) as i32 - threshold * 100;
                    let value = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                    let left = if left_output == 4 { Some(value) } else { None };
                    let right = if right_output == 4 { Some(value) } else { None };
                    splicer.overlay(
                        tensor_overlay_offset,
                        sizes.step_samples,
                        left,
                        right,
                    );
                }
            }

            if let Some(transition) = transition {
                let outcome = splicer
                    .apply_transition(transition, &mut writer)
                    .context("applying confirmed transition")?;
                if outcome.crossfaded {
                    reporter.crossfade_to(&mut io::stderr(), outcome.mode, outcome.transition_sample);
                } else {
                    reporter.detected(&mut io::stderr(), outcome.mode, num_samples, outcome.transition_sample);
                }
            }

            level_buffer.drain(0..sizes.step_samples);
            num_windows += 1;
        }

        match splicer
            .flush_if_needed(segmentation.confirmed_sample(), sizes.step_samples, &mut writer)
            .context("flushing output buffer")?
        {
            Some(skipper::splicer::FlushOutcome::Plain { wrote, frames }) => {
                reporter.slide(
                    &mut io::stderr(),
                    if wrote { "wrote" } else { "discarded" },
                    frames,
                    splicer.output_idx(),
                    segmentation.music_up(),
                    segmentation.talk_up(),
                );
            }
            Some(skipper::splicer::FlushOutcome::KeepAlive {
                frames_written,
                frames_discarded,
            }) => {
                reporter.keep_alive(&mut io::stderr(), splicer.current_mode(), frames_discarded, num_samples);
                let _ = frames_written;
            }
            None => {}
        }
    }

    let (wrote, frames) = splicer.drain(&mut writer);
    reporter.final_drain(&mut io::stderr(), wrote, frames, segmentation.music_up(), segmentation.talk_up());

    reporter.total_windows(&mut io::stderr(), num_windows);
    reporter.final_summary(
        &mut io::stderr(),
        num_samples,
        splicer.samples_written,
        splicer.samples_discarded,
        music_hits,
        talk_hits,
        num_windows,
    );

    if let Some(out) = analysis_out.as_mut() {
        out.flush().context("flushing analysis output")?;
        reporter.display_histograms(
            &mut io::stderr(),
            &[
                ("range_dB", &histograms.range_db),
                ("cycles", &histograms.cycles),
                ("low_third", &histograms.low_third),
                ("mid_third", &histograms.mid_third),
                ("high_third", &histograms.high_third),
                ("attack_ratio", &histograms.attack_ratio),
                ("peak_jitter", &histograms.peak_jitter),
            ],
        );
    }

    writer.flush().ok();
    Ok(())
}
