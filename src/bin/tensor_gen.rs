//! `tensor-gen` — offline tensor builder binary. Fuses two labeled
//! analysis-result files into a classification tensor, reporting fusion and
//! border-fill statistics plus a post-build self-test on stderr.

use std::fs;
use std::io;

use anyhow::{Context, Result};
use clap::Parser;

use skipper::builder::{build_tensor, self_test};
use skipper::cli::TensorGenArgs;
use skipper::reporter::Reporter;

fn main() -> Result<()> {
    env_logger::init();
    let args = TensorGenArgs::parse();

    let music_bytes = fs::read(&args.music_file)
        .with_context(|| format!("reading {}", args.music_file.display()))?;
    let talk_bytes = fs::read(&args.talk_file)
        .with_context(|| format!("reading {}", args.talk_file.display()))?;

    let (tensor, stats, border_report, n1, n2) =
        build_tensor(&music_bytes, &talk_bytes, args.dimensions, args.alternate);

    let reporter = Reporter::new(false, None, 44_100);
    let mut err = io::stderr();

    reporter.build_report(&mut err, n1, n2, &stats);
    reporter.border_fill_report(&mut err, &border_report);

    let self1 = self_test(&tensor, &music_bytes, args.alternate);
    let self2 = self_test(&tensor, &talk_bytes, args.alternate);
    reporter.self_test_report(&mut err, "file1", &self1);
    reporter.self_test_report(&mut err, "file2", &self2);

    if let Some(out_path) = &args.out_file {
        fs::write(out_path, tensor.save())
            .with_context(|| format!("writing {}", out_path.display()))?;
    }

    Ok(())
}
