//! End-to-end `tensor-gen` pipeline scenarios (spec.md §8): build a tensor
//! from synthetic analysis-result files, round-trip it through the on-disk
//! format, and replay it through the self-test pass.

use skipper::analysis::AnalysisResult;
use skipper::builder::{build_tensor, self_test};
use skipper::tensor::{Tensor, TensorError};

fn result(range_db: u8, cycles: u8) -> AnalysisResult {
    AnalysisResult {
        range_db,
        cycles,
        low_third: 0,
        mid_third: 0,
        high_third: 0,
        attack_ratio: 0,
        peak_jitter: 0,
        spare: 0,
    }
}

fn records(pairs: &[(u8, u8)]) -> Vec<u8> {
    pairs.iter().flat_map(|&(r, c)| result(r, c).to_bytes()).collect()
}

#[test]
fn alternate_mode_halves_each_file_and_self_test_favors_the_trained_class() {
    // Every record alternates range_dB so the two halves land in disjoint
    // tensor cells: with `alternate` set, only the odd-indexed (0-based)
    // windows of each file are counted when building the tensor, each
    // weighted by 2 (tensor-gen.c's train/test split).
    let music = records(&[(5, 0), (5, 0), (5, 0), (5, 0)]);
    let talk = records(&[(40, 0), (40, 0), (40, 0), (40, 0)]);

    let (tensor, stats, _report, n1, n2) = build_tensor(&music, &talk, 4, true);
    assert_eq!(n1, 4);
    assert_eq!(n2, 4);
    // Only the odd-indexed windows contributed, each weighted 2, so the
    // unique-hit counts reflect 2 windows worth of weight per file.
    assert_eq!(stats.unique_hits1, 4);
    assert_eq!(stats.unique_hits2, 4);
    assert_eq!(tensor.get(5, 0, 0, 0), 99);
    assert_eq!(tensor.get(40, 0, 0, 0), -99);

    // Self-test replays the *other* half (alternate test partition) and
    // should cleanly attribute every window to the class that trained it.
    let music_report = self_test(&tensor, &music, true);
    assert_eq!(music_report.file1_hits, 4);
    assert_eq!(music_report.file2_hits, 0);

    let talk_report = self_test(&tensor, &talk, true);
    assert_eq!(talk_report.file1_hits, 0);
    assert_eq!(talk_report.file2_hits, 4);
}

#[test]
fn built_tensor_round_trips_through_save_and_load() {
    let music = records(&[(5, 10), (6, 12), (7, 8)]);
    let talk = records(&[(50, 10), (51, 12), (52, 8)]);
    let (tensor, ..) = build_tensor(&music, &talk, 4, false);

    let bytes = tensor.save();
    let loaded = Tensor::load(&bytes).expect("a freshly built tensor must round-trip");

    assert_eq!(loaded.as_bytes(), tensor.as_bytes());
    assert_eq!(loaded.checksum(), tensor.checksum());

    let before = self_test(&tensor, &music, false);
    let after = self_test(&loaded, &music, false);
    assert_eq!(before.file1_hits, after.file1_hits);
    assert_eq!(before.file2_hits, after.file2_hits);
}

#[test]
fn a_single_corrupted_byte_is_rejected_on_load() {
    let music = records(&[(5, 10), (6, 12), (7, 8)]);
    let talk = records(&[(50, 10), (51, 12), (52, 8)]);
    let (tensor, ..) = build_tensor(&music, &talk, 4, false);

    let mut bytes = tensor.save();
    // Corrupt a payload byte (past the 12-byte header) rather than the
    // header, so dimension/version checks can't mask the checksum check.
    let corrupt_at = bytes.len() - 1;
    bytes[corrupt_at] ^= 0x01;

    let err = Tensor::load(&bytes);
    assert!(
        matches!(err, Err(TensorError::ChecksumMismatch) | Err(TensorError::Malformed) | Err(TensorError::Lzw(_))),
        "expected a load-time rejection, got {err:?}"
    );
}

#[test]
fn truncated_file_is_rejected_before_touching_the_payload() {
    let err = Tensor::load(&[0u8; 4]);
    assert_eq!(err, Err(TensorError::Truncated));
}

#[test]
fn built_tensor_round_trips_through_a_real_tensor_file() {
    use std::fs;
    use tempfile::NamedTempFile;

    let music = records(&[(5, 10), (6, 12), (7, 8)]);
    let talk = records(&[(50, 10), (51, 12), (52, 8)]);
    let (tensor, ..) = build_tensor(&music, &talk, 4, false);

    let tmp = NamedTempFile::new().expect("create temp tensor file");
    fs::write(tmp.path(), tensor.save()).expect("write tensor file");

    let bytes = fs::read(tmp.path()).expect("read tensor file back");
    let loaded = Tensor::load(&bytes).expect("a tensor written to disk must round-trip");

    assert_eq!(loaded.as_bytes(), tensor.as_bytes());
    assert_eq!(loaded.checksum(), tensor.checksum());
}
