//! Error taxonomy (spec.md §7): argument errors are handled by `clap` at the
//! binary entry points; asset errors and runtime invariants are collected
//! here as `thiserror`-derived enums and bubbled up through `anyhow` in
//! `main()`.

use crate::tensor::TensorError;
use thiserror::Error;

/// Failures loading or validating a tensor asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("can't open \"{path}\" for reading")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tensor")]
    Tensor(#[from] TensorError),
}

/// Runtime invariant violations (spec.md §7 kind iii): these indicate
/// tensor/parameter misconfiguration, not recoverable stream data, and are
/// fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("skipped transition, buffer out of range")]
    TransitionOutOfRange,
    #[error("buffer full with no confirmed samples")]
    BufferOverrun,
    #[error("attack-ratio math degenerate (cycles >= 4 but attack_count or decay_count is zero)")]
    DegenerateAttackRatio,
}
