//! Tensor container (C2): a fixed-shape `48x24x16x16` signed-byte
//! classification table, persisted as a 12-byte header followed by an
//! LZW-compressed payload and validated with an additive checksum
//! (spec.md §3, §4.7).

use crate::lzw::{lzw_compress, lzw_decompress, LzwError};
use crate::streamer::{ByteSink, RingStreamer};
use log::debug;
use thiserror::Error;

pub const BINS_1: usize = 48; // range_dB
pub const BINS_2: usize = 24; // cycles >> 1
pub const BINS_3: usize = 16; // low_third >> 4
pub const BINS_4: usize = 16; // mid_third >> 4

pub const TENSOR_CELLS: usize = BINS_1 * BINS_2 * BINS_3 * BINS_4;
pub const TENSOR_VERSION: u32 = 1;
pub const TENSOR_DIMENSIONS: [u8; 4] = [BINS_1 as u8, BINS_2 as u8, BINS_3 as u8, BINS_4 as u8];
const HEADER_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TensorError {
    #[error("tensor file truncated (shorter than header)")]
    Truncated,
    #[error("tensor has wrong dimensions")]
    BadDimensions,
    #[error("tensor has unsupported version")]
    BadVersion,
    #[error("lzw decompression failed: {0}")]
    Lzw(#[from] LzwError),
    #[error("tensor decompressed to the wrong size or overran its buffer")]
    Malformed,
    #[error("tensor checksum mismatch")]
    ChecksumMismatch,
}

/// `48x24x16x16` signed-byte classification table, stored contiguous and
/// row-major. Values in `[-99, 99]`; positive is music-like, negative is
/// talk-like, zero is unseen.
#[derive(Clone)]
pub struct Tensor {
    data: Vec<i8>,
}

impl Tensor {
    /// An "unseen everywhere" tensor: every lookup returns 0. Used as the
    /// embedded fallback when no `-d` tensor file is supplied (see
    /// DESIGN.md for why this crate cannot ship real trained weights).
    pub fn zeroed() -> Self {
        Self {
            data: vec![0i8; TENSOR_CELLS],
        }
    }

    pub fn from_cells(data: Vec<i8>) -> Self {
        assert_eq!(data.len(), TENSOR_CELLS);
        Self { data }
    }

    #[inline]
    pub(crate) fn offset(h: usize, i: usize, j: usize, k: usize) -> usize {
        ((h * BINS_2 + i) * BINS_3 + j) * BINS_4 + k
    }

    pub fn data(&self) -> &[i8] {
        &self.data
    }

    /// Bounds-checked getter; indices must already be in range (callers
    /// clamp via `clamp_index`).
    #[inline]
    pub fn get(&self, h: usize, i: usize, j: usize, k: usize) -> i8 {
        self.data[Self::offset(h, i, j, k)]
    }

    /// Saturating setter: clamps `value` into `[-99, 99]` before storing.
    #[inline]
    pub fn set_saturating(&mut self, h: usize, i: usize, j: usize, k: usize, value: i32) {
        let clamped = value.clamp(-99, 99) as i8;
        self.data[Self::offset(h, i, j, k)] = clamped;
    }

    pub fn as_bytes(&self) -> &[i8] {
        &self.data
    }

    /// Additive checksum over the raw bytes, matching the original's
    /// `unsigned char` byte-sum (mod 2^32).
    pub fn checksum(&self) -> u32 {
        self.data
            .iter()
            .fold(0u32, |acc, &b| acc.wrapping_add(b as u8 as u32))
    }

    /// Serialize header + best-of-(9..=16)-bits LZW payload.
    pub fn save(&self) -> Vec<u8> {
        let raw: Vec<u8> = self.data.iter().map(|&b| b as u8).collect();
        let checksum = self.checksum();

        let mut best: Option<(u32, Vec<u8>)> = None;

        for maxbits in 9..=16u32 {
            let mut reader = RingStreamer::for_reading(raw.clone());
            let mut writer = RingStreamer::for_writing(raw.len());

            if lzw_compress(&mut writer, &mut reader, maxbits).is_err() {
                continue;
            }

            if writer.wrapped() != 0 {
                continue; // didn't fit: compression didn't help at this width
            }

            let size = writer.index();
            let bytes = writer.into_bytes()[..size].to_vec();

            debug!("lzw maxbits={} produced {} bytes", maxbits, bytes.len());

            if best.as_ref().map(|(_, b)| bytes.len() < b.len()).unwrap_or(true) {
                best = Some((maxbits, bytes));
            }
        }

        let (chosen_maxbits, payload) = best.expect("maxbits 9..=16 always yields some candidate");
        debug!("lzw chose maxbits={} ({} bytes)", chosen_maxbits, payload.len());

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&TENSOR_VERSION.to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out.extend_from_slice(&TENSOR_DIMENSIONS);
        out.extend_from_slice(&payload);
        out
    }

    /// Parse header + LZW payload, validating dimensions, version,
    /// exact-consumption of both streams, and the additive checksum.
    pub fn load(bytes: &[u8]) -> Result<Self, TensorError> {
        if bytes.len() < HEADER_LEN {
            return Err(TensorError::Truncated);
        }

        let version = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let checksum = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let dimensions: [u8; 4] = bytes[8..12].try_into().unwrap();

        if dimensions != TENSOR_DIMENSIONS {
            return Err(TensorError::BadDimensions);
        }
        if version != TENSOR_VERSION {
            return Err(TensorError::BadVersion);
        }

        let mut reader = RingStreamer::for_reading(bytes[HEADER_LEN..].to_vec());
        let mut writer = RingStreamer::for_writing(TENSOR_CELLS);

        lzw_decompress(&mut writer, &mut reader)?;

        if !reader.exactly_consumed() || !writer.exactly_consumed() {
            return Err(TensorError::Malformed);
        }

        let raw = writer.into_bytes();
        let sum = raw.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32));

        if checksum != sum {
            return Err(TensorError::ChecksumMismatch);
        }

        let data: Vec<i8> = raw.into_iter().map(|b| b as i8).collect();
        Ok(Self { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_zeroed_tensor() {
        let t = Tensor::zeroed();
        let bytes = t.save();
        let loaded = Tensor::load(&bytes).unwrap();
        assert_eq!(loaded.as_bytes(), t.as_bytes());
    }

    #[test]
    fn roundtrip_populated_tensor() {
        let mut t = Tensor::zeroed();
        for h in 0..BINS_1 {
            for i in 0..BINS_2 {
                t.set_saturating(h, i, 3, 7, (h as i32 * 3 - i as i32 * 5) % 100);
            }
        }
        let bytes = t.save();
        let loaded = Tensor::load(&bytes).unwrap();
        assert_eq!(loaded.as_bytes(), t.as_bytes());
        assert_eq!(loaded.checksum(), t.checksum());
    }

    #[test]
    fn load_rejects_bad_checksum() {
        let t = Tensor::zeroed_with_one_set();
        let mut bytes = t.save();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = Tensor::load(&bytes);
        assert!(matches!(
            err,
            Err(TensorError::ChecksumMismatch) | Err(TensorError::Malformed) | Err(TensorError::Lzw(_))
        ));
    }

    #[test]
    fn load_rejects_bad_dimensions() {
        let t = Tensor::zeroed();
        let mut bytes = t.save();
        bytes[8] = 47; // corrupt first dimension byte
        assert_eq!(Tensor::load(&bytes), Err(TensorError::BadDimensions));
    }

    #[test]
    fn load_rejects_bad_version() {
        let t = Tensor::zeroed();
        let mut bytes = t.save();
        bytes[0..4].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(Tensor::load(&bytes), Err(TensorError::BadVersion));
    }

    impl Tensor {
        fn zeroed_with_one_set() -> Self {
            let mut t = Tensor::zeroed();
            t.set_saturating(10, 5, 2, 2, 42);
            t
        }
    }
}
