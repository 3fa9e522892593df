//! Adjusted-binary LZW compressor/decompressor (C2's payload codec).
//!
//! Grounded on the contract in `examples/original_source/lzwlib.h`:
//! `lzw_compress(write_byte, wctx, read_byte, rctx, maxbits)` and
//! `lzw_decompress(write_byte, wctx, read_byte, rctx)`, both byte-callback
//! driven. Since `lzw_decompress` takes no `maxbits` argument, the codec is
//! self-describing: the compressed stream begins with one raw byte holding
//! the `maxbits` used, followed by a code stream packed LSB-first at a
//! variable width that grows from 9 bits up to `maxbits` as the dictionary
//! fills, with a CLEAR code resetting the dictionary (and width) when it
//! saturates, and a STOP code marking the end of the stream.

use crate::streamer::{ByteSink, ByteSource};
use thiserror::Error;

const CLEAR_CODE: u32 = 256;
const STOP_CODE: u32 = 257;
const FIRST_FREE_CODE: u32 = 258;
const MIN_BITS: u32 = 9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LzwError {
    #[error("lzw: maxbits out of range (9-16)")]
    BadMaxBits,
    #[error("lzw: truncated stream")]
    Truncated,
    #[error("lzw: invalid code in stream")]
    InvalidCode,
}

struct BitWriter<'a, S: ByteSink + ?Sized> {
    sink: &'a mut S,
    buffer: u32,
    bits: u32,
}

impl<'a, S: ByteSink + ?Sized> BitWriter<'a, S> {
    fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            buffer: 0,
            bits: 0,
        }
    }

    fn push(&mut self, code: u32, width: u32) {
        self.buffer |= code << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.sink.write_byte((self.buffer & 0xFF) as u8);
            self.buffer >>= 8;
            self.bits -= 8;
        }
    }

    fn flush(&mut self) {
        if self.bits > 0 {
            self.sink.write_byte((self.buffer & 0xFF) as u8);
            self.buffer = 0;
            self.bits = 0;
        }
    }
}

struct BitReader<'a, S: ByteSource + ?Sized> {
    source: &'a mut S,
    buffer: u32,
    bits: u32,
}

impl<'a, S: ByteSource + ?Sized> BitReader<'a, S> {
    fn new(source: &'a mut S) -> Self {
        Self {
            source,
            buffer: 0,
            bits: 0,
        }
    }

    fn pull(&mut self, width: u32) -> Result<u32, LzwError> {
        while self.bits < width {
            match self.source.read_byte() {
                Some(b) => {
                    self.buffer |= (b as u32) << self.bits;
                    self.bits += 8;
                }
                None => return Err(LzwError::Truncated),
            }
        }
        let mask = (1u32 << width) - 1;
        let code = self.buffer & mask;
        self.buffer >>= width;
        self.bits -= width;
        Ok(code)
    }
}

fn width_for(next_code: u32) -> u32 {
    let mut w = MIN_BITS;
    while next_code > (1u32 << w) - 1 {
        w += 1;
    }
    w
}

/// Compress everything `source` yields into `sink`, at code width capped to
/// `maxbits` (9-16 inclusive). Returns the number of bytes written, per the
/// original's "non-zero return = error" convention inverted into a `Result`.
pub fn lzw_compress<Snk, Src>(sink: &mut Snk, source: &mut Src, maxbits: u32) -> Result<(), LzwError>
where
    Snk: ByteSink + ?Sized,
    Src: ByteSource + ?Sized,
{
    if !(9..=16).contains(&maxbits) {
        return Err(LzwError::BadMaxBits);
    }

    sink.write_byte(maxbits as u8);

    let mut table: std::collections::HashMap<(u32, u8), u32> = std::collections::HashMap::new();
    let mut next_code = FIRST_FREE_CODE;
    let mut codewidth = MIN_BITS;
    let mut writer = BitWriter::new(sink);

    let mut w_code: Option<u32> = None;

    while let Some(c) = source.read_byte() {
        if let Some(wc) = w_code {
            if let Some(&code) = table.get(&(wc, c)) {
                w_code = Some(code);
                continue;
            }

            writer.push(wc, codewidth);

            if next_code < (1u32 << maxbits) {
                table.insert((wc, c), next_code);
                next_code += 1;
                codewidth = width_for(next_code).min(maxbits);
            } else {
                writer.push(CLEAR_CODE, codewidth);
                table.clear();
                next_code = FIRST_FREE_CODE;
                codewidth = MIN_BITS;
            }

            w_code = Some(c as u32);
        } else {
            w_code = Some(c as u32);
        }
    }

    if let Some(wc) = w_code {
        writer.push(wc, codewidth);
    }

    writer.push(STOP_CODE, codewidth);
    writer.flush();

    Ok(())
}

fn decode_chain(code: u32, table: &[Option<(u32, u8)>]) -> Result<Vec<u8>, LzwError> {
    let mut out = Vec::new();
    let mut cur = code;
    loop {
        if cur < 256 {
            out.push(cur as u8);
            break;
        }
        match table.get(cur as usize).and_then(|e| *e) {
            Some((prefix, byte)) => {
                out.push(byte);
                cur = prefix;
            }
            None => return Err(LzwError::InvalidCode),
        }
    }
    out.reverse();
    Ok(out)
}

/// Decompress everything `source` yields into `sink`.
pub fn lzw_decompress<Snk, Src>(sink: &mut Snk, source: &mut Src) -> Result<(), LzwError>
where
    Snk: ByteSink + ?Sized,
    Src: ByteSource + ?Sized,
{
    let maxbits = source.read_byte().ok_or(LzwError::Truncated)? as u32;
    if !(9..=16).contains(&maxbits) {
        return Err(LzwError::BadMaxBits);
    }

    let mut table: Vec<Option<(u32, u8)>> = vec![None; 1usize << maxbits];
    let mut next_code = FIRST_FREE_CODE;
    let mut codewidth = MIN_BITS;
    let mut reader = BitReader::new(source);
    let mut prev_code: Option<u32> = None;

    loop {
        let code = reader.pull(codewidth)?;

        if code == STOP_CODE {
            break;
        }

        if code == CLEAR_CODE {
            table = vec![None; 1usize << maxbits];
            next_code = FIRST_FREE_CODE;
            codewidth = MIN_BITS;
            prev_code = None;
            continue;
        }

        let string = if code < 256 || table.get(code as usize).and_then(|e| *e).is_some() {
            decode_chain(code, &table)?
        } else if code == next_code {
            let mut prev = decode_chain(prev_code.ok_or(LzwError::InvalidCode)?, &table)?;
            let first = prev[0];
            prev.push(first);
            prev
        } else {
            return Err(LzwError::InvalidCode);
        };

        for &b in &string {
            sink.write_byte(b);
        }

        if let Some(pc) = prev_code {
            if next_code < (1u32 << maxbits) {
                table[next_code as usize] = Some((pc, string[0]));
                next_code += 1;
                codewidth = width_for(next_code).min(maxbits);
            }
        }

        prev_code = Some(code);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamer::RingStreamer;

    fn roundtrip(data: &[u8], maxbits: u32) -> Vec<u8> {
        let mut reader = RingStreamer::for_reading(data.to_vec());
        let mut writer = RingStreamer::for_writing(data.len() * 2 + 64);
        lzw_compress(&mut writer, &mut reader, maxbits).unwrap();
        let compressed = writer.into_bytes()[..writer_len(data, maxbits)].to_vec();
        let mut creader = RingStreamer::for_reading(compressed);
        let mut cwriter = RingStreamer::for_writing(data.len());
        lzw_decompress(&mut cwriter, &mut creader).unwrap();
        cwriter.into_bytes()
    }

    fn writer_len(data: &[u8], maxbits: u32) -> usize {
        let mut reader = RingStreamer::for_reading(data.to_vec());
        let mut writer = RingStreamer::for_writing(data.len() * 2 + 64);
        lzw_compress(&mut writer, &mut reader, maxbits).unwrap();
        writer.index()
    }

    #[test]
    fn roundtrips_repetitive_data() {
        let data: Vec<u8> = (0..10_000).map(|i| ((i / 37) % 5) as u8).collect();
        assert_eq!(roundtrip(&data, 12), data);
    }

    #[test]
    fn roundtrips_random_like_data() {
        let mut x: u32 = 12345;
        let data: Vec<u8> = (0..5000)
            .map(|_| {
                x = x.wrapping_mul(1103515245).wrapping_add(12345);
                (x >> 16) as u8
            })
            .collect();
        assert_eq!(roundtrip(&data, 16), data);
    }

    #[test]
    fn roundtrips_all_zero_tensor_sized_buffer() {
        let data = vec![0u8; 294_912];
        assert_eq!(roundtrip(&data, 9), data);
    }

    #[test]
    fn forces_clear_code_at_small_maxbits() {
        let data: Vec<u8> = (0..50_000).map(|i| (i % 251) as u8).collect();
        assert_eq!(roundtrip(&data, 9), data);
    }
}
