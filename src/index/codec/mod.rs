//! Binary serialization for [`VectorIndex`].
//!
//! Layout (all integers and floats little-endian):
//!
//! | bytes | field                         |
//! |-------|-------------------------------|
//! | 4     | magic `VMIX`                  |
//! | 2     | format version                |
//! | 4     | dimension                     |
//! | 8     | vector count                  |
//! | 8     | generation                    |
//! | 4·d·n | row-major `f32` vector data   |


use super::VectorIndex;
use crate::{RagError, Result};

const MAGIC: &[u8; 4] = b"VMIX";
const FORMAT_VERSION: u16 = 1;
pub(crate) const HEADER_LEN: usize = 4 + 2 + 4 + 8 + 8;

#[inline]
pub fn encode(index: &VectorIndex) -> Vec<u8> {
    let data = index.raw_data();
    let mut bytes = Vec::with_capacity(index.serialized_size());

    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
    bytes.extend_from_slice(&(index.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&index.generation().to_le_bytes());
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    bytes
}

#[inline]
pub fn decode(bytes: &[u8]) -> Result<VectorIndex> {
    if bytes.len() < HEADER_LEN {
        return Err(RagError::CorruptIndex(format!(
            "expected at least {} header bytes, found {}",
            HEADER_LEN,
            bytes.len()
        )));
    }

    let (header, body) = bytes.split_at(HEADER_LEN);
    let mut reader = HeaderReader { bytes: header };

    if reader.take::<4>() != *MAGIC {
        return Err(RagError::CorruptIndex("bad magic bytes".to_string()));
    }

    let version = u16::from_le_bytes(reader.take());
    if version != FORMAT_VERSION {
        return Err(RagError::CorruptIndex(format!(
            "unsupported format version {}",
            version
        )));
    }

    let dimension = u32::from_le_bytes(reader.take()) as usize;
    let count = usize::try_from(u64::from_le_bytes(reader.take()))
        .map_err(|_| RagError::CorruptIndex("vector count overflows usize".to_string()))?;
    let generation = u64::from_le_bytes(reader.take());

    if dimension == 0 && count > 0 {
        return Err(RagError::CorruptIndex(
            "zero dimension with non-zero vector count".to_string(),
        ));
    }

    let expected_body = count
        .checked_mul(dimension)
        .and_then(|values| values.checked_mul(size_of::<f32>()))
        .ok_or_else(|| RagError::CorruptIndex("vector data size overflows".to_string()))?;
    if body.len() != expected_body {
        return Err(RagError::CorruptIndex(format!(
            "expected {} bytes of vector data for {} x {}, found {}",
            expected_body,
            count,
            dimension,
            body.len()
        )));
    }

    let data = body
        .chunks_exact(size_of::<f32>())
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(VectorIndex::from_parts(dimension, generation, data))
}

struct HeaderReader<'a> {
    bytes: &'a [u8],
}

impl HeaderReader<'_> {
    /// Callers only read the fixed header after its length was checked
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let (head, rest) = self.bytes.split_at(N);
        self.bytes = rest;
        let mut out = [0_u8; N];
        out.copy_from_slice(head);
        out
    }
}
