//! Byte parsing helpers
//!
//! Cursor-style readers shared by the instruction envelope and the public
//! parameter decoders. All integers are little-endian.

use crate::error::PoolError;
use crate::Hash32;

/// Read a fixed-size byte array
#[inline]
pub fn read_bytes<const N: usize>(data: &[u8], offset: &mut usize) -> Result<[u8; N], PoolError> {
    let end = offset.checked_add(N).ok_or(PoolError::InvalidInstructionData)?;
    if data.len() < end {
        return Err(PoolError::InvalidInstructionData);
    }
    let mut result = [0u8; N];
    result.copy_from_slice(&data[*offset..end]);
    *offset = end;
    Ok(result)
}

/// Read a 32-byte field (commitment, nullifier, root, address)
#[inline]
pub fn read_bytes32(data: &[u8], offset: &mut usize) -> Result<Hash32, PoolError> {
    read_bytes::<32>(data, offset)
}

#[inline]
pub fn parse_u32_le(data: &[u8], offset: &mut usize) -> Result<u32, PoolError> {
    read_bytes::<4>(data, offset).map(u32::from_le_bytes)
}

#[inline]
pub fn parse_u64_le(data: &[u8], offset: &mut usize) -> Result<u64, PoolError> {
    read_bytes::<8>(data, offset).map(u64::from_le_bytes)
}

#[inline]
pub fn parse_u8(data: &[u8], offset: &mut usize) -> Result<u8, PoolError> {
    read_bytes::<1>(data, offset).map(|b| b[0])
}

/// Read a `u32` length prefix followed by that many bytes, bounded by `max_len`
pub fn read_len_prefixed<'a>(
    data: &'a [u8],
    offset: &mut usize,
    max_len: usize,
) -> Result<&'a [u8], PoolError> {
    let len = parse_u32_le(data, offset)? as usize;
    if len > max_len {
        return Err(PoolError::InvalidInstructionData);
    }
    let end = offset.checked_add(len).ok_or(PoolError::InvalidInstructionData)?;
    if data.len() < end {
        return Err(PoolError::InvalidInstructionData);
    }
    let bytes = &data[*offset..end];
    *offset = end;
    Ok(bytes)
}

/// Read a `u32` count followed by that many 32-byte values, bounded by `max_count`
pub fn read_hash_list(
    data: &[u8],
    offset: &mut usize,
    max_count: usize,
) -> Result<Vec<Hash32>, PoolError> {
    let count = parse_u32_le(data, offset)? as usize;
    if count > max_count {
        return Err(PoolError::InvalidInstructionData);
    }
    (0..count).map(|_| read_bytes32(data, offset)).collect()
}

/// Reject trailing bytes after a fixed-shape record
#[inline]
pub fn ensure_consumed(data: &[u8], offset: usize) -> Result<(), PoolError> {
    if offset != data.len() {
        return Err(PoolError::InvalidInstructionData);
    }
    Ok(())
}

/// Append a `u32` count followed by the values
pub fn write_hash_list(out: &mut Vec<u8>, values: &[Hash32]) {
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        out.extend_from_slice(value);
    }
}

/// Append a `u32` length prefix followed by the bytes
pub fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}
