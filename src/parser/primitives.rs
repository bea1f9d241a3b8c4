//! Fixed-width and varint integer reads shared by the container parsers

/// Reads `width` (1 to 4) little-endian bytes at `offset` as an unsigned integer.
///
/// Returns `None` when the range falls outside `bytes`.
pub fn read_fixed_le(bytes: &[u8], offset: usize, width: usize) -> Option<u32> {
    debug_assert!((1..=4).contains(&width), "width must be 1..=4, got {width}");
    let end = offset.checked_add(width)?;
    let field = bytes.get(offset..end)?;
    Some(
        field
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b)),
    )
}

/// Reads a protobuf base-128 varint of at most five bytes (32-bit value).
///
/// Returns the value and the offset just past it. This is deliberately more
/// lenient than protobuf: bytes beyond the end of `bytes` read as zero, so a
/// truncated varint terminates instead of failing. Callers must bounds-check
/// whatever the returned offset and value are used for.
pub fn read_proto_varint(bytes: &[u8], offset: usize) -> (u32, usize) {
    let mut value = 0u32;
    for i in 0..5 {
        let byte = bytes.get(offset.saturating_add(i)).copied().unwrap_or(0);
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return (value, offset.saturating_add(i + 1));
        }
    }
    (value, offset.saturating_add(5))
}

/// Upper bound for buffer pre-allocation from sizes declared by the input.
pub const MAX_CAPACITY_HINT: u64 = 16 * 1024 * 1024;

/// Turns an untrusted declared size into a safe `Vec::with_capacity` hint.
pub fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_CAPACITY_HINT) as usize
}
