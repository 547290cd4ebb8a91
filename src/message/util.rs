use crate::error::Error;

/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
/// 
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}

/// Encode an `f64` as a message buffer.
/// 
pub fn f64_to_bytes(x: f64) -> Vec<u8> {
    x.to_le_bytes().to_vec()
}

/// Decode an `f64` from a message buffer.
/// 
pub fn f64_from_bytes(bytes: &[u8]) -> Result<f64, Error> {
    Ok(f64::from_le_bytes(array_from_bytes(bytes)?))
}

/// Encode a `u64` as a message buffer.
/// 
pub fn u64_to_bytes(x: u64) -> Vec<u8> {
    x.to_le_bytes().to_vec()
}

/// Decode a `u64` from a message buffer.
/// 
pub fn u64_from_bytes(bytes: &[u8]) -> Result<u64, Error> {
    Ok(u64::from_le_bytes(array_from_bytes(bytes)?))
}

/// Copy a message buffer into a (const) sized array, failing if the sizes
/// differ.
///
fn array_from_bytes<const SIZE: usize>(bytes: &[u8]) -> Result<[u8; SIZE], Error> {
    if bytes.len() != SIZE {
        return Err(Error::Decode(format!("expected {} bytes, got {}", SIZE, bytes.len())));
    }
    let mut buffer = [0; SIZE];
    buffer.copy_from_slice(bytes);
    Ok(buffer)
}
