// src/random.rs
use crate::errors::StashError;
use getrandom::fill;

/// Fill an existing slice with OS entropy
pub fn fill_bytes(buf: &mut [u8]) -> Result<(), StashError> {
    fill(buf).map_err(|e| StashError::Parse(format!("Failed to fill random buffer: {}", e)))
}

/// Generate `len` cryptographically secure random bytes
pub fn random_bytes(len: usize) -> Result<Vec<u8>, StashError> {
    let mut buf = vec![0u8; len];
    fill_bytes(&mut buf)?;
    Ok(buf)
}

/// Generate a random hex identifier from `n_bytes` of OS entropy
pub fn random_hex(n_bytes: usize) -> Result<String, StashError> {
    Ok(hex::encode(random_bytes(n_bytes)?))
}
