//! cryptstash: memory-hygienic secure buffers with an encrypted key-value
//! stash.
//!
//! [`SecureBuffer`] is a mutable byte sequence that guarantees its backing
//! storage is erased on destruction, supports ownership-transferring
//! concatenation, cursor-based in-place editing, and bulk erasure of split
//! fragments. [`EncryptedStore`] maps logical keys to individually encrypted
//! objects on disk, deriving a fresh single-use key per operation through a
//! slow KDF and wiping all key material immediately after use.
//!
//! Known limits: erasure is not defended against adversaries with physical
//! memory access, swap inspection, or compiler optimizations that preserve
//! copies.

mod buffer;
mod engine;
mod errors;
mod keys;
mod random;
mod store;

#[cfg(test)]
mod tests;

pub use buffer::{BufferConfig, BufferInput, CharStream, SecureBuffer};
pub use engine::{AgeEngine, EncryptionEngine};
pub use errors::StashError;
pub use keys::KeyMaterial;
pub use store::EncryptedStore;
