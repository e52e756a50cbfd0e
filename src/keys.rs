// src/keys.rs
use crate::buffer::SecureBuffer;
use crate::errors::StashError;
use crate::random;

use age::secrecy::zeroize::Zeroizing;
use log::debug;
use scrypt::Params as ScryptParams;

const TOKEN_LEN: usize = 256;
const SALT_LEN: usize = 64;
const NONCE_LEN: usize = 16;

// Work factor: cost 1024, fixed across stores
const SCRYPT_LOG_N: u8 = 10;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const DERIVED_KEY_LEN: usize = 64;

/// Per-store key material: a long-lived random token, salt, and nonce pair,
/// plus the two transient buffers of a derive cycle.
///
/// Keys are re-derived for every cryptographic operation instead of cached,
/// so unencrypted key material lives only for the shortest possible window.
/// The nonces are fixed at generation time, which makes every derive cycle of
/// one manager reproduce the same key: whatever was sealed under a derived
/// key can be unsealed under a later cycle of the same manager. Callers must
/// treat the buffer returned by [`derive`](Self::derive) as single-use and
/// call [`wipe`](Self::wipe) immediately after the operation that consumes
/// it.
pub struct KeyMaterial {
    token: SecureBuffer,
    salt: SecureBuffer,
    head_nonce: SecureBuffer,
    tail_nonce: SecureBuffer,
    kdf_input: SecureBuffer,
    derived: SecureBuffer,
}

impl KeyMaterial {
    /// Generate fresh token, salt, and uniqueness nonces from OS entropy.
    pub fn generate() -> Result<Self, StashError> {
        Ok(Self {
            token: SecureBuffer::from(random::random_bytes(TOKEN_LEN)?),
            salt: SecureBuffer::from(random::random_bytes(SALT_LEN)?),
            head_nonce: SecureBuffer::from(random::random_bytes(NONCE_LEN)?),
            tail_nonce: SecureBuffer::from(random::random_bytes(NONCE_LEN)?),
            kdf_input: SecureBuffer::new(),
            derived: SecureBuffer::new(),
        })
    }

    /// Run one derive cycle: wipe any previous material, compose
    /// `head_nonce || token || tail_nonce` into the KDF input, and scrypt it
    /// with the store salt. The hex-encoded result accumulates in the
    /// derived-key buffer; a shared handle is returned, so a later
    /// [`wipe`](Self::wipe) clears the caller's view too.
    ///
    /// The nonces make keys distinct across managers even for identical
    /// tokens, while cycles of one live manager stay reproducible. A
    /// destroyed manager cannot derive.
    pub fn derive(&mut self) -> Result<SecureBuffer, StashError> {
        if self.token.is_empty() {
            return Err(StashError::Kdf(
                "key material has been destroyed".to_string(),
            ));
        }
        self.wipe();

        self.kdf_input.append(self.head_nonce.bytes().to_vec());
        self.kdf_input.append(self.token.bytes().to_vec());
        self.kdf_input.append(self.tail_nonce.bytes().to_vec());

        let params = ScryptParams::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, DERIVED_KEY_LEN)
            .map_err(|e| StashError::Kdf(e.to_string()))?;
        let mut output = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
        scrypt::scrypt(
            &self.kdf_input.bytes(),
            &self.salt.bytes(),
            &params,
            &mut output,
        )
        .map_err(|e| StashError::Kdf(e.to_string()))?;

        let mut encoded = Zeroizing::new(hex::encode(&*output));
        self.derived.append(std::mem::take(&mut *encoded));
        debug!("derived single-use key ({} hex chars)", self.derived.len());
        Ok(self.derived.clone())
    }

    /// Clear the KDF input and derived key, unconditionally. Runs before and
    /// after every derive/use cycle, on success and failure paths alike.
    pub fn wipe(&mut self) {
        self.kdf_input.clearmem();
        self.derived.clearmem();
    }

    /// Terminal wipe: transient buffers plus the token, salt, and nonces.
    pub fn destroy(&mut self) {
        self.wipe();
        self.token.clearmem();
        self.salt.clearmem();
        self.head_nonce.clearmem();
        self.tail_nonce.clearmem();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_cycles_reproduce_the_key() {
        let mut keys = KeyMaterial::generate().unwrap();

        let first = keys.derive().unwrap().bytes().to_vec();
        keys.wipe();
        let second = keys.derive().unwrap().bytes().to_vec();
        keys.wipe();

        // A value sealed under one cycle must unseal under a later cycle
        assert_eq!(first.len(), DERIVED_KEY_LEN * 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_managers_derive_distinct_keys() {
        let mut a = KeyMaterial::generate().unwrap();
        let mut b = KeyMaterial::generate().unwrap();

        let key_a = a.derive().unwrap().bytes().to_vec();
        let key_b = b.derive().unwrap().bytes().to_vec();
        a.wipe();
        b.wipe();

        assert_ne!(key_a, key_b);
    }

    #[test]
    fn test_derive_after_destroy_fails() {
        let mut keys = KeyMaterial::generate().unwrap();
        keys.destroy();
        assert!(matches!(keys.derive().unwrap_err(), StashError::Kdf(_)));
    }

    #[test]
    fn test_derived_key_is_hex() {
        let mut keys = KeyMaterial::generate().unwrap();
        let derived = keys.derive().unwrap();
        assert!(derived.bytes().iter().all(|b| b.is_ascii_hexdigit()));
        keys.wipe();
        assert_eq!(derived.len(), 0);
    }

    #[test]
    fn test_wipe_clears_callers_handle() {
        let mut keys = KeyMaterial::generate().unwrap();
        let derived = keys.derive().unwrap();
        assert!(!derived.is_empty());
        keys.wipe();
        assert!(derived.is_empty());
    }

    #[test]
    fn test_destroy_empties_all_material() {
        let mut keys = KeyMaterial::generate().unwrap();
        keys.derive().unwrap();
        keys.destroy();
        assert!(keys.token.is_empty());
        assert!(keys.salt.is_empty());
        assert!(keys.head_nonce.is_empty());
        assert!(keys.tail_nonce.is_empty());
        assert!(keys.kdf_input.is_empty());
        assert!(keys.derived.is_empty());
    }
}
