// src/engine.rs
use crate::errors::StashError;

use age::secrecy::SecretString;
use age::{Decryptor, Encryptor, Identity, Recipient};
use std::fs;
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Opaque sealing capability used by the store.
///
/// Implementations receive the single-use derived key as hex ASCII bytes and
/// a destination (or source) path for the ciphertext object. Any failure is a
/// hard failure for that operation; the store performs no retry.
pub trait EncryptionEngine {
    /// Identifier of the cipher scheme, recorded by the store.
    fn cipher(&self) -> &'static str;

    /// Encrypt `plaintext` under `key` and write the ciphertext object to
    /// `dest`.
    fn seal(&self, plaintext: &[u8], key: &[u8], dest: &Path) -> Result<(), StashError>;

    /// Read the ciphertext object at `source` and decrypt it under `key`.
    fn unseal(&self, source: &Path, key: &[u8]) -> Result<Vec<u8>, StashError>;
}

/// age-backed engine.
///
/// Symmetric mode (the default) seals with an scrypt passphrase recipient
/// built from the derived key. Asymmetric mode seals to x25519 recipients
/// and unseals with the held identities; age does not allow mixing a
/// passphrase recipient with others, so the two modes are exclusive.
pub struct AgeEngine {
    recipients: Vec<age::x25519::Recipient>,
    identities: Vec<age::x25519::Identity>,
}

impl AgeEngine {
    pub fn new() -> Self {
        Self {
            recipients: Vec::new(),
            identities: Vec::new(),
        }
    }

    /// Asymmetric mode: seal to the identity's public key, unseal with the
    /// identity.
    pub fn with_identity(identity: age::x25519::Identity) -> Self {
        let recipient = identity.to_public();
        Self {
            recipients: vec![recipient],
            identities: vec![identity],
        }
    }

    fn passphrase(key: &[u8]) -> Result<SecretString, StashError> {
        let text = std::str::from_utf8(key)
            .map_err(|_| StashError::InputType("derived key is not hex ASCII".to_string()))?;
        Ok(SecretString::from(text.to_string()))
    }

    fn encrypt<'a>(
        recipients: impl Iterator<Item = &'a dyn Recipient>,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, StashError> {
        let encryptor = Encryptor::with_recipients(recipients)
            .map_err(|e| StashError::Parse(format!("Failed to create encryptor: {}", e)))?;
        let mut encrypted = Vec::new();
        let mut writer = encryptor.wrap_output(&mut encrypted)?;
        writer.write_all(plaintext)?;
        writer.finish()?;
        Ok(encrypted)
    }
}

impl Default for AgeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionEngine for AgeEngine {
    fn cipher(&self) -> &'static str {
        "age-v1"
    }

    fn seal(&self, plaintext: &[u8], key: &[u8], dest: &Path) -> Result<(), StashError> {
        let encrypted = if self.recipients.is_empty() {
            let recipient = age::scrypt::Recipient::new(Self::passphrase(key)?);
            Self::encrypt(
                std::iter::once(&recipient as &dyn Recipient),
                plaintext,
            )?
        } else {
            Self::encrypt(
                self.recipients.iter().map(|r| r as &dyn Recipient),
                plaintext,
            )?
        };

        // Atomic write to prevent partial ciphertext objects
        let temp_path = dest.with_extension("tmp");
        fs::write(&temp_path, &encrypted)?;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        fs::rename(&temp_path, dest)?;
        Ok(())
    }

    fn unseal(&self, source: &Path, key: &[u8]) -> Result<Vec<u8>, StashError> {
        let encrypted = fs::read(source)?;
        let decryptor = Decryptor::new(&encrypted[..])?;

        let mut decrypted = Vec::new();
        if self.identities.is_empty() {
            let identity = age::scrypt::Identity::new(Self::passphrase(key)?);
            let mut reader = decryptor.decrypt(std::iter::once(&identity as &dyn Identity))?;
            reader.read_to_end(&mut decrypted)?;
        } else {
            let mut reader =
                decryptor.decrypt(self.identities.iter().map(|i| i as &dyn Identity))?;
            reader.read_to_end(&mut decrypted)?;
        }
        Ok(decrypted)
    }
}
