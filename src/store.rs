// src/store.rs
use crate::buffer::SecureBuffer;
use crate::engine::EncryptionEngine;
use crate::errors::StashError;
use crate::keys::KeyMaterial;
use crate::random;

use age::secrecy::zeroize::Zeroizing;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Encrypted key-value store: a persisted index from logical key to
/// ciphertext object, plus an in-memory-only cache of decrypted fragments.
///
/// Every value is sealed as one independently named ciphertext object inside
/// the store's backing directory, under a key freshly derived for that single
/// operation. Decrypted reads are wrapped in [`SecureBuffer`]s and tracked in
/// the fragment cache so deletion and teardown can wipe them even if the
/// caller kept handles.
///
/// A store owns its directory and cache exclusively on one logical thread;
/// it provides no internal locking.
pub struct EncryptedStore {
    name: String,
    path: PathBuf,
    key_offset: String,
    keys: KeyMaterial,
    index: HashMap<String, PathBuf>,
    fragments: HashMap<String, Vec<SecureBuffer>>,
    engine: Box<dyn EncryptionEngine>,
    closed: bool,
}

impl EncryptedStore {
    /// Open (creating if absent) the store directory `base/name`.
    pub fn open(
        name: &str,
        base: &Path,
        engine: Box<dyn EncryptionEngine>,
    ) -> Result<Self, StashError> {
        let path = base.join(name);
        if !path.exists() {
            fs::create_dir_all(&path)?;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o700))?;
        } else if !path.is_dir() {
            return Err(StashError::InvalidPath(format!(
                "{} exists and is not a directory",
                path.display()
            )));
        }

        debug!("stash {}: opened at {}", name, path.display());
        Ok(Self {
            name: name.to_string(),
            path,
            key_offset: random::random_hex(16)?,
            keys: KeyMaterial::generate()?,
            index: HashMap::new(),
            fragments: HashMap::new(),
            engine,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cipher(&self) -> &'static str {
        self.engine.cipher()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Ciphertext location for a key, if sealed.
    pub fn location_of(&self, key: &str) -> Option<&Path> {
        self.index.get(key).map(PathBuf::as_path)
    }

    fn ensure_open(&self) -> Result<(), StashError> {
        if self.closed {
            return Err(StashError::StoreClosed(self.name.clone()));
        }
        Ok(())
    }

    // Cached fragments are namespaced by the per-store key offset.
    fn fragment_tag(&self, key: &str) -> String {
        format!("{}_{}", key, self.key_offset)
    }

    fn drop_fragments(&mut self, key: &str) {
        let tag = self.fragment_tag(key);
        if let Some(mut frags) = self.fragments.remove(&tag) {
            for frag in frags.iter_mut() {
                frag.clearmem();
            }
        }
    }

    /// Seal `value` under a freshly derived key into a new randomly named
    /// ciphertext object, then record key -> location. The value is consumed
    /// and left empty. On failure the index is unchanged; key material is
    /// wiped on every path.
    pub fn set(&mut self, key: &str, mut value: SecureBuffer) -> Result<(), StashError> {
        self.ensure_open()?;

        let plaintext = value.take_bytes();
        let location = self.path.join(format!("{}.age", random::random_hex(16)?));

        let derived = self.keys.derive()?;
        let sealed = {
            let key_bytes = derived.bytes();
            self.engine.seal(&plaintext, &key_bytes, &location)
        };
        self.keys.wipe();
        sealed?;

        debug!(
            "stash {}: sealed {} bytes to {}",
            self.name,
            plaintext.len(),
            location.display()
        );

        // Replacing an entry retires its old ciphertext and cached reads
        if let Some(previous) = self.index.insert(key.to_string(), location) {
            self.drop_fragments(key);
            if let Err(e) = fs::remove_file(&previous) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(
                        "stash {}: failed to remove replaced object {}: {}",
                        self.name,
                        previous.display(),
                        e
                    );
                }
            }
        }
        Ok(())
    }

    /// Seal from a stream-like source. The plaintext is staged in a zeroizing
    /// buffer for the duration of the call.
    pub fn set_from_reader<R: Read>(&mut self, key: &str, reader: &mut R) -> Result<(), StashError> {
        self.ensure_open()?;
        let mut staged = Zeroizing::new(Vec::new());
        reader.read_to_end(&mut staged)?;
        let value = SecureBuffer::from(std::mem::take(&mut *staged));
        self.set(key, value)
    }

    /// Unseal the value for `key`. Absent keys yield `Ok(None)`. The
    /// decrypted bytes move into a [`SecureBuffer`] registered in the
    /// fragment cache, so repeated reads of the same key are each tracked
    /// for later bulk erasure. Key material is wiped on every path.
    pub fn get(&mut self, key: &str) -> Result<Option<SecureBuffer>, StashError> {
        self.ensure_open()?;

        let Some(location) = self.index.get(key).cloned() else {
            return Ok(None);
        };

        let derived = self.keys.derive()?;
        let unsealed = {
            let key_bytes = derived.bytes();
            self.engine.unseal(&location, &key_bytes)
        };
        self.keys.wipe();
        let plaintext = unsealed?;

        let buffer = SecureBuffer::from(plaintext);
        debug!("stash {}: unsealed {} bytes", self.name, buffer.len());

        let tag = self.fragment_tag(key);
        self.fragments.entry(tag).or_default().push(buffer.clone());
        Ok(Some(buffer))
    }

    /// Wipe any cached decrypted fragments for `key`, remove its ciphertext
    /// object, and drop the index entry. Absent keys are a no-op.
    pub fn delete(&mut self, key: &str) -> Result<(), StashError> {
        self.ensure_open()?;

        let Some(location) = self.index.get(key).cloned() else {
            return Ok(());
        };
        self.drop_fragments(key);

        match fs::remove_file(&location) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.index.remove(key);
        debug!("stash {}: deleted entry and {}", self.name, location.display());
        Ok(())
    }

    /// Terminal teardown: wipe all key material, destroy every cached
    /// fragment, remove every ciphertext object and the backing directory.
    /// The store rejects all further operations, even when removal of the
    /// backing directory fails partway. Calling destroy twice is safe.
    pub fn destroy(&mut self) -> Result<(), StashError> {
        if self.closed {
            return Ok(());
        }
        // Key material is wiped below, so the store must go terminal before
        // any fallible IO
        self.closed = true;
        self.keys.destroy();

        let entries: Vec<(String, PathBuf)> = self.index.drain().collect();
        for (key, location) in entries {
            self.drop_fragments(&key);
            if let Err(e) = fs::remove_file(&location) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(
                        "stash {}: failed to remove object {}: {}",
                        self.name,
                        location.display(),
                        e
                    );
                }
            }
        }

        // Fragments left over from replaced entries
        for (_, mut frags) in self.fragments.drain() {
            for frag in frags.iter_mut() {
                frag.clearmem();
            }
        }

        fs::remove_dir_all(&self.path)?;
        debug!("stash {}: destroyed", self.name);
        Ok(())
    }
}

// Never print key material or cached contents.
impl fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EncryptedStore[{}: {} entries{}]",
            self.name,
            self.index.len(),
            if self.closed { ", destroyed" } else { "" }
        )
    }
}

impl Drop for EncryptedStore {
    fn drop(&mut self) {
        // In-memory hygiene only: ciphertext on disk survives unless
        // destroy() was called explicitly.
        if !self.closed {
            self.keys.destroy();
            for (_, mut frags) in self.fragments.drain() {
                for frag in frags.iter_mut() {
                    frag.clearmem();
                }
            }
        }
    }
}
