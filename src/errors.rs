use std::io;

#[derive(Debug)]
pub enum StashError {
    Io(io::Error),
    Encrypt(age::EncryptError),
    Decrypt(age::DecryptError),
    InputType(String),
    Kdf(String),
    Parse(String),
    InvalidPath(String),
    StoreClosed(String),
}

impl From<io::Error> for StashError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<age::EncryptError> for StashError {
    fn from(err: age::EncryptError) -> Self {
        Self::Encrypt(err)
    }
}

impl From<age::DecryptError> for StashError {
    fn from(err: age::DecryptError) -> Self {
        Self::Decrypt(err)
    }
}

impl std::fmt::Display for StashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Encrypt(e) => write!(f, "Encryption failed: {}", e),
            Self::Decrypt(e) => write!(f, "Decryption failed: {}", e),
            Self::InputType(msg) => write!(f, "Unsupported input: {}", msg),
            Self::Kdf(msg) => write!(f, "Key derivation failed: {}", msg),
            Self::Parse(msg) => write!(f, "Parse error: {}", msg),
            Self::InvalidPath(msg) => write!(f, "Invalid path: {}", msg),
            Self::StoreClosed(name) => write!(f, "Store {} has been destroyed", name),
        }
    }
}

impl std::error::Error for StashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encrypt(e) => Some(e),
            Self::Decrypt(e) => Some(e),
            _ => None,
        }
    }
}
