use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::AudioError;

/// Hex characters kept from the SHA-256 digest.
pub const HASH_LEN: usize = 16;

const READ_CHUNK: usize = 8 * 1024;

/// Fingerprint of a source file's bytes: the first 16 lowercase hex
/// characters of its SHA-256 digest.
///
/// # Errors
/// `FileNotFound` when `path` is absent, `Io` for any other read failure.
pub fn content_hash(path: &Path) -> Result<String, AudioError> {
    let mut file = File::open(path).map_err(|err| AudioError::from_io(path, err))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; READ_CHUNK];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(HASH_LEN);
    Ok(digest)
}
