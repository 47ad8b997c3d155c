use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use sha2::{Digest, Sha256};

/// SHA-256 of the whole file as lowercase hex.
///
/// Reads from the start regardless of the current position and rewinds
/// afterwards, so the same handle can be hashed repeatedly.
pub fn hash_file(file: &mut File) -> std::io::Result<String> {
    file.seek(SeekFrom::Start(0))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    file.seek(SeekFrom::Start(0))?;
    Ok(hex::encode(hasher.finalize()))
}
