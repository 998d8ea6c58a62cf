use sha2::{Digest, Sha256};

use crate::error::DownloadError;

pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compares case-insensitively; mismatches carry both digests.
pub fn verify_hash(data: &[u8], expected: &str) -> Result<String, DownloadError> {
    let computed = calculate_hash(data);
    if !expected.trim().eq_ignore_ascii_case(&computed) {
        return Err(DownloadError::Checksum {
            expected: expected.trim().to_string(),
            actual: computed,
        });
    }
    Ok(computed)
}
