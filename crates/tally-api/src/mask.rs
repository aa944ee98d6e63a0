//! Log-safe previews of sensitive values. Raw identities, state tokens,
//! and access tokens never reach the log sink — only these.

use sha2::{Digest, Sha256};

/// Short stable fingerprint of a sensitive value: first 8 hex chars of its
/// SHA-256. Enough to correlate log lines, useless for recovery.
pub fn hash_preview(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(8);
    hex
}

/// First and last four characters with the middle elided; anything shorter
/// than 8 characters (or non-ASCII) is fully masked.
pub fn mask_token(token: &str) -> String {
    if token.len() < 8 || !token.is_ascii() {
        return "***".to_string();
    }
    format!("{}...{}", &token[..4], &token[token.len() - 4..])
}
