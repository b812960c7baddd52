//! Fast non-cryptographic content digests.
//!
//! xxHash64 is used for chunk ids, file-change detection, and the stable
//! 32-bit token hash backing sparse vector indices. The digest must be
//! identical across independently launched processes, which rules out the
//! host-randomized `std` hasher.

use std::io::Read;
use std::path::Path;
use xxhash_rust::xxh64::{xxh64, Xxh64};

const FILE_READ_CHUNK: usize = 4096;

/// Digest arbitrary bytes to a 16-char lowercase hex string.
pub fn digest_bytes(content: &[u8]) -> String {
    format!("{:016x}", xxh64(content, 0))
}

/// Digest text content to a 16-char lowercase hex string.
pub fn digest_str(content: &str) -> String {
    digest_bytes(content.as_bytes())
}

/// Digest a file, streaming it in small chunks.
pub fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Xxh64::new(0);
    let mut buf = [0u8; FILE_READ_CHUNK];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:016x}", hasher.digest()))
}

/// Stable 32-bit token hash: the integer value of the first 8 hex chars of
/// the token's digest. Used as the sparse vector index for a token.
pub fn stable_token_hash(token: &str) -> u32 {
    (xxh64(token.as_bytes(), 0) >> 32) as u32
}

/// Content-addressed chunk id over location and content.
pub fn chunk_id(relative_path: &str, start_byte: usize, end_byte: usize, content: &str) -> String {
    digest_str(&format!(
        "{relative_path}|{start_byte}-{end_byte}|{content}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_16_lowercase_hex_chars() {
        let digest = digest_str("calculate_tax");
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn identical_input_yields_identical_digest() {
        assert_eq!(digest_str("OrderService"), digest_str("OrderService"));
        assert_ne!(digest_str("OrderService"), digest_str("orderservice"));
    }

    #[test]
    fn file_digest_matches_content_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.py");
        let content = "def calculate_tax(amount):\n    return amount * 0.2\n";
        std::fs::write(&path, content).unwrap();
        assert_eq!(digest_file(&path).unwrap(), digest_str(content));
    }

    #[test]
    fn stable_token_hash_matches_digest_prefix() {
        for token in ["OrderService", "order", "process", "사용자"] {
            let digest = digest_str(token);
            let from_hex = u32::from_str_radix(&digest[..8], 16).unwrap();
            assert_eq!(stable_token_hash(token), from_hex);
        }
    }

    #[test]
    fn stable_token_hash_distinguishes_tokens() {
        let a = stable_token_hash("order");
        let b = stable_token_hash("process");
        let c = stable_token_hash("OrderService");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn chunk_id_round_trips_for_same_location_and_content() {
        let first = chunk_id("src/tax.py", 10, 90, "def calculate_tax(): ...");
        let second = chunk_id("src/tax.py", 10, 90, "def calculate_tax(): ...");
        assert_eq!(first, second);
        assert_ne!(
            first,
            chunk_id("src/tax.py", 11, 90, "def calculate_tax(): ...")
        );
    }
}
