use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Block size for streaming the archive through the digest
static BLOCK_SIZE: usize = 64 * 1024;

/// Computes the SHA-256 digest of a finished archive, streamed in fixed-size
/// blocks.
///
/// An I/O failure degrades to `None` instead of failing the run: a missing
/// checksum is surfaced in the run record, not as an error.
pub fn checksum_file(path: &Path) -> Option<String> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Cannot open {:?} for checksum: {e}", path);
            return None;
        }
    };

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) => {
                warn!("Checksum read of {:?} failed: {e}", path);
                return None;
            }
        }
    }

    Some(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_known_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("archive.tar.xz");
        std::fs::write(&path, b"hello world").unwrap();

        // sha256("hello world")
        assert_eq!(
            checksum_file(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_checksum_is_stable_across_calls() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("archive.tar.xz");
        std::fs::write(&path, "x".repeat(3 * BLOCK_SIZE + 17)).unwrap();

        assert_eq!(checksum_file(&path), checksum_file(&path));
    }

    #[test]
    fn test_missing_file_degrades_to_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(checksum_file(&temp_dir.path().join("nope")).is_none());
    }
}
