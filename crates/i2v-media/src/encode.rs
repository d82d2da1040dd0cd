//! Transport encoding of produced artifacts.

use std::io::ErrorKind;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{MediaError, MediaResult};

/// Encode bytes as standard (padded) base64.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Read a file and encode its contents as standard base64.
pub async fn encode_file(path: impl AsRef<Path>) -> MediaResult<String> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => MediaError::FileNotFound(path.to_path_buf()),
        _ => MediaError::Io(e),
    })?;
    Ok(encode_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_bytes() {
        assert_eq!(encode_bytes(b"video"), "dmlkZW8=");
        assert_eq!(encode_bytes(b""), "");
    }

    #[tokio::test]
    async fn test_encode_file_reproduces_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("video.mp4");
        let bytes: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        tokio::fs::write(&path, &bytes).await.unwrap();

        let encoded = encode_file(&path).await.unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_encode_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = tokio_test::assert_err!(encode_file(dir.path().join("nope.mp4")).await);
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
