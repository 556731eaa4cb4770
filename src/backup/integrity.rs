//! SHA-256 checksums for backup copies.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CHUNK_SIZE: usize = 64 * 1024;

/// Hex SHA-256 of a file's contents.
pub async fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Copy `reader` into `writer`, hashing the bytes on the way.
///
/// Returns the number of bytes copied and their hex SHA-256. The writer is
/// flushed but not synced.
pub async fn copy_with_digest<R, W>(
    reader: &mut R,
    writer: &mut W,
) -> std::io::Result<(u64, String)>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    writer.flush().await?;
    Ok((total, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[tokio::test]
    async fn test_copy_digest_matches_file_digest() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.db");
        let dst = temp.path().join("dst.db");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&src, &payload).await.unwrap();

        let mut reader = File::open(&src).await.unwrap();
        let mut writer = File::create(&dst).await.unwrap();
        let (size, digest) = copy_with_digest(&mut reader, &mut writer).await.unwrap();
        drop(writer);

        assert_eq!(size, payload.len() as u64);
        assert_eq!(digest, file_digest(&dst).await.unwrap());
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_empty_file_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.db");
        tokio::fs::write(&path, b"").await.unwrap();
        assert_eq!(file_digest(&path).await.unwrap(), EMPTY_SHA256);
    }
}
