//! File broker (C8): one operation per connection, framed header followed
//! by a raw byte body. Filenames are always reduced to their basename
//! before touching the filesystem so an upload/download can never escape
//! `files_dir`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use conference_proto::file::{
    sanitize_filename, DownloadHeader, FileRequest, DOWNLOAD_ERROR, UPLOAD_DONE, UPLOAD_READY,
};
use conference_proto::framing::{read_length_prefixed, write_length_prefixed, write_length_prefixed_bytes};
use conference_proto::ServerControlMessage;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::session::SessionRegistry;

/// Lower bound on how long a body transfer is allowed to stall before the
/// connection is abandoned (`spec.md` §5: "30-60s for file payload bodies").
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn run(
    listener: TcpListener,
    files_dir: PathBuf,
    registry: Arc<SessionRegistry>,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&files_dir).await.ok();

    loop {
        let (stream, addr) = listener.accept().await?;
        let files_dir = files_dir.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, files_dir, registry).await {
                log::debug!("file connection from {addr} ended: {e}");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    files_dir: PathBuf,
    registry: Arc<SessionRegistry>,
) -> anyhow::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let request: FileRequest = read_length_prefixed(&mut reader).await?;

    match request {
        FileRequest::Upload { filename, size, from } => {
            handle_upload(&mut reader, &mut writer, &files_dir, &filename, size, &from, &registry)
                .await
        }
        FileRequest::Download { filename } => {
            handle_download(&mut reader, &mut writer, &files_dir, &filename).await
        }
    }
}

async fn handle_upload(
    reader: &mut (impl tokio::io::AsyncRead + Unpin),
    writer: &mut (impl tokio::io::AsyncWrite + Unpin),
    files_dir: &Path,
    filename: &str,
    size: u64,
    from: &str,
    registry: &SessionRegistry,
) -> anyhow::Result<()> {
    let basename = sanitize_filename(filename);
    let dest = files_dir.join(&basename);

    writer.write_all(UPLOAD_READY).await?;
    writer.flush().await?;

    let mut file = File::create(&dest).await?;
    tokio::time::timeout(TRANSFER_TIMEOUT, copy_exact(reader, &mut file, size)).await??;

    writer.write_all(UPLOAD_DONE).await?;
    writer.flush().await?;

    registry.broadcast(ServerControlMessage::FileOffer {
        from: from.to_string(),
        filename: basename,
        size,
    });
    Ok(())
}

async fn handle_download(
    reader: &mut (impl tokio::io::AsyncRead + Unpin),
    writer: &mut (impl tokio::io::AsyncWrite + Unpin),
    files_dir: &Path,
    filename: &str,
) -> anyhow::Result<()> {
    let basename = sanitize_filename(filename);
    let path = files_dir.join(&basename);

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) => m,
        Err(_) => {
            write_length_prefixed_bytes(writer, DOWNLOAD_ERROR).await?;
            return Ok(());
        }
    };

    write_length_prefixed(writer, &DownloadHeader { size: metadata.len() }).await?;

    // Wait for the client's short acknowledgement before streaming the
    // body; its content is not interpreted.
    let mut ack = [0u8; 1];
    tokio::time::timeout(TRANSFER_TIMEOUT, reader.read(&mut ack)).await??;

    let mut file = File::open(&path).await?;
    tokio::time::timeout(TRANSFER_TIMEOUT, tokio::io::copy(&mut file, writer)).await??;
    Ok(())
}

/// Copy exactly `size` bytes from `reader` to `writer`, in fixed chunks.
/// A hand-rolled bound is used instead of `AsyncReadExt::take` because the
/// callers here hold `reader` as `&mut impl AsyncRead`, and `take` needs an
/// owned reader.
async fn copy_exact<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    reader: &mut R,
    writer: &mut W,
    size: u64,
) -> std::io::Result<()> {
    let mut remaining = size;
    let mut buf = [0u8; 8192];
    while remaining > 0 {
        let chunk = remaining.min(buf.len() as u64) as usize;
        reader.read_exact(&mut buf[..chunk]).await?;
        writer.write_all(&buf[..chunk]).await?;
        remaining -= chunk as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn upload_writes_ready_then_done_and_stores_bytes() {
        let dir = tempdir();
        let registry = SessionRegistry::new();
        let body = b"hello world".to_vec();
        let mut reader = Cursor::new(body.clone());
        let mut writer = Vec::new();

        handle_upload(&mut reader, &mut writer, dir.path(), "../evil/name.txt", body.len() as u64, "alice", &registry)
            .await
            .unwrap();

        assert_eq!(&writer[..5], UPLOAD_READY);
        assert_eq!(&writer[writer.len() - 4..], UPLOAD_DONE);
        let stored = std::fs::read(dir.path().join("name.txt")).unwrap();
        assert_eq!(stored, body);
    }

    #[tokio::test]
    async fn download_of_missing_file_sends_error() {
        let dir = tempdir();
        let mut reader = Cursor::new(Vec::<u8>::new());
        let mut writer = Vec::new();

        handle_download(&mut reader, &mut writer, dir.path(), "missing.txt")
            .await
            .unwrap();

        let mut cursor = Cursor::new(writer);
        let body = conference_proto::framing::read_length_prefixed_bytes(&mut cursor)
            .await
            .unwrap();
        assert_eq!(body, DOWNLOAD_ERROR);
    }

    #[tokio::test]
    async fn download_of_existing_file_streams_body_after_header() {
        let dir = tempdir();
        std::fs::write(dir.path().join("present.txt"), b"payload").unwrap();
        let mut reader = Cursor::new(vec![0u8]); // the client's ack byte
        let mut writer = Vec::new();

        handle_download(&mut reader, &mut writer, dir.path(), "present.txt")
            .await
            .unwrap();

        // Header is a length-prefixed {"size":7} frame, body follows.
        assert!(writer.ends_with(b"payload"));
    }

    /// Minimal temp-dir helper so these tests don't pull in a dev-dependency
    /// purely for directory cleanup.
    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
    fn tempdir() -> TempDir {
        let dir = std::env::temp_dir().join(format!(
            "conference-server-test-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }
}
