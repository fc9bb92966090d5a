//! File transfer client (C9, stream concern): short-lived connections to
//! the file broker for one upload or one download each.

use std::path::Path;

use conference_proto::file::{DownloadHeader, FileRequest, DOWNLOAD_ERROR, UPLOAD_READY};
use conference_proto::framing::write_length_prefixed;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::Config;
use crate::error::FileTransferError;

/// Upload `path` under `filename`, announcing `from` as the uploader name
/// (mirrors the name shown in the resulting `file_offer` broadcast).
pub async fn upload(config: &Config, from: &str, path: &Path) -> Result<(), FileTransferError> {
    let mut file = File::open(path).await.map_err(FileTransferError::Io)?;
    let metadata = file.metadata().await.map_err(FileTransferError::Io)?;
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());

    let mut stream = TcpStream::connect((config.host.as_str(), config.file_port))
        .await
        .map_err(FileTransferError::Io)?;
    write_length_prefixed(
        &mut stream,
        &FileRequest::Upload {
            filename,
            size: metadata.len(),
            from: from.to_string(),
        },
    )
    .await?;

    let mut ack = [0u8; UPLOAD_READY.len()];
    stream.read_exact(&mut ack).await.map_err(FileTransferError::Io)?;
    if ack != *UPLOAD_READY {
        return Err(FileTransferError::NotFound);
    }

    let mut buf = vec![0u8; 8192];
    loop {
        let n = file.read(&mut buf).await.map_err(FileTransferError::Io)?;
        if n == 0 {
            break;
        }
        stream.write_all(&buf[..n]).await.map_err(FileTransferError::Io)?;
    }
    stream.flush().await.map_err(FileTransferError::Io)?;
    Ok(())
}

/// Download `filename` into `config.download_dir`, returning the path it
/// was saved at.
pub async fn download(config: &Config, filename: &str) -> Result<std::path::PathBuf, FileTransferError> {
    let mut stream = TcpStream::connect((config.host.as_str(), config.file_port))
        .await
        .map_err(FileTransferError::Io)?;
    write_length_prefixed(
        &mut stream,
        &FileRequest::Download {
            filename: filename.to_string(),
        },
    )
    .await?;

    let header_bytes = conference_proto::framing::read_length_prefixed_bytes(&mut stream).await?;
    if header_bytes == DOWNLOAD_ERROR {
        return Err(FileTransferError::NotFound);
    }
    let header: DownloadHeader = serde_json::from_slice(&header_bytes).map_err(conference_proto::framing::FrameError::from)?;

    stream.write_all(&[1u8]).await.map_err(FileTransferError::Io)?;

    std::fs::create_dir_all(&config.download_dir).map_err(FileTransferError::Io)?;
    let dest = config.download_dir.join(filename);
    let mut out = File::create(&dest).await.map_err(FileTransferError::Io)?;

    let mut remaining = header.size;
    let mut buf = vec![0u8; 8192];
    while remaining > 0 {
        let take = remaining.min(buf.len() as u64) as usize;
        stream
            .read_exact(&mut buf[..take])
            .await
            .map_err(FileTransferError::Io)?;
        out.write_all(&buf[..take]).await.map_err(FileTransferError::Io)?;
        remaining -= take as u64;
    }
    out.flush().await.map_err(FileTransferError::Io)?;
    Ok(dest)
}
