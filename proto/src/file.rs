//! File broker wire schema (C8) — length-prefixed JSON header followed by
//! a raw byte body.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum FileRequest {
    #[serde(rename = "file_upload")]
    Upload {
        filename: String,
        size: u64,
        from: String,
    },
    #[serde(rename = "file_download")]
    Download { filename: String },
}

pub const UPLOAD_READY: &[u8] = b"READY";
pub const UPLOAD_DONE: &[u8] = b"DONE";
pub const DOWNLOAD_ERROR: &[u8] = b"ERROR";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadHeader {
    pub size: u64,
}

/// Reduce an arbitrary client-supplied filename to its basename so uploads
/// and downloads can never escape `server_files/`.
pub fn sanitize_filename(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directory_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("/tmp/evil/doc.pdf"), "doc.pdf");
        assert_eq!(sanitize_filename("doc.pdf"), "doc.pdf");
    }
}
