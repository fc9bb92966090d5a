//! Video pipeline (C9, media concern): pace-accurate fragmenting sender
//! plus a per-source reassembly receiver. Capture and decode are out of
//! scope — callers hand already-encoded JPEG bytes in, and get
//! [`crate::events::Event::VideoFrame`] out.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conference_proto::media::{
    prefix_source_addr, split_source_addr, VideoFragmentHeader, VIDEO_CHUNK_MAX_BYTES,
    VIDEO_FRAME_RATE_HZ,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::events::{Event, EventSender};

const MAX_DATAGRAM_BYTES: usize = 4 + VideoFragmentHeader::LEN + VIDEO_CHUNK_MAX_BYTES + 64;

/// Fragment `jpeg` into as many datagrams as needed and send them in
/// order. `seq` restarts at 0 for every frame; `total` carries the full
/// encoded length so the receiver knows when reassembly is complete
/// (Testable Property 7).
pub async fn send_frame(socket: &UdpSocket, target: SocketAddr, jpeg: &[u8]) -> std::io::Result<()> {
    let total = jpeg.len() as u32;
    for (seq, chunk) in jpeg.chunks(VIDEO_CHUNK_MAX_BYTES).enumerate() {
        let header = VideoFragmentHeader { seq: seq as u32, total };
        let mut datagram = Vec::with_capacity(VideoFragmentHeader::LEN + chunk.len());
        datagram.extend_from_slice(&header.encode());
        datagram.extend_from_slice(chunk);
        socket.send_to(&datagram, target).await?;
    }
    Ok(())
}

/// Drives an outgoing video stream at `VIDEO_FRAME_RATE_HZ`, sending the
/// most recently produced frame on each tick and dropping any backlog —
/// frames are a "latest wins" stream, never queued.
pub async fn run_send_loop(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    enabled: Arc<AtomicBool>,
    mut frames: mpsc::Receiver<Vec<u8>>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(1000 / VIDEO_FRAME_RATE_HZ as u64));
    loop {
        ticker.tick().await;
        if !enabled.load(Ordering::Relaxed) {
            continue;
        }
        let mut latest = None;
        while let Ok(frame) = frames.try_recv() {
            latest = Some(frame);
        }
        if let Some(frame) = latest {
            if let Err(e) = send_frame(&socket, target, &frame).await {
                log::debug!("video send failed: {e}");
            }
        }
    }
}

struct Reassembly {
    total: u32,
    buf: Vec<u8>,
}

/// Per-source reassembly. Fragments are appended in arrival order; with
/// UDP reordering this is best-effort, matching the server's "no
/// reassembly, no retransmission" relay contract.
pub async fn run_receive_loop(socket: Arc<UdpSocket>, events: EventSender) -> anyhow::Result<()> {
    let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
    let mut pending: HashMap<Ipv4Addr, Reassembly> = HashMap::new();

    loop {
        let (len, _src) = socket.recv_from(&mut buf).await?;
        let Some((source, fragment)) = split_source_addr(&buf[..len]) else {
            continue;
        };
        let Some(header) = VideoFragmentHeader::decode(fragment) else {
            continue;
        };
        let chunk = &fragment[VideoFragmentHeader::LEN..];

        if header.seq == 0 {
            pending.insert(
                source,
                Reassembly {
                    total: header.total,
                    buf: Vec::with_capacity(header.total as usize),
                },
            );
        }

        if let Some(entry) = pending.get_mut(&source) {
            entry.buf.extend_from_slice(chunk);
            if entry.buf.len() as u32 >= entry.total {
                let mut jpeg = std::mem::take(&mut entry.buf);
                jpeg.truncate(entry.total as usize);
                pending.remove(&source);
                let _ = events.send(Event::VideoFrame {
                    source,
                    jpeg_bytes: jpeg,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_header_total_is_full_byte_length_not_chunk_count() {
        let jpeg = vec![0u8; VIDEO_CHUNK_MAX_BYTES * 2 + 10];
        let header = VideoFragmentHeader {
            seq: 0,
            total: jpeg.len() as u32,
        };
        assert_eq!(header.total as usize, jpeg.len());
    }
}
