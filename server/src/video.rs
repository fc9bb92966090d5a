//! Video relay (C4): a dumb UDP fan-out. Each inbound datagram is tagged
//! with the sender's IPv4 address and resent to every endpoint currently
//! registered in the session registry. No reassembly, no retransmission,
//! no flow control — that all happens client-side.

use std::net::SocketAddr;
use std::sync::Arc;

use conference_proto::media::{prefix_source_addr, VIDEO_CHUNK_MAX_BYTES};
use tokio::net::UdpSocket;

use crate::session::SessionRegistry;

/// Generous upper bound: an 8-byte fragment header plus the max JPEG
/// chunk, with headroom.
const MAX_DATAGRAM_BYTES: usize = 8 + VIDEO_CHUNK_MAX_BYTES + 64;

pub async fn run(
    socket: UdpSocket,
    registry: Arc<SessionRegistry>,
) -> anyhow::Result<()> {
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];

    loop {
        let (len, src) = socket.recv_from(&mut buf).await?;
        let source_ip = match src.ip() {
            std::net::IpAddr::V4(v4) => v4,
            std::net::IpAddr::V6(_) => {
                log::debug!("video relay: ignoring datagram from IPv6 source {src}");
                continue;
            }
        };

        let tagged = prefix_source_addr(source_ip, &buf[..len]);
        fan_out(&socket, &registry, &tagged).await;
    }
}

async fn fan_out(socket: &Arc<UdpSocket>, registry: &SessionRegistry, datagram: &[u8]) {
    let targets: Vec<SocketAddr> = registry.all().iter().map(|p| p.video_endpoint()).collect();
    for target in targets {
        if let Err(e) = socket.send_to(datagram, target).await {
            log::debug!("video relay: send to {target} failed: {e}");
        }
    }
}
