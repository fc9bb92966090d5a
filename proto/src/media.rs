//! Video (C4) and audio (C5) datagram wire formats. Both channels are raw
//! UDP with no JSON framing — just fixed binary headers.

/// Maximum JPEG chunk carried in one video datagram.
pub const VIDEO_CHUNK_MAX_BYTES: usize = 1100;
/// Target camera frame rate the sender paces to.
pub const VIDEO_FRAME_RATE_HZ: u32 = 20;

/// Inbound (client → server) video datagram header: `seq` and `total`,
/// both big-endian u32, followed by a JPEG chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFragmentHeader {
    pub seq: u32,
    pub total: u32,
}

impl VideoFragmentHeader {
    pub const LEN: usize = 8;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..4].copy_from_slice(&self.seq.to_be_bytes());
        buf[4..8].copy_from_slice(&self.total.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        Some(Self {
            seq: u32::from_be_bytes(buf[0..4].try_into().ok()?),
            total: u32::from_be_bytes(buf[4..8].try_into().ok()?),
        })
    }
}

/// Outbound (server → client) video datagram: 4-byte source IPv4 address,
/// then the same `seq`/`total` header, then the JPEG chunk.
pub fn prefix_source_addr(source: std::net::Ipv4Addr, fragment: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + fragment.len());
    out.extend_from_slice(&source.octets());
    out.extend_from_slice(fragment);
    out
}

/// Split a tagged outbound video datagram back into its source address and
/// the original fragment bytes (header + JPEG chunk), as the client does on
/// receive.
pub fn split_source_addr(datagram: &[u8]) -> Option<(std::net::Ipv4Addr, &[u8])> {
    if datagram.len() < 4 {
        return None;
    }
    let octets: [u8; 4] = datagram[0..4].try_into().ok()?;
    Some((std::net::Ipv4Addr::from(octets), &datagram[4..]))
}

/// PCM packet: 16-bit little-endian mono samples at 16 kHz.
pub const AUDIO_SAMPLE_RATE_HZ: u32 = 16_000;
pub const AUDIO_SAMPLES_PER_PACKET: usize = 256;
pub const AUDIO_PACKET_BYTES: usize = AUDIO_SAMPLES_PER_PACKET * 2;
/// Mixer tick period; matches one packet's playback duration.
pub const AUDIO_TICK_MILLIS: u64 = 16;
/// Bounded per-sender jitter FIFO depth.
pub const AUDIO_FIFO_CAPACITY: usize = 10;

/// Decode a raw little-endian PCM packet into signed 16-bit samples.
pub fn decode_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Encode signed 16-bit samples back into a little-endian PCM byte packet.
pub fn encode_pcm(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_header_round_trips() {
        let header = VideoFragmentHeader { seq: 3, total: 7 };
        let encoded = header.encode();
        assert_eq!(VideoFragmentHeader::decode(&encoded), Some(header));
    }

    #[test]
    fn source_addr_round_trips() {
        let addr = std::net::Ipv4Addr::new(192, 168, 1, 42);
        let fragment = [0u8, 1, 2, 3];
        let tagged = prefix_source_addr(addr, &fragment);
        let (got_addr, got_fragment) = split_source_addr(&tagged).unwrap();
        assert_eq!(got_addr, addr);
        assert_eq!(got_fragment, &fragment);
    }

    #[test]
    fn pcm_round_trips() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let bytes = encode_pcm(&samples);
        assert_eq!(decode_pcm(&bytes), samples);
    }
}
