//! Audio pipeline (C5): per-sender jitter FIFOs with packet-loss
//! concealment, mixed on a fixed 16ms tick and fanned out per-recipient
//! with the recipient's own voice excluded.
//!
//! The FIFOs and last-good cache are intentionally *not* part of
//! [`crate::session::SessionRegistry`] — `spec.md` §5 calls them
//! "mixer-owned" with their own implicit lock, separate from
//! `clients_lock`. Keeping them here means a participant leaving only
//! needs the registry's write lock; the mixer discovers the departure on
//! its next tick via the known-endpoints snapshot.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use conference_proto::media::{decode_pcm, encode_pcm, AUDIO_FIFO_CAPACITY, AUDIO_TICK_MILLIS};
use parking_lot::Mutex;
use tokio::net::UdpSocket;

use crate::session::SessionRegistry;

/// Absorb scheduling jitter by sleeping for slightly less than a full tick.
const TICK_JITTER_SCALE: f64 = 0.9;

#[derive(Default)]
struct SenderState {
    fifo: VecDeque<Vec<u8>>,
    last_good: Option<Vec<u8>>,
}

#[derive(Default)]
pub struct AudioState {
    senders: Mutex<HashMap<SocketAddr, SenderState>>,
}

impl AudioState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an inbound packet to `from`'s FIFO, dropping the oldest
    /// entry if it is already at capacity.
    fn ingest(&self, from: SocketAddr, packet: Vec<u8>) {
        let mut senders = self.senders.lock();
        let entry = senders.entry(from).or_default();
        if entry.fifo.len() >= AUDIO_FIFO_CAPACITY {
            entry.fifo.pop_front();
        }
        entry.fifo.push_back(packet);
    }

    /// Drop any sender state whose address is no longer a known endpoint,
    /// then dequeue (or conceal) one packet per remaining known sender.
    fn take_tick_packets(&self, known: &HashSet<SocketAddr>) -> Vec<(SocketAddr, Vec<u8>)> {
        let mut senders = self.senders.lock();
        senders.retain(|addr, _| known.contains(addr));

        let mut chosen = Vec::new();
        for addr in known {
            let entry = senders.entry(*addr).or_default();
            let packet = entry.fifo.pop_front();
            match packet {
                Some(p) => {
                    entry.last_good = Some(p.clone());
                    chosen.push((*addr, p));
                }
                None => {
                    if let Some(p) = entry.last_good.clone() {
                        chosen.push((*addr, p));
                    }
                }
            }
        }
        chosen
    }
}

/// Compute the per-recipient mix for one tick: truncate every chosen
/// packet to the shortest sample count, then for each recipient average
/// every *other* sender's samples, clipping to `i16`. Pure and
/// allocation-only so it can be unit tested without a socket.
pub fn mix_tick(
    recipients: &[SocketAddr],
    chosen: &[(SocketAddr, Vec<i16>)],
) -> Vec<(SocketAddr, Vec<i16>)> {
    if chosen.is_empty() {
        return Vec::new();
    }

    let min_len = chosen.iter().map(|(_, s)| s.len()).min().unwrap_or(0);
    let truncated: Vec<(SocketAddr, &[i16])> =
        chosen.iter().map(|(addr, s)| (*addr, &s[..min_len])).collect();

    let mut out = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let contributors: Vec<&[i16]> = truncated
            .iter()
            .filter(|(addr, _)| addr != recipient)
            .map(|(_, s)| *s)
            .collect();

        if contributors.is_empty() {
            continue;
        }

        let mut mix = Vec::with_capacity(min_len);
        for i in 0..min_len {
            let sum: i64 = contributors.iter().map(|s| s[i] as i64).sum();
            let mean = sum / contributors.len() as i64;
            mix.push(mean.clamp(i16::MIN as i64, i16::MAX as i64) as i16);
        }
        out.push((*recipient, mix));
    }
    out
}

pub async fn run_receiver(socket: Arc<UdpSocket>, state: Arc<AudioState>) -> anyhow::Result<()> {
    let mut buf = [0u8; 4096];
    loop {
        let (len, src) = socket.recv_from(&mut buf).await?;
        state.ingest(src, buf[..len].to_vec());
    }
}

pub async fn run_mixer(
    socket: Arc<UdpSocket>,
    state: Arc<AudioState>,
    registry: Arc<SessionRegistry>,
) -> anyhow::Result<()> {
    let tick_duration = Duration::from_millis(AUDIO_TICK_MILLIS);

    loop {
        let tick_start = Instant::now();

        let participants = registry.all();
        let known_endpoints: HashSet<SocketAddr> =
            participants.iter().map(|p| p.audio_endpoint()).collect();
        let recipients: Vec<SocketAddr> = known_endpoints.iter().copied().collect();

        let chosen_raw = state.take_tick_packets(&known_endpoints);
        let chosen: Vec<(SocketAddr, Vec<i16>)> = chosen_raw
            .into_iter()
            .map(|(addr, bytes)| (addr, decode_pcm(&bytes)))
            .collect();

        let mixes = mix_tick(&recipients, &chosen);
        for (recipient, samples) in mixes {
            let bytes = encode_pcm(&samples);
            if let Err(e) = socket.send_to(&bytes, recipient).await {
                log::debug!("audio mixer: send to {recipient} failed: {e}");
            }
        }

        let elapsed = tick_start.elapsed();
        let budget = tick_duration.mul_f64(TICK_JITTER_SCALE);
        if let Some(remaining) = budget.checked_sub(elapsed) {
            tokio::time::sleep(remaining).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn mix_excludes_recipients_own_packet() {
        let a = addr(1);
        let b = addr(2);
        let c = addr(3);
        let chosen = vec![
            (a, vec![10i16, 20]),
            (b, vec![30, 40]),
            (c, vec![50, 60]),
        ];
        let mixes = mix_tick(&[a, b, c], &chosen);
        let mix_for_a = mixes.iter().find(|(addr, _)| *addr == a).unwrap();
        // a's mix should be the mean of b and c only: (30+50)/2=40, (40+60)/2=50
        assert_eq!(mix_for_a.1, vec![40, 50]);
    }

    #[test]
    fn mix_truncates_to_shortest_packet() {
        let a = addr(1);
        let b = addr(2);
        let chosen = vec![(a, vec![10i16, 20, 30]), (b, vec![100, 200])];
        let mixes = mix_tick(&[a, b], &chosen);
        let mix_for_a = mixes.iter().find(|(addr, _)| *addr == a).unwrap();
        assert_eq!(mix_for_a.1.len(), 2);
    }

    #[test]
    fn mix_clips_to_i16_range() {
        let a = addr(1);
        let b = addr(2);
        let chosen = vec![(a, vec![i16::MAX, i16::MAX]), (b, vec![i16::MAX, i16::MAX])];
        let mixes = mix_tick(&[a], &chosen);
        let mix_for_a = mixes.iter().find(|(addr, _)| *addr == a).unwrap();
        assert_eq!(mix_for_a.1, vec![i16::MAX, i16::MAX]);
    }

    #[test]
    fn empty_tick_produces_no_mixes() {
        let a = addr(1);
        assert!(mix_tick(&[a], &[]).is_empty());
    }

    #[test]
    fn fifo_caps_at_capacity_dropping_oldest() {
        let state = AudioState::new();
        let a = addr(1);
        for i in 0..(AUDIO_FIFO_CAPACITY + 5) {
            state.ingest(a, vec![i as u8]);
        }
        let mut senders = state.senders.lock();
        let entry = senders.get_mut(&a).unwrap();
        assert_eq!(entry.fifo.len(), AUDIO_FIFO_CAPACITY);
        assert_eq!(entry.fifo.front().unwrap(), &vec![5u8]);
    }

    #[test]
    fn packet_loss_concealment_reuses_last_good() {
        let state = AudioState::new();
        let a = addr(1);
        state.ingest(a, vec![1, 2, 3, 4]);
        let known: HashSet<SocketAddr> = [a].into_iter().collect();
        let first = state.take_tick_packets(&known);
        assert_eq!(first, vec![(a, vec![1, 2, 3, 4])]);
        // FIFO now empty; next tick should reuse the last-good packet.
        let second = state.take_tick_packets(&known);
        assert_eq!(second, vec![(a, vec![1, 2, 3, 4])]);
    }

    #[test]
    fn departed_sender_is_dropped_from_state() {
        let state = AudioState::new();
        let a = addr(1);
        state.ingest(a, vec![1, 2]);
        let empty: HashSet<SocketAddr> = HashSet::new();
        let chosen = state.take_tick_packets(&empty);
        assert!(chosen.is_empty());
        assert!(state.senders.lock().is_empty());
    }
}
