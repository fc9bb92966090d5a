//! Audio pipeline (C9, media concern): mic capture and speaker playback
//! are out of scope, so the sender forwards already-captured packets as
//! they arrive and the receiver fills a bounded jitter buffer a playback
//! driver can drain at its own pace.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use conference_proto::media::{decode_pcm, encode_pcm, AUDIO_FIFO_CAPACITY};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Bounded FIFO of decoded PCM packets awaiting playback. Capacity
/// matches the server mixer's own per-sender FIFO so a slow playback
/// driver degrades the same way a slow network path would.
pub struct JitterBuffer {
    inner: Mutex<VecDeque<Vec<i16>>>,
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(AUDIO_FIFO_CAPACITY)),
        }
    }

    fn push(&self, packet: Vec<i16>) {
        let mut inner = self.inner.lock();
        if inner.len() >= AUDIO_FIFO_CAPACITY {
            inner.pop_front();
        }
        inner.push_back(packet);
    }

    pub fn pop(&self) -> Option<Vec<i16>> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub async fn run_send_loop(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    enabled: Arc<AtomicBool>,
    mut packets: mpsc::Receiver<Vec<i16>>,
) -> anyhow::Result<()> {
    while let Some(samples) = packets.recv().await {
        if !enabled.load(Ordering::Relaxed) {
            continue;
        }
        let bytes = encode_pcm(&samples);
        socket.send_to(&bytes, target).await?;
    }
    Ok(())
}

pub async fn run_receive_loop(socket: Arc<UdpSocket>, buffer: Arc<JitterBuffer>) -> anyhow::Result<()> {
    let mut buf = [0u8; 4096];
    loop {
        let (len, _src) = socket.recv_from(&mut buf).await?;
        buffer.push(decode_pcm(&buf[..len]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_buffer_drops_oldest_past_capacity() {
        let jb = JitterBuffer::new();
        for i in 0..(AUDIO_FIFO_CAPACITY + 3) {
            jb.push(vec![i as i16]);
        }
        assert_eq!(jb.len(), AUDIO_FIFO_CAPACITY);
        assert_eq!(jb.pop(), Some(vec![3]));
    }

    #[test]
    fn jitter_buffer_fifo_order() {
        let jb = JitterBuffer::new();
        jb.push(vec![1]);
        jb.push(vec![2]);
        assert_eq!(jb.pop(), Some(vec![1]));
        assert_eq!(jb.pop(), Some(vec![2]));
        assert_eq!(jb.pop(), None);
    }
}
