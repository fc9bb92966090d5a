//! Session registry (C2).
//!
//! Holds the single source of truth for connected participants: a
//! connection-id → participant map, and the name → connection-id
//! uniqueness index. Both indices live behind one `parking_lot::RwLock` so
//! they are always mutually consistent (Invariant 1 in `spec.md` §8) —
//! there is no window where one reflects a mutation the other hasn't.
//!
//! The video endpoint set and audio endpoint map from `spec.md` §3 are not
//! stored separately: they are views derived from the same participant
//! table, which trivially preserves the "removed on leave" requirement
//! without a second piece of state that could drift out of sync.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use conference_proto::{RosterEntry, ServerControlMessage, COLOR_PALETTE};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::RegisterError;

pub type ConnId = u64;

#[derive(Clone)]
pub struct Participant {
    pub name: String,
    pub addr: SocketAddr,
    pub video_port: u16,
    pub audio_port: u16,
    pub color: String,
    pub outbox: mpsc::UnboundedSender<ServerControlMessage>,
}

impl Participant {
    pub fn video_endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.addr.ip(), self.video_port)
    }

    pub fn audio_endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.addr.ip(), self.audio_port)
    }
}

struct Inner {
    by_conn: HashMap<ConnId, Participant>,
    by_name: HashMap<String, ConnId>,
    next_color: usize,
    last_active: HashMap<ConnId, Instant>,
}

pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_conn: HashMap::new(),
                by_name: HashMap::new(),
                next_color: 0,
                last_active: HashMap::new(),
            }),
        }
    }

    /// Register a newly authenticated participant. Assigns the next
    /// palette color and inserts into both indices atomically, or leaves
    /// state untouched and returns [`RegisterError::NameTaken`].
    pub fn register(
        &self,
        conn: ConnId,
        name: String,
        addr: SocketAddr,
        video_port: u16,
        audio_port: u16,
        outbox: mpsc::UnboundedSender<ServerControlMessage>,
    ) -> Result<String, RegisterError> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&name) {
            return Err(RegisterError::NameTaken);
        }

        let color = COLOR_PALETTE[inner.next_color % COLOR_PALETTE.len()].to_string();
        inner.next_color += 1;

        inner.by_name.insert(name.clone(), conn);
        inner.by_conn.insert(
            conn,
            Participant {
                name,
                addr,
                video_port,
                audio_port,
                color: color.clone(),
                outbox,
            },
        );
        inner.last_active.insert(conn, Instant::now());

        Ok(color)
    }

    /// Remove `conn` from both indices and return the participant that was
    /// removed, if any. Calling this twice for the same `conn` is
    /// idempotent — the second call simply returns `None` (Invariant 8).
    pub fn deregister(&self, conn: ConnId) -> Option<Participant> {
        let mut inner = self.inner.write();
        let participant = inner.by_conn.remove(&conn)?;
        inner.by_name.remove(&participant.name);
        inner.last_active.remove(&conn);
        Some(participant)
    }

    pub fn touch(&self, conn: ConnId) {
        let mut inner = self.inner.write();
        if let Some(t) = inner.last_active.get_mut(&conn) {
            *t = Instant::now();
        }
    }

    pub fn snapshot(&self) -> Vec<RosterEntry> {
        let inner = self.inner.read();
        inner
            .by_conn
            .values()
            .map(|p| RosterEntry {
                name: p.name.clone(),
                color: p.color.clone(),
            })
            .collect()
    }

    pub fn resolve(&self, name: &str) -> Option<ConnId> {
        self.inner.read().by_name.get(name).copied()
    }

    pub fn get(&self, conn: ConnId) -> Option<Participant> {
        self.inner.read().by_conn.get(&conn).cloned()
    }

    /// Snapshot of every participant, for broadcast or datagram fan-out.
    /// Locks are never held across the network write that follows: callers
    /// take this snapshot, release the lock implicitly on return, then send.
    pub fn all(&self) -> Vec<Participant> {
        self.inner.read().by_conn.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_conn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push `msg` to every connected participant's writer task.
    pub fn broadcast(&self, msg: ServerControlMessage) {
        for p in self.all() {
            let _ = p.outbox.send(msg.clone());
        }
    }

    /// Push `msg` to every connected participant except `conn`.
    pub fn broadcast_except(&self, exclude: ConnId, msg: ServerControlMessage) {
        for (conn, p) in self.inner.read().by_conn.iter() {
            if *conn == exclude {
                continue;
            }
            let _ = p.outbox.send(msg.clone());
        }
    }

    pub fn send_to(&self, conn: ConnId, msg: ServerControlMessage) -> bool {
        match self.inner.read().by_conn.get(&conn) {
            Some(p) => p.outbox.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn send_to_name(&self, name: &str, msg: ServerControlMessage) -> bool {
        let conn = match self.resolve(name) {
            Some(c) => c,
            None => return false,
        };
        self.send_to(conn, msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    fn outbox() -> mpsc::UnboundedSender<ServerControlMessage> {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn register_assigns_round_robin_colors() {
        let reg = SessionRegistry::new();
        let c1 = reg.register(1, "alice".into(), addr(1), 1, 2, outbox()).unwrap();
        let c2 = reg.register(2, "bob".into(), addr(2), 1, 2, outbox()).unwrap();
        assert_eq!(c1, COLOR_PALETTE[0]);
        assert_eq!(c2, COLOR_PALETTE[1]);
    }

    #[test]
    fn register_rejects_duplicate_name_without_partial_effects() {
        let reg = SessionRegistry::new();
        reg.register(1, "alice".into(), addr(1), 1, 2, outbox()).unwrap();
        let err = reg
            .register(2, "alice".into(), addr(2), 1, 2, outbox())
            .unwrap_err();
        assert!(matches!(err, RegisterError::NameTaken));
        assert_eq!(reg.len(), 1);
        assert!(reg.resolve("alice") == Some(1));
    }

    #[test]
    fn deregister_is_idempotent() {
        let reg = SessionRegistry::new();
        reg.register(1, "alice".into(), addr(1), 1, 2, outbox()).unwrap();
        let first = reg.deregister(1);
        let second = reg.deregister(1);
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn indices_stay_consistent_after_register_and_deregister() {
        let reg = SessionRegistry::new();
        reg.register(1, "alice".into(), addr(1), 1, 2, outbox()).unwrap();
        reg.register(2, "bob".into(), addr(2), 1, 2, outbox()).unwrap();
        reg.deregister(1);
        assert_eq!(reg.resolve("alice"), None);
        assert_eq!(reg.resolve("bob"), Some(2));
        assert_eq!(reg.snapshot().len(), 1);
    }
}
