//! Screen-share arbiter (C6): at most one presenter at a time, fanned out
//! to an arbitrary set of viewers. A new presenter always displaces the
//! old one rather than being rejected (`spec.md` §4.6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conference_proto::framing::{read_length_prefixed, write_length_prefixed};
use conference_proto::screen::{RoleSelect, ScreenMessage, ScreenRole, StatusReply, PRESENTER_READ_TIMEOUT_SECS};
use parking_lot::Mutex;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Presenter {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    presenter: Option<Presenter>,
    viewers: HashMap<u64, mpsc::UnboundedSender<ScreenMessage>>,
    next_id: u64,
}

#[derive(Default)]
pub struct ScreenArbiter {
    inner: Mutex<Inner>,
}

impl ScreenArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Displace any existing presenter (cancelling its worker) and install
    /// a new one, returning its id and a token that fires if it is later
    /// displaced in turn.
    fn install_presenter(&self) -> (u64, CancellationToken) {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.presenter.take() {
            old.cancel.cancel();
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let cancel = CancellationToken::new();
        inner.presenter = Some(Presenter {
            id,
            cancel: cancel.clone(),
        });
        (id, cancel)
    }

    /// Clear the presenter slot only if it still belongs to `id` — a
    /// presenter that was already displaced must not clear the new one.
    fn clear_presenter_if(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        match &inner.presenter {
            Some(p) if p.id == id => {
                inner.presenter = None;
                true
            }
            _ => false,
        }
    }

    fn add_viewer(&self, tx: mpsc::UnboundedSender<ScreenMessage>) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.viewers.insert(id, tx);
        id
    }

    fn remove_viewer(&self, id: u64) {
        self.inner.lock().viewers.remove(&id);
    }

    fn viewer_snapshot(&self) -> Vec<mpsc::UnboundedSender<ScreenMessage>> {
        self.inner.lock().viewers.values().cloned().collect()
    }
}

pub async fn run(listener: TcpListener, arbiter: Arc<ScreenArbiter>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let arbiter = arbiter.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, arbiter).await {
                log::debug!("screen connection from {addr} ended: {e}");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, arbiter: Arc<ScreenArbiter>) -> anyhow::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let select: RoleSelect = read_length_prefixed(&mut reader).await?;

    match select.role {
        ScreenRole::Presenter => {
            // The prior presenter's slot must be emptied before the `ok`
            // reply is sent (Invariant 4), so install first, reply second.
            let (id, cancel) = arbiter.install_presenter();
            write_length_prefixed(&mut writer, &StatusReply::ok()).await?;
            run_presenter(reader, arbiter, id, cancel).await
        }
        ScreenRole::Viewer => {
            write_length_prefixed(&mut writer, &StatusReply::ok()).await?;
            run_viewer(reader, writer, arbiter).await
        }
    }
}

async fn run_presenter(
    mut reader: OwnedReadHalf,
    arbiter: Arc<ScreenArbiter>,
    id: u64,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let timeout_dur = Duration::from_secs(PRESENTER_READ_TIMEOUT_SECS);

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            res = tokio::time::timeout(timeout_dur, read_length_prefixed::<ScreenMessage, _>(&mut reader)) => {
                match res {
                    Ok(Ok(msg)) => msg,
                    Ok(Err(_)) | Err(_) => break,
                }
            }
        };

        match frame {
            ScreenMessage::ScreenFrame { .. } => fan_out(&arbiter, &frame),
            ScreenMessage::PresentStop | ScreenMessage::Disconnect => break,
        }
    }

    if arbiter.clear_presenter_if(id) {
        fan_out(&arbiter, &ScreenMessage::PresentStop);
    }
    Ok(())
}

async fn run_viewer(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    arbiter: Arc<ScreenArbiter>,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ScreenMessage>();
    let id = arbiter.add_viewer(tx);

    let write_arbiter = arbiter.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write_length_prefixed(&mut writer, &msg).await.is_err() {
                break;
            }
        }
        write_arbiter.remove_viewer(id);
    });

    loop {
        match read_length_prefixed::<ScreenMessage, _>(&mut reader).await {
            Ok(ScreenMessage::Disconnect) => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }

    arbiter.remove_viewer(id);
    writer_task.abort();
    Ok(())
}

fn fan_out(arbiter: &ScreenArbiter, msg: &ScreenMessage) {
    for tx in arbiter.viewer_snapshot() {
        let _ = tx.send(msg.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_sender() -> mpsc::UnboundedSender<ScreenMessage> {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn a_new_presenter_displaces_the_previous_one() {
        let arbiter = ScreenArbiter::new();
        let (first_id, first_cancel) = arbiter.install_presenter();
        let (second_id, _second_cancel) = arbiter.install_presenter();
        assert!(first_cancel.is_cancelled());
        assert_ne!(first_id, second_id);
        assert!(!arbiter.clear_presenter_if(first_id));
        assert!(arbiter.clear_presenter_if(second_id));
    }

    #[test]
    fn viewer_add_and_remove_round_trips() {
        let arbiter = ScreenArbiter::new();
        let id = arbiter.add_viewer(noop_sender());
        assert_eq!(arbiter.viewer_snapshot().len(), 1);
        arbiter.remove_viewer(id);
        assert_eq!(arbiter.viewer_snapshot().len(), 0);
    }

    #[test]
    fn displaced_presenter_cannot_clear_new_presenters_slot() {
        let arbiter = ScreenArbiter::new();
        let (old_id, _) = arbiter.install_presenter();
        let (_new_id, _) = arbiter.install_presenter();
        assert!(!arbiter.clear_presenter_if(old_id));
    }
}
