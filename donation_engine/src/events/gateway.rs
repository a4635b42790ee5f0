use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use log::*;
use tokio::sync::{mpsc, mpsc::error::TrySendError};

use crate::{buckets::AggregationSnapshot, events::DonationsUpdated};

pub const DEFAULT_VIEWER_BUFFER: usize = 16;

pub type ViewerId = u64;

#[derive(Default)]
struct Viewers {
    next_id: ViewerId,
    senders: HashMap<ViewerId, mpsc::Sender<DonationsUpdated>>,
}

/// Publish/subscribe registry of connected viewers.
///
/// Publishing never waits on a viewer. Each viewer has a bounded buffer, and a viewer whose buffer is full misses that
/// update. Since every update carries the full snapshot, the next one brings the viewer back up to date.
#[derive(Clone)]
pub struct BroadcastGateway {
    viewers: Arc<Mutex<Viewers>>,
    buffer_size: usize,
}

impl Default for BroadcastGateway {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWER_BUFFER)
    }
}

impl BroadcastGateway {
    pub fn new(buffer_size: usize) -> Self {
        Self { viewers: Arc::new(Mutex::new(Viewers::default())), buffer_size: buffer_size.max(1) }
    }

    /// Registers a new viewer. The viewer is removed again when the returned [`Subscription`] is dropped.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        let mut viewers = self.viewers.lock().unwrap_or_else(PoisonError::into_inner);
        let id = viewers.next_id;
        viewers.next_id += 1;
        viewers.senders.insert(id, sender);
        debug!("📡️ Viewer #{id} connected. {} viewers are connected", viewers.senders.len());
        Subscription { id, receiver, viewers: Arc::downgrade(&self.viewers) }
    }

    /// Sends the snapshot to every connected viewer. Returns the number of viewers it was delivered to.
    pub fn publish(&self, snapshot: AggregationSnapshot) -> usize {
        let event = DonationsUpdated::new(snapshot);
        let mut viewers = self.viewers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        viewers.senders.retain(|id, sender| match sender.try_send(event) {
            Ok(()) => {
                delivered += 1;
                true
            },
            Err(TrySendError::Full(_)) => {
                warn!("📡️ Viewer #{id} is not keeping up. It will miss this update.");
                true
            },
            Err(TrySendError::Closed(_)) => {
                debug!("📡️ Viewer #{id} has gone away. Removing it.");
                false
            },
        });
        trace!("📡️ Snapshot {snapshot} delivered to {delivered} viewers");
        delivered
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.lock().unwrap_or_else(PoisonError::into_inner).senders.len()
    }
}

/// A connected viewer's end of the gateway.
pub struct Subscription {
    id: ViewerId,
    receiver: mpsc::Receiver<DonationsUpdated>,
    viewers: Weak<Mutex<Viewers>>,
}

impl Subscription {
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// Waits for the next update. Returns `None` once the gateway has been dropped.
    pub async fn recv(&mut self) -> Option<DonationsUpdated> {
        self.receiver.recv().await
    }

    /// Returns the next buffered update, if there is one.
    pub fn try_recv(&mut self) -> Option<DonationsUpdated> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(viewers) = self.viewers.upgrade() {
            let mut viewers = viewers.lock().unwrap_or_else(PoisonError::into_inner);
            viewers.senders.remove(&self.id);
            debug!("📡️ Viewer #{} disconnected. {} viewers are connected", self.id, viewers.senders.len());
        }
    }
}
