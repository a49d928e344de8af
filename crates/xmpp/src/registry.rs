use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use jid::FullJid;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::network::NetworkMonitor;
use crate::supervisor::ConnectionSupervisor;
use crate::transport::Stanza;

/// Downstream consumer of per-account connection events.
///
/// Callbacks run on the registry's dispatch task and must not block it for
/// long. Events for one account arrive in the order they were produced;
/// events for different accounts interleave freely.
pub trait ConnectionListener: Send + Sync {
    /// A fresh transport was created for the account, before connect.
    fn on_connection(&self, _account: &FullJid) {}

    fn on_connected(&self, _account: &FullJid) {}

    fn on_authorized(&self, _account: &FullJid, _resumed: bool) {}

    fn on_disconnect(&self, _account: &FullJid) {}

    /// One-shot signal that a user-initiated connect attempt failed.
    fn on_connection_failed(&self, _account: &FullJid) {}

    fn on_account_state_changed(&self, _account: &FullJid) {}

    fn process_packet(&self, _account: &FullJid, _stanza: &Stanza) {}
}

#[derive(Debug, Clone)]
pub(crate) enum RegistryEvent {
    Connection(FullJid),
    Connected(FullJid),
    Authorized { account: FullJid, resumed: bool },
    Disconnect(FullJid),
    ConnectionFailed(FullJid),
    AccountStateChanged(FullJid),
    Packet { account: FullJid, stanza: Stanza },
    Shutdown,
}

/// Cloneable sender half handed to each supervisor. Sends never block; once
/// the registry has shut down, events are dropped silently.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::UnboundedSender<RegistryEvent>,
}

impl RegistryHandle {
    pub(crate) fn emit(&self, event: RegistryEvent) {
        let _ = self.tx.send(event);
    }
}

/// Process-wide table of active connection supervisors and the fan-out point
/// for their lifecycle events and raw stanza delivery.
pub struct ConnectionRegistry {
    entries: DashMap<FullJid, Arc<ConnectionSupervisor>>,
    listeners: Arc<RwLock<Vec<Arc<dyn ConnectionListener>>>>,
    events_tx: mpsc::UnboundedSender<RegistryEvent>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionRegistry {
    /// Create the registry and spawn its dispatch task. Must be called from
    /// within a tokio runtime; tear down with [`ConnectionRegistry::shutdown`].
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let listeners: Arc<RwLock<Vec<Arc<dyn ConnectionListener>>>> =
            Arc::new(RwLock::new(Vec::new()));
        let dispatcher = tokio::spawn(dispatch(events_rx, Arc::clone(&listeners)));

        Arc::new(Self {
            entries: DashMap::new(),
            listeners,
            events_tx,
            dispatcher: Mutex::new(Some(dispatcher)),
            watchers: Mutex::new(Vec::new()),
        })
    }

    /// Sender half used by supervisors to publish their events.
    pub fn handle(&self) -> RegistryHandle {
        RegistryHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    /// Track a newly configured account. Exactly one entry may exist per
    /// account identity.
    pub fn insert(&self, supervisor: Arc<ConnectionSupervisor>) -> Result<(), RegistryError> {
        let account = supervisor.account().clone();
        match self.entries.entry(account.clone()) {
            dashmap::Entry::Occupied(_) => Err(RegistryError::DuplicateAccount(account)),
            dashmap::Entry::Vacant(vacant) => {
                vacant.insert(supervisor);
                Ok(())
            }
        }
    }

    /// Drop a deleted account's supervisor from the table.
    pub fn remove(&self, account: &FullJid) -> Option<Arc<ConnectionSupervisor>> {
        self.entries.remove(account).map(|(_, supervisor)| supervisor)
    }

    pub fn get(&self, account: &FullJid) -> Option<Arc<ConnectionSupervisor>> {
        self.entries
            .get(account)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn accounts(&self) -> Vec<FullJid> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reconcile every account against current intent and connectivity.
    pub fn update_all(&self, user_request: bool) {
        let mut changed = 0_usize;
        for entry in self.entries.iter() {
            if entry.value().update_connection(user_request) {
                changed += 1;
            }
        }
        debug!(accounts = self.entries.len(), changed, "updated all connections");
    }

    /// Best-effort reconnect of every account with a live or pending session.
    pub fn force_reconnect_all(&self) {
        for entry in self.entries.iter() {
            entry.value().force_reconnect();
        }
    }

    /// React to connectivity changes: every transition reconciles all
    /// accounts. The watch task lives until [`ConnectionRegistry::shutdown`].
    pub fn watch_network(self: &Arc<Self>, monitor: &NetworkMonitor) {
        let mut rx = monitor.subscribe();
        let registry = Arc::clone(self);
        let watcher = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                debug!(?state, "network state changed");
                registry.update_all(false);
            }
        });
        self.watchers.lock().unwrap().push(watcher);
    }

    /// Stop the network watchers and drain the dispatch task. Events emitted
    /// after shutdown are discarded.
    pub async fn shutdown(&self) {
        for watcher in self.watchers.lock().unwrap().drain(..) {
            watcher.abort();
        }

        let _ = self.events_tx.send(RegistryEvent::Shutdown);
        let dispatcher = self.dispatcher.lock().unwrap().take();
        if let Some(dispatcher) = dispatcher {
            if let Err(error) = dispatcher.await {
                warn!(%error, "registry dispatch task did not shut down cleanly");
            }
        }
    }
}

async fn dispatch(
    mut events_rx: mpsc::UnboundedReceiver<RegistryEvent>,
    listeners: Arc<RwLock<Vec<Arc<dyn ConnectionListener>>>>,
) {
    while let Some(event) = events_rx.recv().await {
        if matches!(event, RegistryEvent::Shutdown) {
            break;
        }

        let listeners = listeners.read().unwrap().clone();
        for listener in &listeners {
            match &event {
                RegistryEvent::Connection(account) => listener.on_connection(account),
                RegistryEvent::Connected(account) => listener.on_connected(account),
                RegistryEvent::Authorized { account, resumed } => {
                    listener.on_authorized(account, *resumed)
                }
                RegistryEvent::Disconnect(account) => listener.on_disconnect(account),
                RegistryEvent::ConnectionFailed(account) => listener.on_connection_failed(account),
                RegistryEvent::AccountStateChanged(account) => {
                    listener.on_account_state_changed(account)
                }
                RegistryEvent::Packet { account, stanza } => {
                    listener.process_packet(account, stanza)
                }
                RegistryEvent::Shutdown => {}
            }
        }
    }
}
