use tokio::sync::watch;

/// Process-wide connectivity as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Available,
    Unavailable,
}

/// Holder for the current [`NetworkState`] with change notification.
///
/// Created once per process and passed by `Arc` to every supervisor and to
/// the registry; the platform integration layer feeds it via
/// [`NetworkMonitor::set_state`].
#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<NetworkState>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkState) -> Self {
        Self {
            tx: watch::Sender::new(initial),
        }
    }

    pub fn state(&self) -> NetworkState {
        *self.tx.borrow()
    }

    pub fn is_available(&self) -> bool {
        self.state() == NetworkState::Available
    }

    /// Record a connectivity change. Returns whether the state actually
    /// changed; subscribers are only woken on real transitions.
    pub fn set_state(&self, next: NetworkState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkState::Unavailable)
    }
}
