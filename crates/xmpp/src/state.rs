use std::fmt;

/// Lifecycle state of one account's connection.
///
/// Exactly one state holds at any instant; only the owning
/// [`ConnectionSupervisor`](crate::supervisor::ConnectionSupervisor) and its
/// transport event handlers write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No attempt in progress and none desired.
    Offline,
    /// A transport attempt has been launched.
    Connecting,
    /// Transport-level connect succeeded, credential exchange pending.
    Authentication,
    /// New-account registration pending.
    Registration,
    /// Fully usable session.
    Connected,
    /// Connection desired but currently unavailable; automatic retry expected.
    Waiting,
}

impl ConnectionState {
    /// Whether the connection either exists or is expected to come back on
    /// its own. Every state except `Offline` qualifies.
    pub fn is_connectable(self) -> bool {
        !matches!(self, ConnectionState::Offline)
    }

    /// States with a live transport attempt that a teardown must close.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Authentication | ConnectionState::Connecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Offline => "offline",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authentication => "authentication",
            ConnectionState::Registration => "registration",
            ConnectionState::Connected => "connected",
            ConnectionState::Waiting => "waiting",
        };
        write!(f, "{name}")
    }
}
