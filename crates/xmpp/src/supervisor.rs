use std::sync::{Arc, Mutex, Weak};

use jid::FullJid;
use tracing::{debug, info, warn};

use crate::network::NetworkMonitor;
use crate::registry::{RegistryEvent, RegistryHandle};
use crate::settings::ConnectionSettings;
use crate::state::ConnectionState;
use crate::transport::{
    Transport, TransportEvent, TransportEventSink, TransportFactory, TransportObserver,
};

/// Per-account capability check: whether this account may hold a connection
/// right now (e.g. enabled and has complete credentials). Supplied by the
/// concrete account kind.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionGate: Send + Sync {
    fn is_connection_available(&self, user_request: bool) -> bool;
}

struct Inner {
    settings: ConnectionSettings,
    state: ConnectionState,
    /// Current transport handle, replaced wholesale on every attempt. The
    /// generation ties in-flight callbacks to the attempt they belong to.
    transport: Option<Arc<dyn Transport>>,
    generation: u64,
    /// The most recent connect attempt was driven by explicit user action.
    user_requested: bool,
    /// Force-offline override, e.g. account disabled.
    disconnection_requested: bool,
    /// The next successful transport connection must register a new account
    /// instead of logging in.
    register_new_account: bool,
    /// Liveness keep-alive watch, held only while connected.
    liveness_watch: bool,
}

/// Owns one account's connect/disconnect/reconnect lifecycle.
///
/// Reconciles user intent, network availability and transport events into a
/// single [`ConnectionState`]. All mutable state sits behind one mutex, so
/// calls may arrive from any thread; blocking transport work always runs on
/// the blocking pool of the runtime captured at construction.
pub struct ConnectionSupervisor {
    account: FullJid,
    gate: Arc<dyn ConnectionGate>,
    factory: Arc<dyn TransportFactory>,
    network: Arc<NetworkMonitor>,
    registry: RegistryHandle,
    runtime: tokio::runtime::Handle,
    weak_self: Weak<ConnectionSupervisor>,
    inner: Mutex<Inner>,
}

/// Event sink handed to transports. Holds the supervisor weakly so an
/// abandoned transport cannot keep its supervisor alive.
struct SupervisorSink(Weak<ConnectionSupervisor>);

impl TransportEventSink for SupervisorSink {
    fn deliver(&self, generation: u64, event: TransportEvent) {
        if let Some(supervisor) = self.0.upgrade() {
            supervisor.handle_transport_event(generation, event);
        }
    }
}

impl ConnectionSupervisor {
    /// Build the supervisor for one configured account. Must be called from
    /// within a tokio runtime; the supervisor lives as long as the account's
    /// configuration, across any number of transport attempts.
    pub fn new(
        settings: ConnectionSettings,
        gate: Arc<dyn ConnectionGate>,
        factory: Arc<dyn TransportFactory>,
        network: Arc<NetworkMonitor>,
        registry: RegistryHandle,
    ) -> Arc<Self> {
        let account = settings.account().clone();
        Arc::new_cyclic(|weak_self| Self {
            account,
            gate,
            factory,
            network,
            registry,
            runtime: tokio::runtime::Handle::current(),
            weak_self: weak_self.clone(),
            inner: Mutex::new(Inner {
                settings,
                state: ConnectionState::Offline,
                transport: None,
                generation: 0,
                user_requested: false,
                disconnection_requested: false,
                register_new_account: false,
                liveness_watch: false,
            }),
        })
    }

    pub fn account(&self) -> &FullJid {
        &self.account
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap().state
    }

    /// Snapshot of the current connection options.
    pub fn settings(&self) -> ConnectionSettings {
        self.inner.lock().unwrap().settings.clone()
    }

    pub fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        self.inner.lock().unwrap().transport.clone()
    }

    /// Mark that the next successful transport connection must register a
    /// new account on the server instead of logging in.
    pub fn register_account(&self) {
        self.inner.lock().unwrap().register_new_account = true;
    }

    pub fn is_registering_account(&self) -> bool {
        self.inner.lock().unwrap().register_new_account
    }

    /// The registration flow finished on the server; authentication is next.
    pub fn on_account_registered(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.register_new_account = false;
        inner.state = ConnectionState::Authentication;
    }

    /// Credential update issued by an authenticated external flow.
    pub fn on_password_changed(&self, password: &str) {
        self.inner.lock().unwrap().settings.set_password(password);
    }

    /// Set or clear the force-offline override. Takes effect on the next
    /// [`ConnectionSupervisor::update_connection`] call.
    pub fn set_disconnection_requested(&self, requested: bool) {
        self.inner.lock().unwrap().disconnection_requested = requested;
    }

    /// Connect or disconnect depending on intent, connectivity and the
    /// current state. Returns whether the state changed. Idempotent, never
    /// fails; each branch is one complete transition under the state lock.
    pub fn update_connection(&self, user_request: bool) -> bool {
        let available = self.gate.is_connection_available(user_request);
        debug!(
            account = %self.account,
            user_request,
            available,
            "updating connection"
        );

        let mut inner = self.inner.lock().unwrap();
        if !self.network.is_available() || !available || inner.disconnection_requested {
            let target = if available {
                ConnectionState::Waiting
            } else {
                ConnectionState::Offline
            };

            if inner.state.is_active() {
                if user_request {
                    inner.user_requested = false;
                }
                if let Some(transport) = inner.transport.clone() {
                    self.disconnect_in_background(transport);
                }
                self.handle_closed_locked(&mut inner);
            } else if inner.state == target {
                return false;
            }

            inner.state = target;
            true
        } else if matches!(
            inner.state,
            ConnectionState::Offline | ConnectionState::Waiting
        ) {
            if user_request {
                inner.user_requested = true;
            }
            self.restart_locked(&mut inner);
            true
        } else {
            false
        }
    }

    /// Disconnect and connect again using a live transport. Best-effort
    /// operator action: a no-op unless some session exists or is expected,
    /// and failures are logged, never raised.
    pub fn force_reconnect(&self) {
        let transport = {
            let inner = self.inner.lock().unwrap();
            if !inner.state.is_connectable() {
                return;
            }
            inner.transport.clone()
        };
        let Some(transport) = transport else {
            return;
        };

        let account = self.account.clone();
        self.runtime.spawn_blocking(move || {
            if !transport.is_connected() {
                return;
            }
            transport.disconnect();
            if let Err(error) = transport.connect().and_then(|()| transport.login()) {
                warn!(account = %account, %error, "forced reconnect failed");
            }
        });
    }

    /// Kick the transport while waiting for its automatic retry; there is
    /// nothing live to tear down first. Failures are logged only.
    pub fn reconnect(&self) {
        let transport = {
            let inner = self.inner.lock().unwrap();
            if inner.state != ConnectionState::Waiting {
                return;
            }
            inner.transport.clone()
        };
        let Some(transport) = transport else {
            return;
        };

        let account = self.account.clone();
        self.runtime.spawn_blocking(move || {
            if let Err(error) = transport.connect().and_then(|()| transport.login()) {
                warn!(account = %account, %error, "reconnect attempt failed");
            }
        });
    }

    /// Abandon the current transport and launch a fresh attempt. The old
    /// handle is never reused: the library underneath may hold broken
    /// internal state after a failed handshake.
    fn restart_locked(&self, inner: &mut Inner) {
        if let Some(stale) = inner.transport.take() {
            stale.detach();
        }

        inner.generation += 1;
        let generation = inner.generation;
        let transport = self.factory.build(&inner.settings);
        transport.attach(TransportObserver::new(
            Arc::new(SupervisorSink(self.weak_self.clone())),
            generation,
        ));
        inner.transport = Some(Arc::clone(&transport));
        inner.state = ConnectionState::Connecting;
        self.registry
            .emit(RegistryEvent::Connection(self.account.clone()));

        let register = inner.register_new_account;
        let account = self.account.clone();
        let weak_self = self.weak_self.clone();
        self.runtime.spawn_blocking(move || {
            let result = transport.connect().and_then(|()| {
                if register {
                    // Registration runs its own exchange before login; the
                    // `Connected` event parks the state machine in
                    // `Registration` until the flow completes.
                    Ok(())
                } else {
                    transport.login()
                }
            });
            if let Err(error) = result {
                warn!(account = %account, %error, "connection attempt failed");
                if let Some(supervisor) = weak_self.upgrade() {
                    supervisor.handle_transport_event(
                        generation,
                        TransportEvent::ClosedOnError(error.to_string()),
                    );
                }
            }
        });
    }

    fn disconnect_in_background(&self, transport: Arc<dyn Transport>) {
        self.runtime.spawn_blocking(move || transport.disconnect());
    }

    /// Clean-closure handling, shared between the transport callback and the
    /// synthesized close in the teardown branch of `update_connection`: the
    /// user-visible failure fires only while a user-initiated attempt is
    /// still pending.
    fn handle_closed_locked(&self, inner: &mut Inner) {
        inner.state = ConnectionState::Offline;
        inner.liveness_watch = false;
        self.registry
            .emit(RegistryEvent::Disconnect(self.account.clone()));
        if inner.user_requested {
            self.registry
                .emit(RegistryEvent::ConnectionFailed(self.account.clone()));
        }
        inner.user_requested = false;
        self.registry
            .emit(RegistryEvent::AccountStateChanged(self.account.clone()));
    }

    /// Transport callbacks arrive on arbitrary threads. Events from a
    /// superseded transport are dropped here by generation check.
    fn handle_transport_event(&self, generation: u64, event: TransportEvent) {
        let mut inner = self.inner.lock().unwrap();
        if generation != inner.generation {
            debug!(
                account = %self.account,
                generation,
                current = inner.generation,
                "ignoring event from superseded transport"
            );
            return;
        }

        match event {
            TransportEvent::Connected => {
                inner.state = if inner.register_new_account {
                    ConnectionState::Registration
                } else {
                    ConnectionState::Authentication
                };
                self.registry
                    .emit(RegistryEvent::Connected(self.account.clone()));
            }
            TransportEvent::Authenticated { resumed } => {
                inner.state = ConnectionState::Connected;
                inner.liveness_watch = true;
                self.registry.emit(RegistryEvent::Authorized {
                    account: self.account.clone(),
                    resumed,
                });
            }
            TransportEvent::Closed => {
                self.handle_closed_locked(&mut inner);
            }
            TransportEvent::ClosedOnError(reason) => {
                warn!(account = %self.account, reason, "connection closed on error");
                inner.state = ConnectionState::Waiting;
                inner.liveness_watch = false;
                self.registry
                    .emit(RegistryEvent::AccountStateChanged(self.account.clone()));
            }
            TransportEvent::ReconnectingIn(seconds) => {
                if inner.state != ConnectionState::Waiting {
                    debug!(account = %self.account, seconds, "reconnection scheduled");
                    inner.state = ConnectionState::Waiting;
                    self.registry
                        .emit(RegistryEvent::AccountStateChanged(self.account.clone()));
                }
            }
            TransportEvent::ReconnectionSucceeded => {
                info!(account = %self.account, "automatic reconnection succeeded");
            }
            TransportEvent::ReconnectionFailed(reason) => {
                warn!(account = %self.account, reason, "automatic reconnection failed");
            }
            TransportEvent::PingFailed => {
                if inner.liveness_watch {
                    warn!(account = %self.account, "liveness check failed");
                }
            }
            TransportEvent::Stanza(stanza) => {
                self.registry.emit(RegistryEvent::Packet {
                    account: self.account.clone(),
                    stanza,
                });
            }
        }
    }
}
