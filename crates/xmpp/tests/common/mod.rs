#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rookery_xmpp::{
    ConnectionGate, ConnectionSettings, ConnectionState, ConnectionSupervisor, Transport,
    TransportError, TransportEvent, TransportFactory, TransportObserver,
};

/// Scripted in-memory transport. Records every blocking call and lets tests
/// deliver lifecycle events through the observer a supervisor attached.
#[derive(Default)]
pub struct FakeTransport {
    observer: Mutex<Option<TransportObserver>>,
    connected: AtomicBool,
    connect_error: Mutex<Option<TransportError>>,
    login_error: Mutex<Option<TransportError>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeTransport {
    pub fn fail_next_connect(&self, error: TransportError) {
        *self.connect_error.lock().unwrap() = Some(error);
    }

    pub fn fail_next_login(&self, error: TransportError) {
        *self.login_error.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| **call == name).count()
    }

    /// Clone of the currently attached observer, if any.
    pub fn observer(&self) -> Option<TransportObserver> {
        self.observer.lock().unwrap().clone()
    }

    pub fn is_detached(&self) -> bool {
        self.observer.lock().unwrap().is_none()
    }

    /// Deliver an event as the transport would, through the attached
    /// observer. Silently does nothing when detached.
    pub fn emit(&self, event: TransportEvent) {
        if let Some(observer) = self.observer() {
            observer.deliver(event);
        }
    }
}

impl Transport for FakeTransport {
    fn connect(&self) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push("connect");
        if let Some(error) = self.connect_error.lock().unwrap().take() {
            return Err(error);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn login(&self) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push("login");
        if let Some(error) = self.login_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.calls.lock().unwrap().push("disconnect");
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn attach(&self, observer: TransportObserver) {
        *self.observer.lock().unwrap() = Some(observer);
    }

    fn detach(&self) {
        *self.observer.lock().unwrap() = None;
    }
}

/// Factory that hands out fresh [`FakeTransport`]s and keeps every handle it
/// built, so tests can reach superseded transports.
#[derive(Default)]
pub struct FakeFactory {
    built: Mutex<Vec<Arc<FakeTransport>>>,
    connect_failure: Mutex<Option<TransportError>>,
    login_failure: Mutex<Option<TransportError>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next transport this factory builds fail its connect call.
    pub fn fail_next_built_connect(&self, error: TransportError) {
        *self.connect_failure.lock().unwrap() = Some(error);
    }

    /// Make the next transport this factory builds fail its login call.
    pub fn fail_next_built_login(&self, error: TransportError) {
        *self.login_failure.lock().unwrap() = Some(error);
    }

    pub fn built_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }

    pub fn latest(&self) -> Arc<FakeTransport> {
        self.built
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no transport was built")
    }

    pub fn nth(&self, index: usize) -> Arc<FakeTransport> {
        self.built.lock().unwrap()[index].clone()
    }
}

impl TransportFactory for FakeFactory {
    fn build(&self, _settings: &ConnectionSettings) -> Arc<dyn Transport> {
        let transport = Arc::new(FakeTransport::default());
        if let Some(error) = self.connect_failure.lock().unwrap().take() {
            transport.fail_next_connect(error);
        }
        if let Some(error) = self.login_failure.lock().unwrap().take() {
            transport.fail_next_login(error);
        }
        self.built.lock().unwrap().push(Arc::clone(&transport));
        transport
    }
}

/// Account-capability hook with a switchable answer.
pub struct StaticGate {
    available: AtomicBool,
}

impl StaticGate {
    pub fn new(available: bool) -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(available),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl ConnectionGate for StaticGate {
    fn is_connection_available(&self, _user_request: bool) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

pub fn settings() -> ConnectionSettings {
    ConnectionSettings::new("finch@rookery.im/rookery".parse().unwrap(), "secret")
}

/// Poll until the supervisor reaches the expected state or time runs out.
pub async fn wait_for_state(supervisor: &ConnectionSupervisor, expected: ConnectionState) {
    for _ in 0..200 {
        if supervisor.state() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "supervisor never reached {expected}, still {}",
        supervisor.state()
    );
}

/// Poll until the transport recorded at least `count` calls named `name`.
pub async fn wait_for_calls(transport: &FakeTransport, name: &str, count: usize) {
    for _ in 0..200 {
        if transport.call_count(name) >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "transport never recorded {count}x {name}, calls: {:?}",
        transport.calls()
    );
}
