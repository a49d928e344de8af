pub mod error;
pub mod network;
pub mod registry;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod transport;

pub use error::{RegistryError, TransportError};
pub use network::{NetworkMonitor, NetworkState};
pub use registry::{ConnectionListener, ConnectionRegistry, RegistryHandle};
pub use settings::{ConnectionSettings, Proxy, SettingsError, TlsMode};
pub use state::ConnectionState;
pub use supervisor::{ConnectionGate, ConnectionSupervisor};
pub use transport::{
    Stanza, Transport, TransportEvent, TransportEventSink, TransportFactory, TransportObserver,
};
