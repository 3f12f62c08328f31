//! Connection supervisor - the blocking `init` / `connect` /
//! `reset_provisioning` API over the event-driven platform.
//!
//! `connect()` only starts things (a provisioning session or the station) and
//! then sleeps on the [`EventSignal`] until the dispatcher reports an address.
//! Everything in between, including credential failures and disconnects, is
//! handled by the dispatcher and never surfaces to the caller.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use wifiprov_proto::{EventDomain, ServiceNameError};

use crate::adapter::{ConnectionDriverAdapter, LinkState};
use crate::config::SupervisorConfig;
use crate::controller::{ControllerPhase, ProvisioningController};
use crate::dispatcher::EventDispatcher;
use crate::event_loop::EventLoop;
use crate::provisioning::{ProvisioningScheme, ProvisioningSubsystem, SessionRequest};
use crate::signal::{EventSignal, SignalBits};
use crate::storage::{CredentialStore, StoreStatus};
use crate::wifi::{NetworkStack, WifiMode, WirelessDriver};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn boxed<E: std::error::Error + Send + Sync + 'static>(e: E) -> BoxError {
    Box::new(e)
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("supervisor is already initialized")]
    AlreadyInitialized,
    #[error("supervisor is not initialized")]
    NotInitialized,
    #[error("an earlier init failed; the platform is left half initialized")]
    InitFailed,
    #[error("credential store: {0}")]
    Store(#[source] BoxError),
    #[error("credential store still needs an erase after erasing it")]
    StoreUnrecoverable,
    #[error("network stack: {0}")]
    NetworkStack(#[source] BoxError),
    #[error("event loop: {0}")]
    EventLoop(#[source] BoxError),
    #[error("wireless driver: {0}")]
    Driver(#[source] BoxError),
    #[error("provisioning: {0}")]
    Provisioning(#[source] BoxError),
    #[error(transparent)]
    ServiceName(#[from] ServiceNameError),
    #[error("no address assigned within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Pending,
    Ready,
    /// Some platform state (handlers, interfaces) may already exist
    Failed,
}

/// Device lifecycle, derived from the controller and adapter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    /// Initialized, nothing started yet
    Initialized,
    Provisioning,
    Connecting,
    Connected(Ipv4Addr),
}

pub struct ConnectionSupervisor<S, N, L, P, D> {
    store: S,
    network: N,
    event_loop: L,
    provisioning: Arc<P>,
    driver: Arc<D>,
    signal: Arc<EventSignal>,
    dispatcher: Arc<EventDispatcher<P, D>>,
    config: SupervisorConfig,
    init_state: InitState,
}

impl<S, N, L, P, D> ConnectionSupervisor<S, N, L, P, D>
where
    S: CredentialStore,
    N: NetworkStack,
    L: EventLoop,
    P: ProvisioningSubsystem + Send + Sync + 'static,
    D: WirelessDriver + Send + Sync + 'static,
{
    pub fn new(
        store: S,
        network: N,
        event_loop: L,
        provisioning: Arc<P>,
        driver: Arc<D>,
        config: SupervisorConfig,
    ) -> Self {
        Self::with_signal(
            store,
            network,
            event_loop,
            provisioning,
            driver,
            config,
            Arc::new(EventSignal::new()),
        )
    }

    /// Same as [`ConnectionSupervisor::new`] with a caller-provided signal
    pub fn with_signal(
        store: S,
        network: N,
        event_loop: L,
        provisioning: Arc<P>,
        driver: Arc<D>,
        config: SupervisorConfig,
        signal: Arc<EventSignal>,
    ) -> Self {
        let controller = ProvisioningController::new(Arc::clone(&provisioning));
        let adapter = ConnectionDriverAdapter::new(
            Arc::clone(&driver),
            Arc::clone(&signal),
            config.reconnect.build(),
        );
        let dispatcher = Arc::new(EventDispatcher::new(controller, adapter));

        Self {
            store,
            network,
            event_loop,
            provisioning,
            driver,
            signal,
            dispatcher,
            config,
            init_state: InitState::Pending,
        }
    }

    /// Bring up storage, network stack, event loop, driver and provisioning
    /// manager, and register the dispatcher for all event domains.
    ///
    /// Must be called once. Any later call fails, including after a failed
    /// first call, so the handlers are never registered twice.
    pub fn init(&mut self) -> Result<(), ConnectError> {
        match self.init_state {
            InitState::Pending => {}
            InitState::Ready => return Err(ConnectError::AlreadyInitialized),
            InitState::Failed => return Err(ConnectError::InitFailed),
        }

        match self.bring_up() {
            Ok(()) => {
                self.init_state = InitState::Ready;
                info!("Wi-Fi manager initialized");
                Ok(())
            }
            Err(e) => {
                self.init_state = InitState::Failed;
                error!("Wi-Fi manager initialization failed: {e}");
                Err(e)
            }
        }
    }

    fn bring_up(&self) -> Result<(), ConnectError> {
        self.init_store()?;

        self.network
            .init()
            .map_err(|e| ConnectError::NetworkStack(boxed(e)))?;
        self.event_loop
            .create_default()
            .map_err(|e| ConnectError::EventLoop(boxed(e)))?;
        self.signal.clear(SignalBits::ALL);

        let handler = self.dispatcher.handler();
        for domain in EventDomain::ALL {
            self.event_loop
                .register(domain, Arc::clone(&handler))
                .map_err(|e| ConnectError::EventLoop(boxed(e)))?;
        }

        self.network
            .create_default_station()
            .map_err(|e| ConnectError::NetworkStack(boxed(e)))?;
        self.network
            .create_default_access_point()
            .map_err(|e| ConnectError::NetworkStack(boxed(e)))?;

        self.driver
            .init()
            .map_err(|e| ConnectError::Driver(boxed(e)))?;

        self.dispatcher
            .controller()
            .ensure_manager(ProvisioningScheme::SoftAp)
            .map_err(|e| ConnectError::Provisioning(boxed(e)))
    }

    fn is_initialized(&self) -> bool {
        self.init_state == InitState::Ready
    }

    /// Erase and retry once if the store asks for it
    fn init_store(&self) -> Result<(), ConnectError> {
        let status = self
            .store
            .init()
            .map_err(|e| ConnectError::Store(boxed(e)))?;
        if status == StoreStatus::Ready {
            return Ok(());
        }

        warn!("Credential store needs an erase, erasing and retrying");
        self.store
            .erase()
            .map_err(|e| ConnectError::Store(boxed(e)))?;
        match self
            .store
            .init()
            .map_err(|e| ConnectError::Store(boxed(e)))?
        {
            StoreStatus::Ready => Ok(()),
            StoreStatus::NeedsErase => Err(ConnectError::StoreUnrecoverable),
        }
    }

    /// Connect, provisioning first if no credentials are stored. Blocks until
    /// the station has an address, or until the configured timeout.
    pub fn connect(&self) -> Result<(), ConnectError> {
        self.connect_within(self.config.connect_timeout())
    }

    /// [`ConnectionSupervisor::connect`] with an explicit timeout
    pub fn connect_timeout(&self, timeout: Duration) -> Result<(), ConnectError> {
        self.connect_within(Some(timeout))
    }

    fn connect_within(&self, timeout: Option<Duration>) -> Result<(), ConnectError> {
        if !self.is_initialized() {
            return Err(ConnectError::NotInitialized);
        }

        // An address reported before this call must not release it
        self.signal.clear(SignalBits::CONNECTED);
        self.dispatcher.adapter().reset_link();

        self.dispatcher
            .controller()
            .ensure_manager(ProvisioningScheme::SoftAp)
            .map_err(|e| ConnectError::Provisioning(boxed(e)))?;
        let provisioned = self
            .provisioning
            .is_provisioned()
            .map_err(|e| ConnectError::Provisioning(boxed(e)))?;

        if provisioned {
            info!("Already provisioned, starting Wi-Fi station");
            self.dispatcher.controller().release_manager();
            self.driver
                .set_mode(WifiMode::Station)
                .map_err(|e| ConnectError::Driver(boxed(e)))?;
            self.driver
                .start()
                .map_err(|e| ConnectError::Driver(boxed(e)))?;
        } else {
            let mac = self
                .driver
                .station_mac()
                .map_err(|e| ConnectError::Driver(boxed(e)))?;
            let service_name = self.config.service_name(&mac)?;
            info!("Starting provisioning as {service_name}");
            self.dispatcher
                .controller()
                .start_session(&SessionRequest::open(service_name))
                .map_err(|e| ConnectError::Provisioning(boxed(e)))?;
        }

        if self.signal.wait(SignalBits::CONNECTED, timeout) {
            Ok(())
        } else {
            Err(ConnectError::Timeout(timeout.unwrap_or_default()))
        }
    }

    /// Forget stored credentials so the next `connect()` provisions again
    pub fn reset_provisioning(&self) -> Result<(), ConnectError> {
        if !self.is_initialized() {
            return Err(ConnectError::NotInitialized);
        }

        self.dispatcher
            .controller()
            .ensure_manager(ProvisioningScheme::SoftAp)
            .map_err(|e| ConnectError::Provisioning(boxed(e)))?;
        self.provisioning
            .reset_credentials()
            .map_err(|e| ConnectError::Provisioning(boxed(e)))?;
        info!("Provisioning reset, stored credentials discarded");
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        if !self.is_initialized() {
            return ConnectionState::Uninitialized;
        }
        if self.dispatcher.phase() == ControllerPhase::Active {
            return ConnectionState::Provisioning;
        }
        match self.dispatcher.link() {
            LinkState::Idle => ConnectionState::Initialized,
            LinkState::Connecting => ConnectionState::Connecting,
            LinkState::Connected(address) => ConnectionState::Connected(address),
        }
    }

    /// Address of the last successful connection
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.dispatcher.address()
    }

    /// Credential failures since the last success
    pub fn retry_count(&self) -> u32 {
        self.dispatcher.retries()
    }
}
