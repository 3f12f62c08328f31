//! In-memory platform for host runs and tests
//!
//! Every collaborator records the calls it receives in a shared [`CallLog`].
//! Events are injected by hand through [`EventInjector::post`], which delivers
//! them serially the way the platform event loop does.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use wifiprov_proto::{Event, EventDomain, MacAddress};

use crate::config::SupervisorConfig;
use crate::event_loop::{EventHandler, EventLoop};
use crate::provisioning::{ProvisioningScheme, ProvisioningSubsystem, SessionRequest};
use crate::signal::EventSignal;
use crate::storage::{CredentialStore, StoreStatus};
use crate::supervisor::ConnectionSupervisor;
use crate::wifi::{NetworkStack, WifiMode, WirelessDriver};

/// One platform call, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StoreInit,
    StoreErase,
    NetworkInit,
    CreateStation,
    CreateAccessPoint,
    EventLoopCreate,
    Register(EventDomain),
    DriverInit,
    SetMode(WifiMode),
    DriverStart,
    DriverConnect,
    StationMac,
    ProvisioningInit(ProvisioningScheme),
    IsProvisioned,
    StartSession(SessionRequest),
    ProvisioningDeinit,
    ResetCredentials,
    ResetStateOnFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("simulated failure: {0}")]
    Injected(&'static str),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct CallLog {
    inner: Arc<(Mutex<Vec<Call>>, Condvar)>,
}

impl CallLog {
    pub fn record(&self, call: Call) {
        let (calls, recorded) = &*self.inner;
        lock(calls).push(call);
        recorded.notify_all();
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.inner.0).clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        lock(&self.inner.0).iter().filter(|c| pred(*c)).count()
    }

    /// Block until a call matching `pred` has been recorded
    pub fn wait_for(&self, pred: impl Fn(&Call) -> bool, timeout: Duration) -> bool {
        self.wait_for_nth(pred, 1, timeout)
    }

    /// Block until `n` calls matching `pred` have been recorded
    pub fn wait_for_nth(&self, pred: impl Fn(&Call) -> bool, n: usize, timeout: Duration) -> bool {
        let (calls, recorded) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut calls = lock(calls);
        loop {
            if calls.iter().filter(|c| pred(*c)).count() >= n {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            calls = recorded
                .wait_timeout(calls, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Credential store answering from a script, `Ready` once it runs out
#[derive(Clone)]
pub struct SimStore {
    log: CallLog,
    script: Arc<Mutex<VecDeque<Result<StoreStatus, SimError>>>>,
}

impl SimStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            script: Arc::default(),
        }
    }

    /// Answers for the next `init()` calls
    pub fn script(&self, answers: impl IntoIterator<Item = Result<StoreStatus, SimError>>) {
        lock(&self.script).extend(answers);
    }
}

impl CredentialStore for SimStore {
    type Error = SimError;

    fn init(&self) -> Result<StoreStatus, SimError> {
        self.log.record(Call::StoreInit);
        lock(&self.script)
            .pop_front()
            .unwrap_or(Ok(StoreStatus::Ready))
    }

    fn erase(&self) -> Result<(), SimError> {
        self.log.record(Call::StoreErase);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SimNetworkStack {
    log: CallLog,
}

impl SimNetworkStack {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl NetworkStack for SimNetworkStack {
    type Error = SimError;

    fn init(&self) -> Result<(), SimError> {
        self.log.record(Call::NetworkInit);
        Ok(())
    }

    fn create_default_station(&self) -> Result<(), SimError> {
        self.log.record(Call::CreateStation);
        Ok(())
    }

    fn create_default_access_point(&self) -> Result<(), SimError> {
        self.log.record(Call::CreateAccessPoint);
        Ok(())
    }
}

type Registrations = Arc<Mutex<Vec<(EventDomain, EventHandler)>>>;

#[derive(Clone)]
pub struct SimEventLoop {
    log: CallLog,
    handlers: Registrations,
    delivery: Arc<Mutex<()>>,
}

impl SimEventLoop {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            handlers: Arc::default(),
            delivery: Arc::default(),
        }
    }

    pub fn injector(&self) -> EventInjector {
        EventInjector {
            handlers: Arc::clone(&self.handlers),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl EventLoop for SimEventLoop {
    type Error = SimError;

    fn create_default(&self) -> Result<(), SimError> {
        self.log.record(Call::EventLoopCreate);
        Ok(())
    }

    fn register(&self, domain: EventDomain, handler: EventHandler) -> Result<(), SimError> {
        self.log.record(Call::Register(domain));
        lock(&self.handlers).push((domain, handler));
        Ok(())
    }
}

/// Posts events into a [`SimEventLoop`]
#[derive(Clone)]
pub struct EventInjector {
    handlers: Registrations,
    delivery: Arc<Mutex<()>>,
}

impl EventInjector {
    /// Deliver `event` to every handler registered for its domain. Returns
    /// once all of them ran. Concurrent posts are delivered one at a time.
    pub fn post(&self, event: &Event) {
        let _delivering = lock(&self.delivery);
        let domain = event.domain();
        let handlers: Vec<EventHandler> = lock(&self.handlers)
            .iter()
            .filter(|(d, _)| *d == domain)
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.handlers).len()
    }
}

pub struct SimProvisioning {
    log: CallLog,
    provisioned: AtomicBool,
}

impl SimProvisioning {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            provisioned: AtomicBool::new(false),
        }
    }

    /// Pretend credentials are (or are not) stored
    pub fn set_provisioned(&self, provisioned: bool) {
        self.provisioned.store(provisioned, Ordering::SeqCst);
    }

    /// Whether credentials are stored, without recording a call
    pub fn is_stored(&self) -> bool {
        self.provisioned.load(Ordering::SeqCst)
    }
}

impl ProvisioningSubsystem for SimProvisioning {
    type Error = SimError;

    fn init(&self, scheme: ProvisioningScheme) -> Result<(), SimError> {
        self.log.record(Call::ProvisioningInit(scheme));
        Ok(())
    }

    fn is_provisioned(&self) -> Result<bool, SimError> {
        self.log.record(Call::IsProvisioned);
        Ok(self.provisioned.load(Ordering::SeqCst))
    }

    fn start_session(&self, request: &SessionRequest) -> Result<(), SimError> {
        self.log.record(Call::StartSession(request.clone()));
        Ok(())
    }

    fn deinit(&self) {
        self.log.record(Call::ProvisioningDeinit);
    }

    fn reset_credentials(&self) -> Result<(), SimError> {
        self.log.record(Call::ResetCredentials);
        self.provisioned.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn reset_state_on_failure(&self) -> Result<(), SimError> {
        self.log.record(Call::ResetStateOnFailure);
        Ok(())
    }
}

pub struct SimDriver {
    log: CallLog,
    mac: MacAddress,
    fail_init: AtomicBool,
    fail_connect: AtomicBool,
}

impl SimDriver {
    pub fn new(log: CallLog, mac: MacAddress) -> Self {
        Self {
            log,
            mac,
            fail_init: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
        }
    }

    pub fn fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    /// Make `connect()` return an error (it is still recorded)
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }
}

impl WirelessDriver for SimDriver {
    type Error = SimError;

    fn init(&self) -> Result<(), SimError> {
        self.log.record(Call::DriverInit);
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(SimError::Injected("driver init"));
        }
        Ok(())
    }

    fn set_mode(&self, mode: WifiMode) -> Result<(), SimError> {
        self.log.record(Call::SetMode(mode));
        Ok(())
    }

    fn start(&self) -> Result<(), SimError> {
        self.log.record(Call::DriverStart);
        Ok(())
    }

    fn connect(&self) -> Result<(), SimError> {
        self.log.record(Call::DriverConnect);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(SimError::Injected("driver connect"));
        }
        Ok(())
    }

    fn station_mac(&self) -> Result<MacAddress, SimError> {
        self.log.record(Call::StationMac);
        Ok(self.mac)
    }
}

pub type SimSupervisor =
    ConnectionSupervisor<SimStore, SimNetworkStack, SimEventLoop, SimProvisioning, SimDriver>;

/// A complete simulated platform sharing one call log
pub struct SimWorld {
    pub log: CallLog,
    pub store: SimStore,
    pub network: SimNetworkStack,
    pub event_loop: SimEventLoop,
    pub events: EventInjector,
    pub provisioning: Arc<SimProvisioning>,
    pub driver: Arc<SimDriver>,
    pub signal: Arc<EventSignal>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::with_mac(MacAddress([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]))
    }

    pub fn with_mac(mac: MacAddress) -> Self {
        let log = CallLog::default();
        let event_loop = SimEventLoop::new(log.clone());
        Self {
            store: SimStore::new(log.clone()),
            network: SimNetworkStack::new(log.clone()),
            events: event_loop.injector(),
            event_loop,
            provisioning: Arc::new(SimProvisioning::new(log.clone())),
            driver: Arc::new(SimDriver::new(log.clone(), mac)),
            signal: Arc::new(EventSignal::new()),
            log,
        }
    }

    /// Supervisor over this world's collaborators and signal
    pub fn supervisor(&self, config: SupervisorConfig) -> SimSupervisor {
        ConnectionSupervisor::with_signal(
            self.store.clone(),
            self.network.clone(),
            self.event_loop.clone(),
            Arc::clone(&self.provisioning),
            Arc::clone(&self.driver),
            config,
            Arc::clone(&self.signal),
        )
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use wifiprov_proto::{DriverEvent, ProvisioningEvent};

    #[test]
    fn post_only_reaches_matching_domain() {
        let world = SimWorld::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        world
            .event_loop
            .register(
                EventDomain::DriverLink,
                Arc::new(move |e: &Event| lock(&sink).push(e.domain())),
            )
            .unwrap();

        world.events.post(&ProvisioningEvent::Started.into());
        world.events.post(&DriverEvent::StationStarted.into());

        assert_eq!(*lock(&seen), vec![EventDomain::DriverLink]);
    }

    #[test]
    fn wait_for_sees_later_calls() {
        let world = SimWorld::new();
        let driver = Arc::clone(&world.driver);

        thread::scope(|s| {
            s.spawn(move || {
                thread::sleep(Duration::from_millis(20));
                driver.start().unwrap();
            });
            assert!(world
                .log
                .wait_for(|c| *c == Call::DriverStart, Duration::from_secs(5)));
        });
        assert!(!world
            .log
            .wait_for(|c| *c == Call::StoreErase, Duration::from_millis(10)));
    }

    #[test]
    fn store_script_then_ready() {
        let world = SimWorld::new();
        world.store.script([Ok(StoreStatus::NeedsErase)]);
        assert_eq!(world.store.init().unwrap(), StoreStatus::NeedsErase);
        assert_eq!(world.store.init().unwrap(), StoreStatus::Ready);
    }
}
