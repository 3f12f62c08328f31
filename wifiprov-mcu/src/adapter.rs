//! Driver and IP event handling
//!
//! Every station start and every disconnect turns into exactly one
//! `connect()` request on the driver. There is no retry limit; the
//! [`ReconnectPolicy`] only controls the pause before a reconnect.

use std::net::Ipv4Addr;
use std::sync::Arc;

use log::{error, info};
use wifiprov_proto::MacAddress;

use crate::policy::ReconnectPolicy;
use crate::signal::{EventSignal, SignalBits};
use crate::wifi::WirelessDriver;

/// Station link as seen from driver and IP events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Idle,
    Connecting,
    Connected(Ipv4Addr),
}

pub struct ConnectionDriverAdapter<D> {
    driver: Arc<D>,
    signal: Arc<EventSignal>,
    policy: Box<dyn ReconnectPolicy>,
    link: LinkState,
}

impl<D: WirelessDriver> ConnectionDriverAdapter<D> {
    pub fn new(driver: Arc<D>, signal: Arc<EventSignal>, policy: Box<dyn ReconnectPolicy>) -> Self {
        Self {
            driver,
            signal,
            policy,
            link: LinkState::Idle,
        }
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    /// Forget the previous connection before a new `connect()`
    pub fn reset_link(&mut self) {
        self.link = LinkState::Idle;
    }

    /// Provisioning handed over to the station; it is connecting unless it
    /// already got an address during the session
    pub fn expect_station(&mut self) {
        if self.link == LinkState::Idle {
            self.link = LinkState::Connecting;
        }
    }

    pub fn on_station_started(&mut self) {
        self.link = LinkState::Connecting;
        self.request_connection();
    }

    pub fn on_station_disconnected(&mut self) {
        info!("Disconnected. Connecting to the AP again...");
        self.link = LinkState::Connecting;
        if let Some(delay) = self.policy.next_delay() {
            info!("Waiting {delay:?} before reconnecting");
            std::thread::sleep(delay);
        }
        self.request_connection();
    }

    pub fn on_peer_joined(&mut self, mac: &MacAddress) {
        info!("SoftAP transport: {mac} connected");
    }

    pub fn on_peer_left(&mut self, mac: &MacAddress) {
        info!("SoftAP transport: {mac} disconnected");
    }

    pub fn on_address_assigned(&mut self, address: Ipv4Addr) {
        info!("Connected with IP address {address}");
        self.link = LinkState::Connected(address);
        self.policy.reset();
        self.signal.set(SignalBits::CONNECTED);
    }

    fn request_connection(&mut self) {
        if let Err(e) = self.driver.connect() {
            error!("Wi-Fi connect request failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::config::SupervisorConfig;
    use crate::policy::Immediate;
    use crate::sim::{Call, SimDriver, SimWorld};

    /// Passes delays through from the configured policy and keeps them
    struct Recorded {
        inner: Box<dyn ReconnectPolicy>,
        delays: Arc<Mutex<Vec<Option<Duration>>>>,
    }

    impl ReconnectPolicy for Recorded {
        fn next_delay(&mut self) -> Option<Duration> {
            let delay = self.inner.next_delay();
            self.delays.lock().unwrap().push(delay);
            delay
        }

        fn reset(&mut self) {
            self.inner.reset();
        }
    }

    fn adapter(world: &SimWorld) -> ConnectionDriverAdapter<SimDriver> {
        ConnectionDriverAdapter::new(
            Arc::clone(&world.driver),
            Arc::clone(&world.signal),
            Box::new(Immediate),
        )
    }

    #[test]
    fn one_reconnect_per_disconnect() {
        let world = SimWorld::new();
        let mut adapter = adapter(&world);

        adapter.on_station_started();
        assert_eq!(world.log.count(|c| *c == Call::DriverConnect), 1);

        for n in 1..=50 {
            adapter.on_station_disconnected();
            assert_eq!(world.log.count(|c| *c == Call::DriverConnect), 1 + n);
            assert_eq!(adapter.link(), LinkState::Connecting);
        }
    }

    #[test]
    fn configured_backoff_paces_reconnects() {
        let world = SimWorld::new();
        let config = SupervisorConfig::from_json(
            r#"{ "reconnect": { "strategy": "backoff", "initial_ms": 1, "max_ms": 4 } }"#,
        )
        .unwrap();
        let delays = Arc::new(Mutex::new(Vec::new()));
        let policy = Recorded {
            inner: config.reconnect.build(),
            delays: Arc::clone(&delays),
        };
        let mut adapter = ConnectionDriverAdapter::new(
            Arc::clone(&world.driver),
            Arc::clone(&world.signal),
            Box::new(policy),
        );
        let ms = |n| Some(Duration::from_millis(n));

        adapter.on_station_started();
        for _ in 0..4 {
            adapter.on_station_disconnected();
        }
        assert_eq!(*delays.lock().unwrap(), vec![ms(1), ms(2), ms(4), ms(4)]);

        // An address restarts the sequence
        adapter.on_address_assigned(Ipv4Addr::new(10, 0, 0, 5));
        adapter.on_station_disconnected();
        assert_eq!(delays.lock().unwrap().last(), Some(&ms(1)));
        assert_eq!(world.log.count(|c| *c == Call::DriverConnect), 6);
        assert_eq!(adapter.link(), LinkState::Connecting);
    }

    #[test]
    fn reconnects_even_when_driver_refuses() {
        let world = SimWorld::new();
        world.driver.fail_connect(true);
        let mut adapter = adapter(&world);

        adapter.on_station_started();
        adapter.on_station_disconnected();
        adapter.on_station_disconnected();
        assert_eq!(world.log.count(|c| *c == Call::DriverConnect), 3);
        assert!(world.signal.peek().is_empty());
    }

    #[test]
    fn address_sets_connected_bit() {
        let world = SimWorld::new();
        let mut adapter = adapter(&world);
        let address = Ipv4Addr::new(10, 0, 0, 5);

        adapter.on_station_started();
        assert!(world.signal.peek().is_empty());

        adapter.on_address_assigned(address);
        assert_eq!(adapter.link(), LinkState::Connected(address));
        assert!(world.signal.peek().contains(SignalBits::CONNECTED));
    }

    #[test]
    fn peers_do_not_change_link() {
        let world = SimWorld::new();
        let mut adapter = adapter(&world);
        let peer = MacAddress([0x02, 0, 0, 0, 0, 1]);

        adapter.on_peer_joined(&peer);
        adapter.on_peer_left(&peer);
        assert_eq!(adapter.link(), LinkState::Idle);
        assert_eq!(world.log.count(|c| *c == Call::DriverConnect), 0);
    }

    #[test]
    fn expect_station_keeps_existing_address() {
        let world = SimWorld::new();
        let mut adapter = adapter(&world);
        let address = Ipv4Addr::new(192, 168, 4, 2);

        adapter.expect_station();
        assert_eq!(adapter.link(), LinkState::Connecting);

        adapter.on_address_assigned(address);
        adapter.expect_station();
        assert_eq!(adapter.link(), LinkState::Connected(address));
    }
}
