//! Event dispatcher - routes each event to the controller or the adapter
//!
//! The same handler is registered for all three domains. The platform calls
//! it from one dispatch context at a time; the mutexes below are never
//! contended in that setup and only exist so the handler is `Sync`.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use wifiprov_proto::{AddressEvent, DriverEvent, Event, ProvisioningEvent};

use crate::adapter::{ConnectionDriverAdapter, LinkState};
use crate::controller::{ControllerPhase, ProvisioningController};
use crate::event_loop::EventHandler;
use crate::provisioning::ProvisioningSubsystem;
use crate::wifi::WirelessDriver;

pub struct EventDispatcher<P, D> {
    controller: Mutex<ProvisioningController<P>>,
    adapter: Mutex<ConnectionDriverAdapter<D>>,
}

impl<P: ProvisioningSubsystem, D: WirelessDriver> EventDispatcher<P, D> {
    pub fn new(controller: ProvisioningController<P>, adapter: ConnectionDriverAdapter<D>) -> Self {
        Self {
            controller: Mutex::new(controller),
            adapter: Mutex::new(adapter),
        }
    }

    pub fn dispatch(&self, event: &Event) {
        match event {
            Event::Provisioning(event) => self.dispatch_provisioning(event),
            Event::Driver(event) => self.dispatch_driver(event),
            Event::Address(event) => self.dispatch_address(event),
        }
    }

    fn dispatch_provisioning(&self, event: &ProvisioningEvent) {
        match event {
            ProvisioningEvent::Started => self.controller().on_start(),
            ProvisioningEvent::CredentialsReceived(credentials) => {
                self.controller().on_credentials_received(credentials)
            }
            ProvisioningEvent::CredentialFailure(reason) => {
                self.controller().on_credential_failure(*reason)
            }
            ProvisioningEvent::CredentialSuccess => self.controller().on_credential_success(),
            ProvisioningEvent::Ended => {
                self.controller().on_end();
                self.adapter().expect_station();
            }
            ProvisioningEvent::Other(id) => debug!("Ignoring provisioning event {id}"),
        }
    }

    fn dispatch_driver(&self, event: &DriverEvent) {
        match event {
            DriverEvent::StationStarted => self.adapter().on_station_started(),
            DriverEvent::StationDisconnected => self.adapter().on_station_disconnected(),
            DriverEvent::PeerJoined(mac) => self.adapter().on_peer_joined(mac),
            DriverEvent::PeerLeft(mac) => self.adapter().on_peer_left(mac),
            DriverEvent::Other(id) => debug!("Ignoring driver event {id}"),
        }
    }

    fn dispatch_address(&self, event: &AddressEvent) {
        match event {
            AddressEvent::Assigned(address) => self.adapter().on_address_assigned(*address),
            AddressEvent::Other(id) => debug!("Ignoring IP event {id}"),
        }
    }

    /// Handler to register with the event loop
    pub fn handler(self: &Arc<Self>) -> EventHandler
    where
        P: Send + Sync + 'static,
        D: Send + Sync + 'static,
    {
        let dispatcher = Arc::clone(self);
        Arc::new(move |event: &Event| dispatcher.dispatch(event))
    }

    pub fn controller(&self) -> MutexGuard<'_, ProvisioningController<P>> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn adapter(&self) -> MutexGuard<'_, ConnectionDriverAdapter<D>> {
        self.adapter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> ControllerPhase {
        self.controller().phase()
    }

    pub fn retries(&self) -> u32 {
        self.controller().retries()
    }

    pub fn link(&self) -> LinkState {
        self.adapter().link()
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        match self.link() {
            LinkState::Connected(address) => Some(address),
            LinkState::Idle | LinkState::Connecting => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Immediate;
    use crate::provisioning::ProvisioningScheme;
    use crate::sim::{Call, SimDriver, SimProvisioning, SimWorld};
    use crate::signal::SignalBits;
    use wifiprov_proto::{Credentials, FailureReason, MacAddress};

    fn dispatcher(world: &SimWorld) -> Arc<EventDispatcher<SimProvisioning, SimDriver>> {
        let mut controller = ProvisioningController::new(Arc::clone(&world.provisioning));
        controller.ensure_manager(ProvisioningScheme::SoftAp).unwrap();
        let adapter = ConnectionDriverAdapter::new(
            Arc::clone(&world.driver),
            Arc::clone(&world.signal),
            Box::new(Immediate),
        );
        Arc::new(EventDispatcher::new(controller, adapter))
    }

    #[test]
    fn routes_by_domain() {
        let world = SimWorld::new();
        let dispatcher = dispatcher(&world);
        let handler = dispatcher.handler();

        handler(&Event::from(ProvisioningEvent::Started));
        assert_eq!(dispatcher.phase(), ControllerPhase::Active);

        handler(&Event::from(ProvisioningEvent::CredentialFailure(FailureReason::AuthError)));
        assert_eq!(dispatcher.retries(), 1);
        assert_eq!(world.log.count(|c| *c == Call::ResetStateOnFailure), 1);

        handler(&Event::from(DriverEvent::StationStarted));
        assert_eq!(dispatcher.link(), LinkState::Connecting);
        assert_eq!(world.log.count(|c| *c == Call::DriverConnect), 1);

        handler(&Event::from(AddressEvent::Assigned(Ipv4Addr::new(10, 0, 0, 5))));
        assert_eq!(dispatcher.address(), Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(world.signal.peek().contains(SignalBits::CONNECTED));
    }

    #[test]
    fn unknown_events_are_ignored() {
        let world = SimWorld::new();
        let dispatcher = dispatcher(&world);
        let before = world.log.calls();

        dispatcher.dispatch(&ProvisioningEvent::Other(42).into());
        dispatcher.dispatch(&DriverEvent::Other(7).into());
        dispatcher.dispatch(&AddressEvent::Other(3).into());

        assert_eq!(world.log.calls(), before);
        assert_eq!(dispatcher.phase(), ControllerPhase::Idle);
        assert_eq!(dispatcher.link(), LinkState::Idle);
        assert!(world.signal.peek().is_empty());
    }

    #[test]
    fn provisioning_end_hands_over_to_station() {
        let world = SimWorld::new();
        let dispatcher = dispatcher(&world);

        for event in [
            ProvisioningEvent::Started,
            ProvisioningEvent::CredentialsReceived(Credentials::new("home", "secret")),
            ProvisioningEvent::CredentialSuccess,
            ProvisioningEvent::Ended,
        ] {
            dispatcher.dispatch(&event.into());
        }

        assert_eq!(dispatcher.phase(), ControllerPhase::Idle);
        assert_eq!(dispatcher.link(), LinkState::Connecting);
        assert_eq!(world.log.count(|c| *c == Call::ProvisioningDeinit), 1);
        assert!(world.signal.peek().is_empty());
    }

    #[test]
    fn peer_events_only_log() {
        let world = SimWorld::new();
        let dispatcher = dispatcher(&world);
        let before = world.log.calls();
        let peer = MacAddress([0x02, 0, 0, 0, 0, 9]);

        dispatcher.dispatch(&DriverEvent::PeerJoined(peer).into());
        dispatcher.dispatch(&DriverEvent::PeerLeft(peer).into());

        assert_eq!(world.log.calls(), before);
        assert_eq!(dispatcher.link(), LinkState::Idle);
    }
}
