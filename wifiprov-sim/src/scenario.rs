//! Scripted runs of the provisioning lifecycle
//!
//! The "operator" plays the platform: it waits for the supervisor to reach the
//! platform (a started session, a started driver) and then posts the events
//! the real device would see.

use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::ValueEnum;
use log::info;
use wifiprov_mcu::sim::{Call, SimSupervisor, SimWorld};
use wifiprov_mcu::{ConnectError, ConnectionState, SupervisorConfig};
use wifiprov_proto::{
    AddressEvent, Credentials, DriverEvent, Event, FailureReason, MacAddress, ProvisioningEvent,
};

/// How long the operator waits for the supervisor to reach the platform
const STEP_TIMEOUT: Duration = Duration::from_secs(5);
/// `connect()` bound when the config has none
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Scenario A only shows that `connect()` blocks
const BLOCKED_WINDOW: Duration = Duration::from_millis(200);

const HOME: &str = "home";
const ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Unprovisioned device starts a session and blocks
    A,
    /// Session delivers credentials, station gets 10.0.0.5
    B,
    /// Wrong password first, then the right one in the same session
    C,
    /// Provisioned device connects directly and survives a disconnect
    D,
    /// init, connect, pause, reset_provisioning, connect
    Bootstrap,
}

pub struct Report {
    pub mac: MacAddress,
    pub state: ConnectionState,
    pub retries: u32,
    pub address: Option<Ipv4Addr>,
    /// Credentials stored when the run ended
    pub provisioned: bool,
    pub calls: Vec<Call>,
}

pub struct Run {
    world: SimWorld,
    supervisor: SimSupervisor,
    mac: MacAddress,
    connect_timeout: Duration,
}

impl Run {
    pub fn new(mac: MacAddress, config: SupervisorConfig) -> anyhow::Result<Self> {
        let world = SimWorld::with_mac(mac);
        let connect_timeout = config.connect_timeout().unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let mut supervisor = world.supervisor(config);
        supervisor.init().context("init failed")?;
        Ok(Self {
            world,
            supervisor,
            mac,
            connect_timeout,
        })
    }

    pub fn play(self, scenario: Scenario, pause: Duration) -> anyhow::Result<Report> {
        match scenario {
            Scenario::A => self.blocked_without_operator()?,
            Scenario::B => self.connect_with(|world| provision(world, 1, &["secret"]))?,
            Scenario::C => self.connect_with(|world| provision(world, 1, &["wrong", "secret"]))?,
            Scenario::D => {
                self.world.provisioning.set_provisioned(true);
                self.connect_with(flaky_link)?;
            }
            Scenario::Bootstrap => {
                self.connect_with(|world| provision(world, 1, &["secret"]))?;
                info!("Connected, resetting provisioning in {pause:?}");
                thread::sleep(pause);
                self.supervisor.reset_provisioning()?;
                if self.world.provisioning.is_stored() {
                    bail!("credentials survived reset_provisioning()");
                }
                self.connect_with(|world| provision(world, 2, &["secret"]))?;
            }
        }
        Ok(self.report())
    }

    fn blocked_without_operator(&self) -> anyhow::Result<()> {
        match self.supervisor.connect_timeout(BLOCKED_WINDOW) {
            Err(ConnectError::Timeout(_)) => {
                info!("connect() is still blocked, the session waits for an operator");
                Ok(())
            }
            Ok(()) => bail!("connect() returned without an operator"),
            Err(e) => Err(e.into()),
        }
    }

    /// Run `connect()` on its own thread while `operator` drives the platform
    fn connect_with(
        &self,
        operator: impl FnOnce(&SimWorld) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        thread::scope(|s| {
            let caller = s.spawn(|| self.supervisor.connect_timeout(self.connect_timeout));
            let operated = operator(&self.world);
            let connected = caller
                .join()
                .map_err(|_| anyhow!("connect thread panicked"))?;
            operated?;
            connected?;
            Ok(())
        })
    }

    fn report(&self) -> Report {
        Report {
            mac: self.mac,
            state: self.supervisor.state(),
            retries: self.supervisor.retry_count(),
            address: self.supervisor.address(),
            provisioned: self.world.provisioning.is_stored(),
            calls: self.world.log.calls(),
        }
    }
}

fn await_call(
    world: &SimWorld,
    what: &str,
    n: usize,
    pred: impl Fn(&Call) -> bool,
) -> anyhow::Result<()> {
    if !world.log.wait_for_nth(pred, n, STEP_TIMEOUT) {
        bail!("{what} never happened");
    }
    Ok(())
}

fn post(world: &SimWorld, event: impl Into<Event>) {
    let event = event.into();
    info!("Operator posts {event:?}");
    world.events.post(&event);
}

/// Play the `n`th provisioning session, trying each password in turn. The
/// last one is accepted.
fn provision(world: &SimWorld, n: usize, passwords: &[&str]) -> anyhow::Result<()> {
    await_call(world, "provisioning session", n, |c| {
        matches!(c, Call::StartSession(_))
    })?;

    post(world, ProvisioningEvent::Started);
    for (i, password) in passwords.iter().enumerate() {
        post(
            world,
            ProvisioningEvent::CredentialsReceived(Credentials::new(HOME, *password)),
        );
        if i + 1 < passwords.len() {
            post(
                world,
                ProvisioningEvent::CredentialFailure(FailureReason::AuthError),
            );
        }
    }
    // The manager stores the accepted credentials before reporting success
    world.provisioning.set_provisioned(true);
    post(world, ProvisioningEvent::CredentialSuccess);
    post(world, ProvisioningEvent::Ended);

    post(world, DriverEvent::StationStarted);
    post(world, AddressEvent::Assigned(ADDRESS));
    Ok(())
}

fn flaky_link(world: &SimWorld) -> anyhow::Result<()> {
    await_call(world, "driver start", 1, |c| *c == Call::DriverStart)?;
    post(world, DriverEvent::StationStarted);
    post(world, DriverEvent::StationDisconnected);
    post(world, DriverEvent::StationStarted);
    post(world, AddressEvent::Assigned(ADDRESS));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    fn play(scenario: Scenario) -> Report {
        Run::new(MAC, SupervisorConfig::default())
            .unwrap()
            .play(scenario, Duration::ZERO)
            .unwrap()
    }

    #[test]
    fn scenario_a_blocks_in_session() {
        let report = play(Scenario::A);
        assert_eq!(report.state, ConnectionState::Provisioning);
        assert_eq!(report.address, None);
        assert!(report.calls.iter().any(|c| matches!(
            c,
            Call::StartSession(request) if request.service_name.as_str() == "PROV_DDEEFF"
        )));
    }

    #[test]
    fn scenario_b_connects() {
        let report = play(Scenario::B);
        assert_eq!(report.state, ConnectionState::Connected(ADDRESS));
        assert_eq!(report.retries, 0);
        assert!(report.provisioned);
    }

    #[test]
    fn scenario_c_resets_session_once() {
        let report = play(Scenario::C);
        assert_eq!(report.address, Some(ADDRESS));
        assert_eq!(
            report
                .calls
                .iter()
                .filter(|c| **c == Call::ResetStateOnFailure)
                .count(),
            1
        );
    }

    #[test]
    fn scenario_d_reconnects() {
        let report = play(Scenario::D);
        assert_eq!(report.state, ConnectionState::Connected(ADDRESS));
        assert_eq!(
            report
                .calls
                .iter()
                .filter(|c| **c == Call::DriverConnect)
                .count(),
            3
        );
    }

    #[test]
    fn bootstrap_provisions_twice() {
        let report = play(Scenario::Bootstrap);
        assert_eq!(report.state, ConnectionState::Connected(ADDRESS));
        assert_eq!(
            report
                .calls
                .iter()
                .filter(|c| matches!(c, Call::StartSession(_)))
                .count(),
            2
        );
        assert!(report.calls.contains(&Call::ResetCredentials));
        assert!(report.provisioned);
    }
}
