//! Network attachment state machine
//!
//! ```text
//!            start()
//!   Idle ──────────────▶ Connecting ◀──────────────┐
//!                          │    │                  │ lost, retries < max
//!            address       │    │ lost,            │
//!            assigned      ▼    │ retries == max   │
//!                      Attached─┼──────────────────┘
//!                               ▼
//!                             Failed
//! ```
//!
//! The network collaborator delivers [`AttachEvent`]s through an
//! [`EventSink`] into a single queue. Exactly one owner, the
//! [`ConnectivityManager`], drains that queue and mutates the state, so
//! transitions are strictly ordered by event arrival. Other tasks observe
//! the state through a cloneable [`ConnectivityHandle`].

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{error, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::shutdown::Shutdown;

/// Longest SSID a station config accepts (802.11)
pub const MAX_SSID_LEN: usize = 32;
/// Longest WPA2 passphrase
pub const MAX_PASSWORD_LEN: usize = 64;

/// Queue poll interval of [`ConnectivityManager::run`], bounds shutdown latency
const EVENT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Idle,
    Connecting,
    Attached,
    Failed,
}

/// Events delivered by the network collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachEvent {
    /// Station interface is up; an attach attempt can begin
    Started,
    /// Association lost or an attempt failed
    Lost { reason: u16 },
    /// Association complete and an address was leased
    AddressAssigned(Ipv4Addr),
}

/// Station credentials (network name + secret)
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
        }
    }

    /// Empty SSID or over-long fields are rejected. An empty password is
    /// an open network.
    pub fn validate(&self) -> Result<()> {
        if self.ssid.is_empty() {
            return Err(Error::InvalidCredentials("SSID is empty"));
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(Error::InvalidCredentials("SSID longer than 32 bytes"));
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(Error::InvalidCredentials("password longer than 64 bytes"));
        }
        Ok(())
    }
}

// Keep the secret out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"****")
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectivityConfig {
    /// Re-attempts allowed after a lost/failed event before giving up
    pub max_retries: u32,
    /// Overall bound the bootstrap waits for attachment
    pub attach_timeout: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            attach_timeout: Duration::from_secs(30),
        }
    }
}

/// The radio side of attachment, implemented by the platform's WiFi stack
pub trait StationLink {
    type Error: fmt::Display;

    /// Apply station credentials
    fn configure(&mut self, credentials: &Credentials) -> core::result::Result<(), Self::Error>;

    /// Bring the station interface up; completion arrives as [`AttachEvent::Started`]
    fn start(&mut self) -> core::result::Result<(), Self::Error>;

    /// Begin one association attempt; the outcome arrives as an event
    fn attach(&mut self) -> core::result::Result<(), Self::Error>;
}

#[derive(Debug)]
struct StatusInner {
    state: ConnectivityState,
    address: Option<Ipv4Addr>,
    retries: u32,
}

#[derive(Debug)]
struct Status {
    inner: Mutex<StatusInner>,
    changed: Condvar,
}

/// Read-only view of the connectivity state, safe to share across tasks
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    status: Arc<Status>,
}

impl ConnectivityHandle {
    pub fn state(&self) -> ConnectivityState {
        self.status.inner.lock().state
    }

    pub fn is_attached(&self) -> bool {
        self.state() == ConnectivityState::Attached
    }

    /// Address assigned on the last successful attachment
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.status.inner.lock().address
    }

    /// Detached handle whose state a test drives directly
    #[cfg(test)]
    pub(crate) fn for_test(state: ConnectivityState, address: Option<Ipv4Addr>) -> Self {
        Self {
            status: Arc::new(Status {
                inner: Mutex::new(StatusInner {
                    state,
                    address,
                    retries: 0,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_for_test(&self, state: ConnectivityState, address: Option<Ipv4Addr>) {
        let mut inner = self.status.inner.lock();
        inner.state = state;
        inner.address = address;
        drop(inner);
        self.status.changed.notify_all();
    }

    /// Block until Attached or Failed is signalled, or `timeout` elapses.
    /// Wakes on state-change notifications, never polls.
    pub fn wait_until_attached(&self, timeout: Duration) -> Result<Ipv4Addr> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.status.inner.lock();

        loop {
            match inner.state {
                ConnectivityState::Attached => {
                    if let Some(ip) = inner.address {
                        return Ok(ip);
                    }
                }
                ConnectivityState::Failed => return Err(Error::AttachFailed(inner.retries)),
                _ => {}
            }

            if self
                .status
                .changed
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return match inner.state {
                    ConnectivityState::Attached => {
                        inner.address.ok_or(Error::Timeout(timeout))
                    }
                    ConnectivityState::Failed => Err(Error::AttachFailed(inner.retries)),
                    _ => Err(Error::Timeout(timeout)),
                };
            }
        }
    }
}

/// Inbound side of the event queue, handed to the network collaborator
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<AttachEvent>,
}

impl EventSink {
    /// Queue an event. Returns `false` if the manager is gone.
    pub fn post(&self, event: AttachEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Single owner of the connectivity state
pub struct ConnectivityManager<L> {
    link: L,
    config: ConnectivityConfig,
    retries: u32,
    events: Receiver<AttachEvent>,
    status: Arc<Status>,
}

impl<L: StationLink> ConnectivityManager<L> {
    pub fn new(link: L, config: ConnectivityConfig) -> (Self, EventSink) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let manager = Self {
            link,
            config,
            retries: 0,
            events: rx,
            status: Arc::new(Status {
                inner: Mutex::new(StatusInner {
                    state: ConnectivityState::Idle,
                    address: None,
                    retries: 0,
                }),
                changed: Condvar::new(),
            }),
        };
        (manager, EventSink { tx })
    }

    pub fn handle(&self) -> ConnectivityHandle {
        ConnectivityHandle {
            status: self.status.clone(),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.status.inner.lock().state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn config(&self) -> &ConnectivityConfig {
        &self.config
    }

    /// Validate credentials, configure the link and bring it up.
    /// Idle → Connecting. The attach attempt itself follows the Started event.
    pub fn start(&mut self, credentials: &Credentials) -> Result<()> {
        credentials.validate()?;

        let state = self.state();
        if state != ConnectivityState::Idle {
            warn!("WiFi start ignored in state {:?}", state);
            return Ok(());
        }

        info!("Setting WiFi configuration (SSID: {})", credentials.ssid);
        self.link
            .configure(credentials)
            .map_err(|e| Error::Link(e.to_string()))?;

        self.retries = 0;
        self.set_state(ConnectivityState::Connecting, None);

        info!("Starting WiFi station");
        if let Err(e) = self.link.start() {
            error!("WiFi start failed: {}", e);
            self.set_state(ConnectivityState::Failed, None);
            return Err(Error::Link(e.to_string()));
        }
        Ok(())
    }

    /// Apply one event to the state machine
    pub fn handle_event(&mut self, event: AttachEvent) {
        let state = self.state();
        if matches!(state, ConnectivityState::Idle | ConnectivityState::Failed) {
            warn!("Ignoring {:?} in state {:?}", event, state);
            return;
        }

        match event {
            AttachEvent::Started => {
                info!("WiFi started, connecting to AP...");
                if let Err(e) = self.link.attach() {
                    warn!("Attach attempt could not be issued: {}", e);
                    self.retry_or_fail();
                }
            }
            AttachEvent::Lost { reason } => {
                warn!("WiFi disconnected (reason={})", reason);
                self.retry_or_fail();
            }
            AttachEvent::AddressAssigned(ip) => {
                self.retries = 0;
                self.set_state(ConnectivityState::Attached, Some(ip));
                info!("WiFi connected! IP: {}", ip);
            }
        }
    }

    /// Drain queued events without blocking; returns how many were handled
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Process events as they arrive until shutdown is requested
    pub fn run(&mut self, shutdown: &Shutdown) {
        while !shutdown.is_requested() {
            match self.events.recv_timeout(EVENT_POLL) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn retry_or_fail(&mut self) {
        loop {
            if self.retries >= self.config.max_retries {
                error!("WiFi failed after {} attempts", self.config.max_retries);
                self.set_state(ConnectivityState::Failed, None);
                return;
            }

            self.retries += 1;
            info!(
                "Retry connection to AP... ({}/{})",
                self.retries, self.config.max_retries
            );
            self.set_state(ConnectivityState::Connecting, None);

            match self.link.attach() {
                Ok(()) => return,
                // A rejected attempt counts against the budget
                Err(e) => warn!("Attach attempt could not be issued: {}", e),
            }
        }
    }

    fn set_state(&self, state: ConnectivityState, address: Option<Ipv4Addr>) {
        let mut inner = self.status.inner.lock();
        inner.state = state;
        inner.address = address;
        inner.retries = self.retries;
        drop(inner);
        self.status.changed.notify_all();
    }
}
