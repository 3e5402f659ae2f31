//! Streaming session: pushes the latest sample to a remote endpoint
//!
//! Reconnection is owned by the transport (its own reconnect interval and
//! keepalive). The session only mirrors the transport's connected flag into
//! [`SessionState`] and refuses to send unless both the network link and the
//! transport are up.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::connectivity::ConnectivityHandle;
use crate::error::{Error, Result};
use crate::shutdown::Shutdown;
use crate::store::LatestSampleStore;
use crate::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Only entered through [`StreamingSession::close`]
    Closing,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote endpoint URI
    pub endpoint: String,
    /// Transport auto-reconnect interval
    pub reconnect_interval: Duration,
    /// Connect/read timeout of the transport
    pub network_timeout: Duration,
    /// Keepalive ping interval
    pub ping_interval: Duration,
    /// No pong within this forces a transport reconnect
    pub pong_timeout: Duration,
    pub send_timeout: Duration,
    /// How long `run` waits for the first connection before streaming
    pub initial_connect_wait: Duration,
    pub connect_poll: Duration,
    /// Cadence of sends while connected
    pub send_interval: Duration,
    /// Recheck delay while the transport is down
    pub disconnected_backoff: Duration,
    /// Recheck delay while the network link is down
    pub link_down_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://192.168.137.194:8080/".to_string(),
            reconnect_interval: Duration::from_secs(5),
            network_timeout: Duration::from_secs(8),
            ping_interval: Duration::from_secs(15),
            pong_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(1),
            initial_connect_wait: Duration::from_secs(5),
            connect_poll: Duration::from_millis(100),
            send_interval: Duration::from_millis(100),
            disconnected_backoff: Duration::from_millis(200),
            link_down_backoff: Duration::from_millis(500),
        }
    }
}

/// Message-oriented transport with its own keepalive and auto-reconnect
pub trait SessionTransport {
    type Error: fmt::Display;

    /// Start the transport towards `config.endpoint`. Connection completes
    /// asynchronously; observe it with [`SessionTransport::is_connected`].
    fn open(&mut self, config: &SessionConfig) -> core::result::Result<(), Self::Error>;

    fn is_connected(&self) -> bool;

    /// Send one text frame, giving up after `timeout`. A transport whose
    /// send timeout is fixed at creation applies `config.send_timeout` in
    /// [`SessionTransport::open`] and may ignore this argument.
    fn send_text(&mut self, text: &str, timeout: Duration) -> core::result::Result<(), Self::Error>;

    fn close(&mut self) -> core::result::Result<(), Self::Error>;
}

/// What a single streaming step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Network link not attached, nothing attempted
    LinkDown,
    /// Transport not connected, nothing attempted
    NotConnected,
    /// Connected but the store had no sample
    NoSample,
    Sent,
    SendFailed,
    /// Serialized message did not fit the wire buffer
    Oversized,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub sent: u32,
    pub send_failures: u32,
    pub oversized: u32,
}

pub struct StreamingSession<T> {
    transport: T,
    config: SessionConfig,
    store: Arc<LatestSampleStore>,
    link: ConnectivityHandle,
    state: SessionState,
    opened: bool,
    stats: SessionStats,
}

impl<T: SessionTransport> StreamingSession<T> {
    pub fn new(
        transport: T,
        config: SessionConfig,
        store: Arc<LatestSampleStore>,
        link: ConnectivityHandle,
    ) -> Self {
        Self {
            transport,
            config,
            store,
            link,
            state: SessionState::Disconnected,
            opened: false,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start the transport. Disconnected → Connecting.
    pub fn open(&mut self) -> Result<()> {
        if self.opened {
            return Ok(());
        }

        info!("Connecting to WebSocket server at {}", self.config.endpoint);
        self.transport
            .open(&self.config)
            .map_err(|e| Error::Link(e.to_string()))?;
        self.opened = true;
        self.state = SessionState::Connecting;
        Ok(())
    }

    /// Mirror link and transport status into the session state
    pub fn sync_state(&mut self) -> SessionState {
        if !self.opened || self.state == SessionState::Closing {
            return self.state;
        }

        let connected = self.link.is_attached() && self.transport.is_connected();
        let next = match (self.state, connected) {
            (_, true) => SessionState::Connected,
            (SessionState::Connected, false) => SessionState::Disconnected,
            // Transport is reconnecting on its own
            (SessionState::Disconnected, false) => SessionState::Connecting,
            (state, false) => state,
        };

        if next != self.state {
            match next {
                SessionState::Connected => info!("WebSocket connected"),
                SessionState::Disconnected => warn!("WebSocket disconnected"),
                _ => debug!("WebSocket {:?} -> {:?}", self.state, next),
            }
            self.state = next;
        }
        self.state
    }

    /// One streaming cycle: send the latest sample if fully connected
    pub fn step(&mut self) -> StepOutcome {
        if !self.link.is_attached() {
            self.sync_state();
            return StepOutcome::LinkDown;
        }
        if self.sync_state() != SessionState::Connected {
            return StepOutcome::NotConnected;
        }

        let Some(sample) = self.store.read() else {
            return StepOutcome::NoSample;
        };

        let msg = match wire::format_sample(&sample) {
            Ok(msg) => msg,
            Err(e) => {
                self.stats.oversized = self.stats.oversized.wrapping_add(1);
                error!("Skipping send: {}", e);
                return StepOutcome::Oversized;
            }
        };

        match self.transport.send_text(&msg, self.config.send_timeout) {
            Ok(()) => {
                self.stats.sent = self.stats.sent.wrapping_add(1);
                StepOutcome::Sent
            }
            Err(e) => {
                self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
                error!("{}", Error::SendFailure(e.to_string()));
                StepOutcome::SendFailed
            }
        }
    }

    /// Poll for the first connection, bounded by `initial_connect_wait`
    pub fn wait_for_connection(&mut self, shutdown: &Shutdown) -> bool {
        let deadline = Instant::now() + self.config.initial_connect_wait;

        while self.sync_state() != SessionState::Connected {
            if Instant::now() >= deadline || !shutdown.sleep(self.config.connect_poll) {
                return false;
            }
        }
        true
    }

    /// Wait for the network link, open, wait for the first connection, then
    /// stream until shutdown. An open failure is retried every
    /// `reconnect_interval`.
    pub fn run(&mut self, shutdown: &Shutdown) {
        // No session activity while the network layer is down
        while !self.link.is_attached() {
            if !shutdown.sleep(self.config.link_down_backoff) {
                return;
            }
        }

        while let Err(e) = self.open() {
            error!("Failed to start WebSocket client: {}", e);
            if !shutdown.sleep(self.config.reconnect_interval) {
                return;
            }
        }

        if !self.wait_for_connection(shutdown) {
            warn!("WebSocket not connected yet, streaming will start on reconnect");
        }

        info!(
            "Streaming started ({} ms interval)",
            self.config.send_interval.as_millis()
        );

        while !shutdown.is_requested() {
            let delay = match self.step() {
                StepOutcome::LinkDown => self.config.link_down_backoff,
                StepOutcome::NotConnected => self.config.disconnected_backoff,
                _ => self.config.send_interval,
            };
            if !shutdown.sleep(delay) {
                break;
            }
        }

        self.close();
        info!(
            "Streaming stopped ({} sent, {} failed, {} oversized)",
            self.stats.sent, self.stats.send_failures, self.stats.oversized
        );
    }

    /// Tear down the transport. Passes through Closing, ends Disconnected.
    pub fn close(&mut self) {
        if !self.opened {
            return;
        }

        self.state = SessionState::Closing;
        if let Err(e) = self.transport.close() {
            warn!("WebSocket close failed: {}", e);
        }
        self.opened = false;
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::thread;

    use parking_lot::Mutex;

    use super::*;
    use crate::connectivity::ConnectivityState;
    use crate::sensors::Sample;

    #[derive(Debug, Default)]
    struct TransportLog {
        connected: bool,
        endpoint: Option<String>,
        opens: u32,
        closes: u32,
        fail_open: u32,
        fail_sends: u32,
        sent: Vec<(String, Duration)>,
    }

    #[derive(Debug, Clone, Default)]
    struct MockTransport {
        log: Arc<Mutex<TransportLog>>,
    }

    impl MockTransport {
        fn set_connected(&self, connected: bool) {
            self.log.lock().connected = connected;
        }

        fn sent(&self) -> Vec<String> {
            self.log.lock().sent.iter().map(|(m, _)| m.clone()).collect()
        }
    }

    impl SessionTransport for MockTransport {
        type Error = &'static str;

        fn open(&mut self, config: &SessionConfig) -> core::result::Result<(), Self::Error> {
            let mut log = self.log.lock();
            if log.fail_open > 0 {
                log.fail_open -= 1;
                return Err("client init failed");
            }
            log.opens += 1;
            log.endpoint = Some(config.endpoint.clone());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.log.lock().connected
        }

        fn send_text(&mut self, text: &str, timeout: Duration) -> core::result::Result<(), Self::Error> {
            let mut log = self.log.lock();
            if log.fail_sends > 0 {
                log.fail_sends -= 1;
                return Err("send timed out");
            }
            log.sent.push((text.to_string(), timeout));
            Ok(())
        }

        fn close(&mut self) -> core::result::Result<(), Self::Error> {
            let mut log = self.log.lock();
            log.closes += 1;
            log.connected = false;
            Ok(())
        }
    }

    const IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 7);

    fn sample() -> Sample {
        Sample {
            ax: 1.234,
            ay: -0.001,
            az: 9.807,
            gx: 0.1,
            gy: 0.0,
            gz: -0.5,
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            endpoint: "ws://127.0.0.1:9000/".to_string(),
            reconnect_interval: Duration::from_millis(5),
            initial_connect_wait: Duration::from_millis(30),
            connect_poll: Duration::from_millis(2),
            send_interval: Duration::from_millis(2),
            disconnected_backoff: Duration::from_millis(2),
            link_down_backoff: Duration::from_millis(2),
            ..Default::default()
        }
    }

    fn attached_session() -> (
        StreamingSession<MockTransport>,
        MockTransport,
        Arc<LatestSampleStore>,
        ConnectivityHandle,
    ) {
        let transport = MockTransport::default();
        let store = Arc::new(LatestSampleStore::new());
        let link = ConnectivityHandle::for_test(ConnectivityState::Attached, Some(IP));
        let mut session =
            StreamingSession::new(transport.clone(), fast_config(), store.clone(), link.clone());
        session.open().unwrap();
        (session, transport, store, link)
    }

    #[test]
    fn test_default_timings() {
        let c = SessionConfig::default();
        assert_eq!(c.reconnect_interval, Duration::from_secs(5));
        assert_eq!(c.network_timeout, Duration::from_secs(8));
        assert_eq!(c.ping_interval, Duration::from_secs(15));
        assert_eq!(c.pong_timeout, Duration::from_secs(10));
        assert_eq!(c.send_timeout, Duration::from_secs(1));
        assert_eq!(c.send_interval, Duration::from_millis(100));
        assert_eq!(c.disconnected_backoff, Duration::from_millis(200));
    }

    #[test]
    fn test_open_moves_to_connecting() {
        let (session, transport, _, _) = attached_session();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(
            transport.log.lock().endpoint.as_deref(),
            Some("ws://127.0.0.1:9000/")
        );
    }

    #[test]
    fn test_sends_latest_sample_when_connected() {
        let (mut session, transport, store, _) = attached_session();
        transport.set_connected(true);
        store.publish(sample());

        assert_eq!(session.step(), StepOutcome::Sent);
        assert_eq!(session.state(), SessionState::Connected);

        let log = transport.log.lock();
        assert_eq!(log.sent.len(), 1);
        assert_eq!(log.sent[0].0, wire::format_sample(&sample()).unwrap().as_str());
        assert_eq!(log.sent[0].1, Duration::from_secs(1));
    }

    #[test]
    fn test_no_sample_sends_nothing() {
        let (mut session, transport, _, _) = attached_session();
        transport.set_connected(true);

        assert_eq!(session.step(), StepOutcome::NoSample);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_not_connected_sends_nothing() {
        let (mut session, transport, store, _) = attached_session();
        store.publish(sample());

        assert_eq!(session.step(), StepOutcome::NotConnected);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_never_connected_while_link_down() {
        let (mut session, transport, store, link) = attached_session();
        link.set_for_test(ConnectivityState::Connecting, None);
        transport.set_connected(true);
        store.publish(sample());

        assert_eq!(session.step(), StepOutcome::LinkDown);
        assert_ne!(session.state(), SessionState::Connected);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_send_failure_is_not_fatal() {
        let (mut session, transport, store, _) = attached_session();
        transport.set_connected(true);
        transport.log.lock().fail_sends = 1;
        store.publish(sample());

        assert_eq!(session.step(), StepOutcome::SendFailed);
        // Store still holds the sample, next cycle delivers it
        assert_eq!(session.step(), StepOutcome::Sent);
        assert_eq!(
            session.stats(),
            SessionStats {
                sent: 1,
                send_failures: 1,
                oversized: 0
            }
        );
    }

    #[test]
    fn test_oversized_sample_is_skipped() {
        let (mut session, transport, store, _) = attached_session();
        transport.set_connected(true);
        store.publish(Sample {
            ax: f32::MAX,
            ay: f32::MAX,
            az: f32::MAX,
            gx: f32::MAX,
            gy: f32::MAX,
            gz: f32::MAX,
        });

        assert_eq!(session.step(), StepOutcome::Oversized);
        assert!(transport.sent().is_empty());
        assert_eq!(session.stats().oversized, 1);
    }

    #[test]
    fn test_transport_loss_and_recovery() {
        let (mut session, transport, store, _) = attached_session();
        store.publish(sample());
        transport.set_connected(true);
        assert_eq!(session.step(), StepOutcome::Sent);

        transport.set_connected(false);
        assert_eq!(session.step(), StepOutcome::NotConnected);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.step(), StepOutcome::NotConnected);
        assert_eq!(session.state(), SessionState::Connecting);

        transport.set_connected(true);
        assert_eq!(session.step(), StepOutcome::Sent);
        assert_eq!(session.state(), SessionState::Connected);
        // No manual reconnect: the transport was opened exactly once
        assert_eq!(transport.log.lock().opens, 1);
    }

    #[test]
    fn test_link_loss_drops_connected_state() {
        let (mut session, transport, store, link) = attached_session();
        store.publish(sample());
        transport.set_connected(true);
        assert_eq!(session.step(), StepOutcome::Sent);

        link.set_for_test(ConnectivityState::Connecting, None);
        assert_eq!(session.step(), StepOutcome::LinkDown);
        assert_eq!(session.state(), SessionState::Disconnected);

        link.set_for_test(ConnectivityState::Attached, Some(IP));
        assert_eq!(session.step(), StepOutcome::Sent);
    }

    #[test]
    fn test_close_ends_disconnected() {
        let (mut session, transport, _, _) = attached_session();
        transport.set_connected(true);
        session.sync_state();

        session.close();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(transport.log.lock().closes, 1);

        // Closed sessions do not track the transport anymore
        transport.set_connected(true);
        assert_eq!(session.sync_state(), SessionState::Disconnected);
    }

    #[test]
    fn test_run_streams_until_shutdown() {
        let transport = MockTransport::default();
        transport.set_connected(true);
        let store = Arc::new(LatestSampleStore::new());
        store.publish(sample());
        let link = ConnectivityHandle::for_test(ConnectivityState::Attached, Some(IP));
        let shutdown = Shutdown::new();

        let worker = {
            let transport = transport.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let mut session = StreamingSession::new(transport, fast_config(), store, link);
                session.run(&shutdown);
                (session.state(), session.stats())
            })
        };

        thread::sleep(Duration::from_millis(50));
        shutdown.request();
        let (state, stats) = worker.join().unwrap();

        assert_eq!(state, SessionState::Disconnected);
        assert!(stats.sent >= 1);
        let log = transport.log.lock();
        assert_eq!(log.opens, 1);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn test_run_waits_for_link_before_opening() {
        let transport = MockTransport::default();
        transport.set_connected(true);
        let store = Arc::new(LatestSampleStore::new());
        store.publish(sample());
        let link = ConnectivityHandle::for_test(ConnectivityState::Connecting, None);
        let shutdown = Shutdown::new();

        let worker = {
            let transport = transport.clone();
            let link = link.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let mut session = StreamingSession::new(transport, fast_config(), store, link);
                session.run(&shutdown);
                session.stats()
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(transport.log.lock().opens, 0);

        link.set_for_test(ConnectivityState::Attached, Some(IP));
        thread::sleep(Duration::from_millis(50));
        shutdown.request();
        let stats = worker.join().unwrap();

        assert_eq!(transport.log.lock().opens, 1);
        assert!(stats.sent >= 1);
    }

    #[test]
    fn test_run_never_opens_if_link_stays_down() {
        let transport = MockTransport::default();
        let store = Arc::new(LatestSampleStore::new());
        let link = ConnectivityHandle::for_test(ConnectivityState::Connecting, None);
        let shutdown = Shutdown::new();

        let worker = {
            let transport = transport.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let mut session = StreamingSession::new(transport, fast_config(), store, link);
                session.run(&shutdown);
                session.state()
            })
        };

        thread::sleep(Duration::from_millis(50));
        shutdown.request();

        assert_eq!(worker.join().unwrap(), SessionState::Disconnected);
        let log = transport.log.lock();
        assert_eq!(log.opens, 0);
        assert_eq!(log.closes, 0);
    }

    #[test]
    fn test_stats_wrap_instead_of_overflowing() {
        let (mut session, transport, store, _) = attached_session();
        transport.set_connected(true);
        store.publish(sample());
        session.stats.sent = u32::MAX;

        assert_eq!(session.step(), StepOutcome::Sent);
        assert_eq!(session.stats().sent, 0);
    }

    #[test]
    fn test_run_proceeds_without_initial_connection() {
        let transport = MockTransport::default();
        transport.log.lock().fail_open = 2;
        let store = Arc::new(LatestSampleStore::new());
        store.publish(sample());
        let link = ConnectivityHandle::for_test(ConnectivityState::Attached, Some(IP));
        let shutdown = Shutdown::new();

        let worker = {
            let transport = transport.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let mut session = StreamingSession::new(transport, fast_config(), store, link);
                session.run(&shutdown);
                session.stats()
            })
        };

        // Past the initial wait, then the transport comes up on its own
        thread::sleep(Duration::from_millis(80));
        transport.set_connected(true);
        thread::sleep(Duration::from_millis(40));
        shutdown.request();
        let stats = worker.join().unwrap();

        assert!(stats.sent >= 1);
        assert_eq!(transport.log.lock().opens, 1);
    }
}
