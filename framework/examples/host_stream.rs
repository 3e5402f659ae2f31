//! Runs the whole acquisition → store → session pipeline on the host
//!
//! A synthetic IMU stands in for the ICM-20948, a simulated radio feeds the
//! connectivity manager (attach, drop, re-attach), and the transport logs
//! each message instead of sending it.
//!
//! Run with: RUST_LOG=info cargo run -p imu-telemetry --example host_stream

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use imu_telemetry::{
    AcquisitionConfig, AcquisitionLoop, AttachEvent, ConnectivityConfig, ConnectivityManager,
    Credentials, LatestSampleStore, Result, Sample, SampleSource, SessionConfig, SessionTransport,
    Shutdown, StationLink, StreamingSession,
};
use log::info;

const G: f32 = 9.80665;

/// Deterministic noise so runs are reproducible
struct NoiseGen {
    state: u32,
}

impl NoiseGen {
    fn next(&mut self, amplitude: f32) -> f32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        let normalized = (self.state as f32 / u32::MAX as f32) * 2.0 - 1.0;
        normalized * amplitude
    }
}

/// Device lying flat, slowly yawing, with sensor noise
struct SyntheticImu {
    t: f32,
    noise: NoiseGen,
}

impl SampleSource for SyntheticImu {
    fn read_sample(&mut self) -> Result<Sample> {
        self.t += 0.1;
        Ok(Sample {
            ax: self.noise.next(0.05),
            ay: self.noise.next(0.05),
            az: G + self.noise.next(0.05),
            gx: self.noise.next(0.01),
            gy: self.noise.next(0.01),
            gz: 0.2 * self.t.sin(),
        })
    }
}

/// Radio that accepts every request; outcomes are posted by the simulation
struct SimulatedRadio;

impl StationLink for SimulatedRadio {
    type Error = &'static str;

    fn configure(&mut self, credentials: &Credentials) -> std::result::Result<(), Self::Error> {
        info!("radio: configured for {:?}", credentials);
        Ok(())
    }

    fn start(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn attach(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Prints each frame; connected flag toggled by the simulation
struct LoggingTransport {
    connected: Arc<AtomicBool>,
}

impl SessionTransport for LoggingTransport {
    type Error = &'static str;

    fn open(&mut self, config: &SessionConfig) -> std::result::Result<(), Self::Error> {
        info!("transport: opening {}", config.endpoint);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_text(&mut self, text: &str, _timeout: Duration) -> std::result::Result<(), Self::Error> {
        println!("{}", text);
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), Self::Error> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let shutdown = Shutdown::new();
    let store = Arc::new(LatestSampleStore::new());
    let transport_up = Arc::new(AtomicBool::new(false));
    let ip = Ipv4Addr::new(192, 168, 4, 2);

    let (mut connectivity, events) =
        ConnectivityManager::new(SimulatedRadio, ConnectivityConfig::default());
    let link = connectivity.handle();
    connectivity.start(&Credentials::new("host-sim", "password"))?;

    let wifi_task = {
        let shutdown = shutdown.clone();
        thread::spawn(move || connectivity.run(&shutdown))
    };

    events.post(AttachEvent::Started);
    events.post(AttachEvent::AddressAssigned(ip));
    info!("attached as {}", link.wait_until_attached(Duration::from_secs(5))?);

    let imu_task = {
        let store = store.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            let imu = SyntheticImu {
                t: 0.0,
                noise: NoiseGen { state: 42 },
            };
            let mut acquisition = AcquisitionLoop::new(imu, store, AcquisitionConfig::default());
            acquisition.run(&shutdown);
            acquisition.stats()
        })
    };

    let ws_task = {
        let shutdown = shutdown.clone();
        let link = link.clone();
        let transport = LoggingTransport {
            connected: transport_up.clone(),
        };
        let config = SessionConfig {
            endpoint: "ws://127.0.0.1:8080/".to_string(),
            initial_connect_wait: Duration::from_secs(1),
            ..Default::default()
        };
        thread::spawn(move || {
            let mut session = StreamingSession::new(transport, config, store, link);
            session.run(&shutdown);
            session.stats()
        })
    };

    thread::sleep(Duration::from_millis(300));
    transport_up.store(true, Ordering::SeqCst);
    thread::sleep(Duration::from_secs(1));

    info!("simulating link loss");
    events.post(AttachEvent::Lost { reason: 8 });
    thread::sleep(Duration::from_secs(1));
    events.post(AttachEvent::AddressAssigned(ip));
    thread::sleep(Duration::from_secs(1));

    shutdown.request();
    let acquisition = imu_task.join().map_err(|_| "imu task panicked")?;
    let session = ws_task.join().map_err(|_| "websocket task panicked")?;
    wifi_task.join().map_err(|_| "wifi task panicked")?;

    println!("\n=== Summary ===");
    println!(
        "Acquisition: {} cycles, {} read failures, {} dropped",
        acquisition.cycles, acquisition.read_failures, acquisition.dropped
    );
    println!(
        "Session: {} sent, {} failed, {} oversized",
        session.sent, session.send_failures, session.oversized
    );
    println!("Final link state: {:?}", link.state());

    Ok(())
}
