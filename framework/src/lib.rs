//! IMU Telemetry Streaming Core
//!
//! Acquires 6-axis samples from a register-bank IMU, hands them to a network
//! sender through a single-slot store, and streams them to a remote endpoint
//! over a persistent session while keeping the network attachment alive.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────┐ publish ┌───────────────────┐  read  ┌──────────────────┐
//!  │ Acquisition  │────────▶│ LatestSampleStore │───────▶│ StreamingSession │──▶ endpoint
//!  │ Loop (100ms) │         │ (lossy, 1 slot)   │        │ (100ms cadence)  │
//!  └──────┬───────┘         └───────────────────┘        └────────┬─────────┘
//!         │ SampleSource                                          │ is_attached
//!  ┌──────┴───────┐                                      ┌────────┴──────────┐
//!  │ ICM-20948    │                                      │ Connectivity      │◀── AttachEvent
//!  │ (I2C driver) │                                      │ Manager           │
//!  └──────────────┘                                      └───────────────────┘
//! ```
//!
//! Nothing here is tied to a platform. The firmware supplies the I2C bus, the
//! WiFi [`connectivity::StationLink`] and the WebSocket
//! [`session::SessionTransport`]; tests supply mocks.
//!
//! ## Modules
//!
//! - [`sensors`] - Sample type and the sample-source abstraction
//! - [`store`] - Latest-sample store with bounded lock waits
//! - [`acquisition`] - Periodic poll-and-publish loop
//! - [`connectivity`] - Network attachment state machine
//! - [`wire`] - Fixed-buffer JSON message format
//! - [`session`] - Streaming session over an auto-reconnecting transport
//! - [`shutdown`] - Cooperative stop token for the loops

pub mod acquisition;
pub mod connectivity;
pub mod error;
pub mod session;
pub mod sensors;
pub mod shutdown;
pub mod store;
pub mod wire;

pub use acquisition::{AcquisitionConfig, AcquisitionLoop};
pub use connectivity::{
    AttachEvent, ConnectivityConfig, ConnectivityHandle, ConnectivityManager, ConnectivityState,
    Credentials, EventSink, StationLink,
};
pub use error::{Error, Result};
pub use sensors::{Sample, SampleSource};
pub use session::{SessionConfig, SessionState, SessionTransport, StreamingSession};
pub use shutdown::Shutdown;
pub use store::LatestSampleStore;
