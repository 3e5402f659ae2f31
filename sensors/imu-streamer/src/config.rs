/// Configuration for the IMU streamer firmware
/// Defaults carry the subsystem timings; network identity comes from the build
/// environment
use imu_telemetry::{AcquisitionConfig, ConnectivityConfig, Credentials, SessionConfig};

/// Network configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network to join. Empty means not configured.
    pub wifi_ssid: &'static str,
    /// Empty for an open network
    pub wifi_password: &'static str,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: "",
            wifi_password: "",
        }
    }
}

impl NetworkConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.wifi_ssid, self.wifi_password)
    }
}

/// IMU wiring (ESP32-C3 I2C0)
#[derive(Debug, Clone, Copy)]
pub struct ImuConfig {
    pub address: u8,
    pub baudrate_hz: u32,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            address: icm20948::I2C_ADDR_AD0_HIGH,
            baudrate_hz: 400_000,
        }
    }
}

/// Master system configuration
#[derive(Debug, Clone, Default)]
pub struct SystemConfig {
    pub network: NetworkConfig,
    pub connectivity: ConnectivityConfig,
    pub session: SessionConfig,
    pub acquisition: AcquisitionConfig,
    pub imu: ImuConfig,
}

impl SystemConfig {
    /// Create configuration from environment variables (compile-time)
    ///
    /// ```bash
    /// export WIFI_SSID="YourNetworkName"
    /// export WIFI_PASSWORD="YourPassword"
    /// export WS_ENDPOINT="ws://192.168.1.100:8080/"   # Your receiver
    /// export WIFI_MAX_RETRY=5                         # optional
    /// cargo build --release
    /// ```
    ///
    /// There is no fallback network: without WIFI_SSID the connectivity
    /// start fails with an invalid-credentials error.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ssid) = option_env!("WIFI_SSID") {
            config.network.wifi_ssid = ssid;
        }
        if let Some(password) = option_env!("WIFI_PASSWORD") {
            config.network.wifi_password = password;
        }
        if let Some(endpoint) = option_env!("WS_ENDPOINT") {
            config.session.endpoint = endpoint.to_string();
        }
        if let Some(retries) = option_env!("WIFI_MAX_RETRY").and_then(|v| v.parse().ok()) {
            config.connectivity.max_retries = retries;
        }

        config
    }
}
