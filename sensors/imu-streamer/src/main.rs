mod bus;
mod config;
mod websocket;
mod wifi;

use std::sync::Arc;
use std::thread;

use bus::TimedI2c;
use config::SystemConfig;
use esp_idf_hal::{
    delay::FreeRtos,
    i2c::{I2cConfig, I2cDriver},
    peripherals::Peripherals,
    units::Hertz,
};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
use icm20948::{registers::WHO_AM_I_VALUE, Icm20948};
use imu_telemetry::{
    AcquisitionLoop, ConnectivityManager, LatestSampleStore, Shutdown, StreamingSession,
};
use log::{error, info, warn};
use websocket::WsTransport;
use wifi::EspStationLink;

fn main() {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    if let Err(e) = run() {
        error!("Initialization failed: {}", e);
        // Nothing was spawned past the failing step; park with the status logged
        loop {
            FreeRtos::delay_ms(1000);
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = SystemConfig::from_env();

    info!("=== ESP32-C3 IMU Streamer ===");
    info!(
        "SSID: {}, Endpoint: {}, Rate: {}Hz",
        config.network.wifi_ssid,
        config.session.endpoint,
        1000 / config.acquisition.period.as_millis().max(1)
    );

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();

    // IMU first: without a sensor there is nothing to stream
    info!("Initializing IMU");
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio5,
        peripherals.pins.gpio6,
        &I2cConfig::new().baudrate(Hertz(config.imu.baudrate_hz)),
    )?;
    let mut imu = Icm20948::new(TimedI2c::new(i2c), FreeRtos, config.imu.address);

    match imu.who_am_i() {
        Ok(WHO_AM_I_VALUE) => info!("ICM-20948 found at 0x{:02X}", imu.address()),
        Ok(id) => warn!("Unexpected WHO_AM_I 0x{:02X} (expected 0x{:02X})", id, WHO_AM_I_VALUE),
        Err(e) => warn!("WHO_AM_I read failed: {}", e),
    }
    imu.initialize()
        .map_err(|e| format!("IMU initialization failed: {}", e))?;
    info!("IMU initialized");

    // WiFi: subscribe before starting so the started event is never missed
    info!("Initializing WiFi");
    let link = EspStationLink::new(peripherals.modem, sysloop.clone(), nvs)?;
    let (mut connectivity, events) = ConnectivityManager::new(link, config.connectivity);
    let _bridge = wifi::bridge_events(&sysloop, events)?;
    let link_status = connectivity.handle();
    connectivity.start(&config.network.credentials())?;

    let shutdown = Shutdown::new();

    let wifi_task = {
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("wifi".into())
            .stack_size(4096)
            .spawn(move || connectivity.run(&shutdown))?
    };

    info!("WiFi started, waiting for connection...");
    let ip = link_status.wait_until_attached(config.connectivity.attach_timeout)?;
    info!("Connected with IP: {}", ip);

    // Tasks only after the network is up
    let store = Arc::new(LatestSampleStore::new());

    let imu_task = {
        let store = store.clone();
        let shutdown = shutdown.clone();
        let acquisition = config.acquisition;
        thread::Builder::new()
            .name("imu".into())
            .stack_size(4096)
            .spawn(move || AcquisitionLoop::new(imu, store, acquisition).run(&shutdown))?
    };
    info!("IMU task created");

    let ws_task = {
        let shutdown = shutdown.clone();
        let session = config.session.clone();
        thread::Builder::new()
            .name("websocket".into())
            .stack_size(8192)
            .spawn(move || {
                StreamingSession::new(WsTransport::new(), session, store, link_status)
                    .run(&shutdown)
            })?
    };
    info!("WebSocket task created");

    info!("Initialization complete");

    // The tasks run for the life of the device; keep the event bridge alive with them
    for (name, task) in [("imu", imu_task), ("websocket", ws_task), ("wifi", wifi_task)] {
        if task.join().is_err() {
            error!("{} task panicked", name);
        }
    }

    Ok(())
}
