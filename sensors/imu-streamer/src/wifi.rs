/// WiFi station link for the connectivity manager
///
/// The radio is driven non-blocking: `start`/`attach` only issue requests and
/// the outcome comes back through system event loop subscriptions, which are
/// forwarded into the manager's event queue.
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};
use imu_telemetry::{AttachEvent, Credentials, EventSink, StationLink};
use log::{debug, info};

pub struct EspStationLink {
    wifi: EspWifi<'static>,
}

impl EspStationLink {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self { wifi })
    }
}

impl StationLink for EspStationLink {
    type Error = Box<dyn std::error::Error>;

    fn configure(&mut self, credentials: &Credentials) -> Result<(), Self::Error> {
        let auth_method = if credentials.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| "SSID does not fit station config")?,
            password: credentials
                .password
                .as_str()
                .try_into()
                .map_err(|_| "password does not fit station config")?,
            auth_method,
            ..Default::default()
        });

        self.wifi.set_configuration(&wifi_config)?;
        Ok(())
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        self.wifi.start()?;
        Ok(())
    }

    fn attach(&mut self) -> Result<(), Self::Error> {
        self.wifi.connect()?;
        Ok(())
    }
}

/// Keeps the event loop subscriptions alive; dropping it stops forwarding
pub struct EventBridge {
    _wifi: EspSubscription<'static, System>,
    _ip: EspSubscription<'static, System>,
}

/// Forward station and DHCP events into the connectivity event queue
pub fn bridge_events(
    sysloop: &EspSystemEventLoop,
    sink: EventSink,
) -> Result<EventBridge, Box<dyn std::error::Error>> {
    let wifi_sink = sink.clone();
    let wifi = sysloop.subscribe::<WifiEvent, _>(move |event| {
        let forwarded = match event {
            WifiEvent::StaStarted => Some(AttachEvent::Started),
            WifiEvent::StaDisconnected(disconnected) => Some(AttachEvent::Lost {
                reason: disconnected.reason(),
            }),
            other => {
                debug!("WiFi event: {:?}", other);
                None
            }
        };
        if let Some(event) = forwarded {
            wifi_sink.post(event);
        }
    })?;

    let ip = sysloop.subscribe::<IpEvent, _>(move |event| {
        if let IpEvent::DhcpIpAssigned(assignment) = event {
            info!("DHCP lease: {}", assignment.ip());
            sink.post(AttachEvent::AddressAssigned(assignment.ip()));
        }
    })?;

    Ok(EventBridge { _wifi: wifi, _ip: ip })
}
