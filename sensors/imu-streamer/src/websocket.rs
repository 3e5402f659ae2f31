/// WebSocket transport for the streaming session
/// The ESP-IDF client owns reconnection and keepalive; this wrapper only
/// creates it with the session timings and forwards text frames
use std::time::Duration;

use esp_idf_svc::ws::client::{
    EspWebSocketClient, EspWebSocketClientConfig, FrameType, WebSocketEventType,
};
use imu_telemetry::{SessionConfig, SessionTransport};
use log::{error, info, warn};

#[derive(Default)]
pub struct WsTransport {
    client: Option<EspWebSocketClient<'static>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionTransport for WsTransport {
    type Error = Box<dyn std::error::Error>;

    fn open(&mut self, config: &SessionConfig) -> Result<(), Self::Error> {
        let ws_config = EspWebSocketClientConfig {
            reconnect_timeout_ms: config.reconnect_interval,
            network_timeout_ms: config.network_timeout,
            ping_interval_sec: config.ping_interval,
            pingpong_timeout_sec: config.pong_timeout,
            disable_auto_reconnect: false,
            ..Default::default()
        };

        // Send timeout is fixed per client
        let client = EspWebSocketClient::new(
            &config.endpoint,
            &ws_config,
            config.send_timeout,
            |event| match event {
                Ok(event) => match event.event_type {
                    WebSocketEventType::Connected => info!("WS connected"),
                    WebSocketEventType::Disconnected => warn!("WS disconnected"),
                    WebSocketEventType::Closed => warn!("WS closed"),
                    _ => {}
                },
                Err(e) => error!("WS error: {:?}", e),
            },
        )?;

        self.client = Some(client);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.is_connected())
    }

    fn send_text(&mut self, text: &str, _timeout: Duration) -> Result<(), Self::Error> {
        let client = self.client.as_mut().ok_or("WebSocket client not started")?;
        client.send(FrameType::Text(false), text.as_bytes())?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        // Dropping the client stops its task and frees the handle
        drop(self.client.take());
        Ok(())
    }
}
