//! MQTT request/response bridge transport.
//!
//! The bridge tunnels the exact frame bytes a serial link would carry:
//! requests are published on the request topic and the bridged device (or
//! gateway) answers with a raw RTU frame on the response topic. It is
//! transport-level tunneling only, not a protocol converter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::transport::Transport;
use crate::config::settings::MqttSettings;
use crate::utils::error::SensorError;

/// Capacity of the reply slot between the event loop and `exchange`.
const REPLY_QUEUE: usize = 10;

/// Modbus RTU frames tunneled through an MQTT topic pair.
///
/// Replies are matched to the pending request by unit id (the first frame
/// byte), so only one request per unit id may be in flight; the session
/// layer serializes its own requests, and several units can share a bridge
/// as long as each has its own session.
pub struct MqttBridgeTransport {
    settings: MqttSettings,
    client: Option<AsyncClient>,
    replies: Option<mpsc::Receiver<Bytes>>,
    event_loop: Option<JoinHandle<()>>,
}

impl MqttBridgeTransport {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            client: None,
            replies: None,
            event_loop: None,
        }
    }

    fn qos(&self) -> QoS {
        match self.settings.qos {
            0 => QoS::AtMostOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtLeastOnce,
        }
    }
}

#[async_trait]
impl Transport for MqttBridgeTransport {
    async fn connect(&mut self) -> Result<(), SensorError> {
        let mut options = MqttOptions::new(
            &self.settings.client_id,
            &self.settings.host,
            self.settings.port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        if let Some(username) = &self.settings.username {
            options.set_credentials(
                username.clone(),
                self.settings.password.clone().unwrap_or_default(),
            );
        }

        let (client, mut event_loop) = AsyncClient::new(options, REPLY_QUEUE);
        let (tx, rx) = mpsc::channel::<Bytes>(REPLY_QUEUE);
        let response_topic = self.settings.response_topic.clone();

        let handle = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if publish.topic == response_topic {
                            // A full slot means nobody is waiting; drop it.
                            let _ = tx.try_send(publish.payload);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if tx.is_closed() {
                            break;
                        }
                        warn!("MQTT event loop error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        client
            .subscribe(&self.settings.response_topic, self.qos())
            .await
            .map_err(|e| {
                handle.abort();
                SensorError::Transport(format!("subscribe failed: {}", e))
            })?;

        info!(
            "MQTT bridge connected to {}:{} ({} → {})",
            self.settings.host,
            self.settings.port,
            self.settings.request_topic,
            self.settings.response_topic
        );

        self.client = Some(client);
        self.replies = Some(rx);
        self.event_loop = Some(handle);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SensorError> {
        if let Some(client) = self.client.take() {
            let _ = client.disconnect().await;
        }
        // Closing the reply slot stops the event loop task on its next error.
        self.replies = None;
        if let Some(handle) = self.event_loop.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn exchange(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, SensorError> {
        let unit_id = *request
            .first()
            .ok_or_else(|| SensorError::FrameCorrupt("empty request frame".to_string()))?;
        let qos = self.qos();
        let client = self.client.as_ref().ok_or(SensorError::NotConnected)?;
        let replies = self.replies.as_mut().ok_or(SensorError::NotConnected)?;

        // Drop replies left over from an earlier timed-out exchange.
        while replies.try_recv().is_ok() {}

        client
            .publish(&self.settings.request_topic, qos, false, request.to_vec())
            .await
            .map_err(|e| SensorError::Transport(format!("publish failed: {}", e)))?;
        debug!("→ {} {}", self.settings.request_topic, hex::encode(request));

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SensorError::Timeout);
            }

            let payload = tokio::time::timeout(remaining, replies.recv())
                .await?
                .ok_or_else(|| SensorError::Transport("MQTT reply channel closed".to_string()))?;
            debug!(
                "← {} {}",
                self.settings.response_topic,
                hex::encode(&payload)
            );

            if payload.first() == Some(&unit_id) {
                return Ok(payload.to_vec());
            }
            // Reply addressed to another unit on the bridge; keep waiting.
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MqttSettings {
        MqttSettings {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "agrisense-test".to_string(),
            request_topic: "sensors/request".to_string(),
            response_topic: "sensors/response".to_string(),
            username: None,
            password: None,
            qos: 1,
        }
    }

    #[tokio::test]
    async fn exchange_requires_connection() {
        let mut bridge = MqttBridgeTransport::new(settings());
        let err = bridge
            .exchange(&[0x01, 0x03], Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SensorError::NotConnected));
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let mut bridge = MqttBridgeTransport::new(settings());
        let err = bridge
            .exchange(&[], Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SensorError::FrameCorrupt(_)));
    }

    #[tokio::test]
    async fn disconnect_is_safe_when_not_connected() {
        let mut bridge = MqttBridgeTransport::new(settings());
        bridge.disconnect().await.unwrap();
        assert!(!bridge.is_connected());
    }
}
