use super::AlertSink;
use crate::alerts::AlertResponse;
use crate::config::MqttConf;
use crate::models::{Alert, Snapshot};
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const ALERT_TOPIC: &str = "tb3/health/alert@v1";
pub const SNAPSHOT_TOPIC: &str = "tb3/health/snapshot@v1";

#[derive(Debug, Serialize)]
pub struct AlertMessage<'a> {
    #[serde(flatten)]
    pub alert: &'a Alert,
    pub response: Option<AlertResponse>,
    pub timestamp: DateTime<Utc>,
}

/// Publishes alerts and snapshots as JSON on the event bus
pub struct MqttSink {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttSink {
    /// Must be called inside a tokio runtime; the connection is driven by a
    /// background task and retried on error
    pub fn connect(conf: &MqttConf, client_id: &str) -> Self {
        let mut opts = MqttOptions::new(client_id, &conf.host, conf.port);
        opts.set_keep_alive(Duration::from_secs(15));

        let (client, mut eventloop) = AsyncClient::new(opts, 32);
        let broker = format!("{}:{}", conf.host, conf.port);

        let event_loop = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT error ({}): {:?}", broker, e);
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        Self { client, event_loop }
    }

    fn send(&self, topic: &str, payload: Vec<u8>) {
        // Never block a poll cycle on the broker: drop the message if the queue is full
        if let Err(e) = self.client.try_publish(topic, QoS::AtLeastOnce, false, payload) {
            warn!("Failed to queue MQTT message on {}: {}", topic, e);
        } else {
            debug!("Queued MQTT message on {}", topic);
        }
    }
}

impl AlertSink for MqttSink {
    fn emit(&self, alert: &Alert, response: Option<AlertResponse>) {
        let message = AlertMessage {
            alert,
            response,
            timestamp: Utc::now(),
        };
        match serde_json::to_vec(&message) {
            Ok(payload) => self.send(ALERT_TOPIC, payload),
            Err(e) => warn!("Failed to serialize alert: {}", e),
        }
    }

    fn publish_snapshot(&self, snapshot: &Snapshot) {
        match serde_json::to_vec(snapshot) {
            Ok(payload) => self.send(SNAPSHOT_TOPIC, payload),
            Err(e) => warn!("Failed to serialize snapshot: {}", e),
        }
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertSource;

    #[test]
    fn test_alert_message_shape() {
        let alert = Alert::critical(AlertSource::Power, "Battery critical: 8.0%");
        let message = AlertMessage {
            alert: &alert,
            response: AlertResponse::for_alert(&alert),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["message"], "Battery critical: 8.0%");
        assert_eq!(json["response"], "battery_protection");
    }

    #[tokio::test]
    async fn test_unreachable_broker_does_not_block() {
        let conf = MqttConf { host: "127.0.0.1".into(), port: 1 };
        let sink = MqttSink::connect(&conf, "tb3-health-test");
        let alert = Alert::warning(AlertSource::Host, "High CPU usage: 95.0%");
        for _ in 0..100 {
            sink.emit(&alert, None);
        }
    }
}
