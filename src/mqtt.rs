use rumqttc::v5::AsyncClient;
use rumqttc::v5::ClientError;
use rumqttc::v5::MqttOptions;
use tokio_util::sync::CancellationToken;

use crate::error::MqttError;

enum Step {
    Mqtt(Result<rumqttc::v5::Event, rumqttc::v5::ConnectionError>),
    Status,
    StatusClosed,
}

/// Requests that still have to reach the broker.
///
/// Only the latest status is kept. Nothing is queued while disconnected and a
/// full request queue is retried after the next poll, so the task that polls
/// the event loop never waits on its own queue.
#[derive(Debug)]
struct Outbox {
    topic: String,
    status_topic: String,
    qos: rumqttc::v5::mqttbytes::QoS,
    connected: bool,
    subscribe_due: bool,
    status: Option<String>,
}

impl Outbox {
    fn new(config: &crate::config::MqttConfig) -> Self {
        Self {
            topic: format!("{prefix}/events", prefix = config.topic_prefix),
            status_topic: format!("{prefix}/state/current_plugin", prefix = config.topic_prefix),
            qos: rumqttc::v5::mqttbytes::QoS::from(config.qos),
            connected: false,
            subscribe_due: false,
            status: None,
        }
    }

    fn connected(&mut self, current: Option<&'static str>) {
        self.connected = true;
        // subscriptions do not survive a reconnect with a clean session
        self.subscribe_due = true;
        self.set_status(current);
    }

    fn disconnected(&mut self) {
        self.connected = false;
    }

    fn set_status(&mut self, current: Option<&'static str>) {
        self.status = Some(current.unwrap_or_default().to_string());
    }

    fn flush(&mut self, client: &AsyncClient) -> Result<(), MqttError> {
        if !self.connected {
            return Ok(());
        }

        if self.subscribe_due {
            match client.try_subscribe(&self.topic, self.qos) {
                Ok(()) => {
                    self.subscribe_due = false;
                    tracing::info!("Successfully subscribed to {}", self.topic);
                }
                Err(ClientError::TryRequest(_)) => {
                    tracing::debug!("Request queue full, subscribing later");
                    return Ok(());
                }
                Err(error) => return Err(MqttError::Subscribing(error)),
            }
        }

        if let Some(payload) = self.status.take() {
            tracing::debug!(topic = %self.status_topic, ?payload, "Publishing active plugin");
            match client.try_publish(&self.status_topic, self.qos, true, payload.clone()) {
                Ok(()) => {}
                Err(ClientError::TryRequest(_)) => {
                    tracing::debug!("Request queue full, publishing active plugin later");
                    self.status = Some(payload);
                }
                Err(error) => tracing::warn!(?error, "Failed to publish active plugin"),
            }
        }

        Ok(())
    }
}

/// Forward remote events from `{prefix}/events` and publish the active plugin
/// name retained on `{prefix}/state/current_plugin`.
pub async fn run(
    config: crate::config::MqttConfig,
    cancellation_token: CancellationToken,
    event_sender: tokio::sync::mpsc::Sender<crate::event::Event>,
    mut status: tokio::sync::watch::Receiver<Option<&'static str>>,
) -> Result<(), MqttError> {
    let mut mqttoptions =
        MqttOptions::new(&config.client_name, config.host.to_string(), config.port);
    mqttoptions.set_keep_alive(config.keep_alive);

    let (client, mut eventloop) = rumqttc::v5::AsyncClient::new(mqttoptions, 100);

    let mut outbox = Outbox::new(&config);
    let mut status_open = true;

    loop {
        let step = cancellation_token
            .run_until_cancelled(async {
                tokio::select! {
                    event = eventloop.poll() => Step::Mqtt(event),
                    changed = status.changed(), if status_open => match changed {
                        Ok(()) => Step::Status,
                        Err(_) => Step::StatusClosed,
                    },
                }
            })
            .await;

        let Some(step) = step else {
            tracing::info!("Cancelled, shutting down MQTT processing");
            break;
        };

        match step {
            Step::Mqtt(Ok(event)) => match event {
                rumqttc::v5::Event::Incoming(rumqttc::v5::Incoming::ConnAck(_)) => {
                    tracing::info!("Connected to MQTT broker");
                    outbox.connected(*status.borrow());
                }

                rumqttc::v5::Event::Incoming(rumqttc::v5::Incoming::Publish(
                    rumqttc::v5::mqttbytes::v5::Publish {
                        dup: _,
                        qos: _,
                        retain: _,
                        topic,
                        pkid: _,
                        payload,
                        properties: _,
                    },
                )) => {
                    tracing::debug!(?topic, ?payload, "Received payload");
                    forward(&payload, &event_sender).await;
                }

                rumqttc::v5::Event::Incoming(_) => {
                    // nothing
                }

                rumqttc::v5::Event::Outgoing(_outgoing) => {
                    // nothing
                }
            },
            Step::Mqtt(Err(error)) => {
                outbox.disconnected();
                tracing::warn!(
                    ?error,
                    retry_in = ?config.reconnect_interval,
                    "MQTT connection failed"
                );
                let slept = cancellation_token
                    .run_until_cancelled(tokio::time::sleep(config.reconnect_interval))
                    .await;
                if slept.is_none() {
                    tracing::info!("Cancelled, shutting down MQTT processing");
                    break;
                }
                continue;
            }
            Step::Status => {
                outbox.set_status(*status.borrow_and_update());
            }
            Step::StatusClosed => {
                tracing::debug!("Status channel closed, no more status updates");
                status_open = false;
            }
        }

        outbox.flush(&client)?;
    }

    Ok(())
}

async fn forward(payload: &[u8], event_sender: &tokio::sync::mpsc::Sender<crate::event::Event>) {
    let event: crate::event::Event = match serde_json::from_slice(payload) {
        Ok(event) => {
            tracing::debug!(?event, "Deserialized event successfully");
            event
        }
        Err(error) => {
            tracing::debug!(?error, "Failed to deserialize event, ignoring");
            return;
        }
    };

    if let Err(event) = event_sender.send(event).await {
        tracing::error!(?event, "Failed to send event to internal channel");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rumqttc::v5::MqttOptions;
    use tokio_util::sync::CancellationToken;

    use super::Outbox;
    use crate::config::MqttConfig;
    use crate::config::Qos;

    fn config(port: u16) -> MqttConfig {
        MqttConfig {
            host: std::net::IpAddr::from([127, 0, 0, 1]),
            port,
            qos: Qos::AtLeastOnce,
            client_name: String::from("ledsign-test"),
            keep_alive: Duration::from_secs(5),
            reconnect_interval: Duration::from_millis(1),
            topic_prefix: String::from("sign"),
        }
    }

    fn client(capacity: usize) -> (rumqttc::v5::AsyncClient, rumqttc::v5::EventLoop) {
        let options = MqttOptions::new("ledsign-test", "127.0.0.1", 1);
        rumqttc::v5::AsyncClient::new(options, capacity)
    }

    #[test]
    fn nothing_is_queued_while_disconnected() {
        let (client, _eventloop) = client(1);
        let mut outbox = Outbox::new(&config(1));
        for _ in 0..300 {
            outbox.set_status(Some("clock"));
            outbox.flush(&client).unwrap();
        }
        assert_eq!(outbox.status.as_deref(), Some("clock"));
        assert!(!outbox.subscribe_due);
    }

    #[test]
    fn full_queue_is_retried_later() {
        let (client, _eventloop) = client(1);
        let mut outbox = Outbox::new(&config(1));
        outbox.connected(Some("clock"));

        outbox.flush(&client).unwrap();
        assert!(!outbox.subscribe_due);
        assert_eq!(outbox.status.as_deref(), Some("clock"));

        outbox.set_status(Some("stars"));
        outbox.flush(&client).unwrap();
        assert_eq!(outbox.status.as_deref(), Some("stars"));
    }

    #[test]
    fn reconnect_resubscribes_and_republishes() {
        let (client, _eventloop) = client(10);
        let mut outbox = Outbox::new(&config(1));
        outbox.connected(Some("clock"));
        outbox.flush(&client).unwrap();
        assert!(outbox.status.is_none());

        outbox.disconnected();
        outbox.connected(None);
        assert!(outbox.subscribe_due);
        assert_eq!(outbox.status.as_deref(), Some(""));
        outbox.flush(&client).unwrap();
        assert!(!outbox.subscribe_due);
        assert!(outbox.status.is_none());
    }

    #[tokio::test]
    async fn stops_on_cancel_after_many_switches_without_broker() {
        let token = CancellationToken::new();
        let (event_sender, _event_receiver) = tokio::sync::mpsc::channel(1);
        let (status_sender, status_receiver) = tokio::sync::watch::channel(None);

        // nothing listens on port 1, every connection attempt is refused
        let handle = tokio::spawn(super::run(
            config(1),
            token.clone(),
            event_sender,
            status_receiver,
        ));

        for idx in 0..300 {
            let name = if idx % 2 == 0 { "clock" } else { "stars" };
            status_sender.send_replace(Some(name));
            tokio::task::yield_now().await;
        }

        token.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(3), handle).await;
        assert!(matches!(finished, Ok(Ok(Ok(())))));
    }
}
