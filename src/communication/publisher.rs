use amiquip::{Channel, Connection, Exchange, Publish, QueueDeclareOptions};
use log::{error, info};
use thiserror::Error;

use crate::communication::messages::RedLightWarning;
use crate::global_variables::METRIC_TRIGGER_SEND;
use crate::monitoring::{GeoReference, TrafficHazardMonitor};
use crate::shared_data::current_timestamp_ms;
use crate::traci::SimulationLink;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] amiquip::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Where acknowledged warnings go.
pub trait WarningPublisher {
    fn publish(&mut self, warning: &RedLightWarning) -> Result<(), NotifierError>;
}

/// Publishes warnings as JSON on a RabbitMQ queue through the direct exchange.
pub struct AmqpWarningPublisher {
    connection: Option<Connection>,
    channel: Channel,
    queue: String,
}

impl AmqpWarningPublisher {
    pub fn open(url: &str, queue: &str) -> Result<Self, NotifierError> {
        let mut connection = Connection::insecure_open(url)?;
        let channel = connection.open_channel(None)?;
        channel.queue_declare(queue, QueueDeclareOptions::default())?;
        info!("[Notifier] Publishing warnings to queue '{}'", queue);
        Ok(Self {
            connection: Some(connection),
            channel,
            queue: queue.to_string(),
        })
    }
}

impl WarningPublisher for AmqpWarningPublisher {
    fn publish(&mut self, warning: &RedLightWarning) -> Result<(), NotifierError> {
        let payload = serde_json::to_vec(warning)?;
        let exchange = Exchange::direct(&self.channel);
        exchange.publish(Publish::new(&payload, self.queue.as_str()))?;
        Ok(())
    }
}

impl Drop for AmqpWarningPublisher {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                error!("[Notifier] Error closing AMQP connection: {}", e);
            }
        }
    }
}

/// Publishes to the log only; used when no broker is available.
#[derive(Debug, Default)]
pub struct LogPublisher {
    pub published: Vec<RedLightWarning>,
}

impl WarningPublisher for LogPublisher {
    fn publish(&mut self, warning: &RedLightWarning) -> Result<(), NotifierError> {
        info!("[Notifier] {}", serde_json::to_string(warning)?);
        self.published.push(warning.clone());
        Ok(())
    }
}

/// Drains the monitor's pending-warning latch into a publisher.
///
/// Each published warning gets a fresh message id and is logged as a
/// `METRIC_TRIGGER_SEND <id> <timestamp_ms>` line for delivery analysis.
pub struct WarningNotifier<P: WarningPublisher> {
    publisher: P,
    next_message_id: u64,
    reference: GeoReference,
}

impl<P: WarningPublisher> WarningNotifier<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            next_message_id: 1,
            reference: GeoReference::default(),
        }
    }

    pub fn with_reference(mut self, reference: GeoReference) -> Self {
        self.reference = reference;
        self
    }

    /// Publishes and acknowledges a pending warning, if any.
    ///
    /// The latch is cleared only after a successful publish, so a broker
    /// hiccup is retried on the next tick.
    pub fn notify_pending<L: SimulationLink>(
        &mut self,
        monitor: &mut TrafficHazardMonitor<L>,
    ) -> Option<RedLightWarning> {
        if !monitor.has_pending_warning() {
            return None;
        }
        let warning = RedLightWarning::from_hazard(
            self.next_message_id,
            current_timestamp_ms(),
            monitor.tick(),
            monitor.last_hazard(),
            monitor.default_vehicle_id(),
            &self.reference,
        );
        match self.publisher.publish(&warning) {
            Ok(()) => {
                info!(
                    "{} {} {}",
                    METRIC_TRIGGER_SEND, warning.message_id, warning.timestamp_ms
                );
                self.next_message_id += 1;
                monitor.clear_pending_warning();
                Some(warning)
            }
            Err(e) => {
                error!("[Notifier] Failed to publish red light warning: {}", e);
                None
            }
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}
