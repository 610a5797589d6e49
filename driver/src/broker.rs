//! AMQP broker client: one connection, one channel, prefetch 1, consuming
//! `submission_queue` and publishing to `result_queue`.
//!

use futures::StreamExt;

use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};

use crate::{ErrorKind, Result, ResultExt};

const SUBMISSION_QUEUE: &str = "submission_queue";
const RESULT_QUEUE: &str = "result_queue";

/// A single-channel connection to the job broker.
pub struct Broker {
    channel: Channel,
    consumer: Consumer,
}

impl Broker {
    /// Connect to the broker at `uri`, declare both queues, set prefetch to
    /// 1 (one job in flight at a time, matching the single-threaded
    /// cooperative driver) and start consuming `submission_queue`.
    pub async fn connect(uri: &str) -> Result<Broker> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .chain_err(|| ErrorKind::BrokerConnectFailed)?;
        let channel = connection.create_channel()
            .await
            .chain_err(|| ErrorKind::BrokerConnectFailed)?;

        channel.basic_qos(1, BasicQosOptions::default())
            .await
            .chain_err(|| ErrorKind::BrokerConnectFailed)?;

        channel.queue_declare(SUBMISSION_QUEUE, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .chain_err(|| ErrorKind::BrokerConnectFailed)?;
        channel.queue_declare(RESULT_QUEUE, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .chain_err(|| ErrorKind::BrokerConnectFailed)?;

        let consumer = channel.basic_consume(
            SUBMISSION_QUEUE,
            "judge_worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        ).await.chain_err(|| ErrorKind::BrokerConnectFailed)?;

        Ok(Broker { channel, consumer })
    }

    /// Wait for the next job. Returns `None` when the consumer stream ends,
    /// i.e. the broker closed the channel.
    pub async fn next_job(&mut self) -> Option<Delivery> {
        match self.consumer.next().await {
            Some(Ok((_, delivery))) => Some(delivery),
            Some(Err(e)) => {
                log::error!("error reading next delivery from broker: {}", e);
                None
            }
            None => None,
        }
    }

    /// Acknowledge a delivery after its result has been published.
    pub async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.channel.basic_ack(delivery.delivery_tag, BasicAckOptions::default())
            .await
            .chain_err(|| ErrorKind::BrokerPublishFailed)
    }

    /// Reject a delivery. `requeue` distinguishes a poison message (parsed
    /// but unprocessable; drop it for good) from a transient failure
    /// (publish/ack itself failed; let another worker retry).
    pub async fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<()> {
        self.channel.basic_reject(delivery.delivery_tag, BasicRejectOptions { requeue })
            .await
            .chain_err(|| ErrorKind::BrokerPublishFailed)
    }

    /// Publish a result payload to `result_queue`.
    pub async fn publish_result(&self, payload: &[u8]) -> Result<()> {
        self.channel.basic_publish(
            "",
            RESULT_QUEUE,
            BasicPublishOptions::default(),
            payload.to_vec(),
            BasicProperties::default(),
        ).await.chain_err(|| ErrorKind::BrokerPublishFailed)?;

        Ok(())
    }
}
