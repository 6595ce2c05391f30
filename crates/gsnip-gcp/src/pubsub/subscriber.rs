//! Pull subscriber.
//!
//! [`Subscriber::receive`] pulls batches of messages, hands them to a
//! handler with bounded concurrency, and acks or nacks each one by the
//! handler's [`Reply`]. It runs until the cancellation token fires; a failed
//! pull ends the loop and is returned. A message whose data cannot be decoded
//! is nacked without reaching the handler.

use super::{subscription_name, PubsubMessage, SERVICE, V1};
use crate::client::{Empty, GcpClient};
use crate::error::{Context, GcpResult};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Handler verdict for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ack,
    /// Make the message available for redelivery right away.
    Nack,
}

#[derive(Debug, Clone)]
pub struct ReceiveSettings {
    /// Upper bound on messages pulled and not yet acked or nacked.
    pub max_outstanding_messages: usize,
    /// Handlers running at once.
    pub num_workers: usize,
    /// Wait before pulling again after an empty pull.
    pub idle_wait: Duration,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self {
            max_outstanding_messages: 1000,
            num_workers: 10,
            idle_wait: Duration::from_millis(100),
        }
    }
}

/// A message delivered to a handler, with `data` already decoded.
#[derive(Debug, Clone, Default)]
pub struct ReceivedMessage {
    pub id: String,
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub ordering_key: String,
    pub publish_time: Option<String>,
    pub delivery_attempt: Option<u32>,
    ack_id: String,
}

impl ReceivedMessage {
    pub fn ack_id(&self) -> &str {
        &self.ack_id
    }
}

#[derive(Debug, Deserialize)]
struct WireReceivedMessage {
    #[serde(default, rename = "ackId")]
    ack_id: String,
    #[serde(default)]
    message: PubsubMessage,
    #[serde(default, rename = "deliveryAttempt")]
    delivery_attempt: Option<u32>,
}

impl WireReceivedMessage {
    fn decode(self) -> GcpResult<ReceivedMessage> {
        let data = self.message.decode_data()?;
        Ok(ReceivedMessage {
            id: self.message.message_id.unwrap_or_default(),
            data,
            attributes: self.message.attributes,
            ordering_key: self.message.ordering_key,
            publish_time: self.message.publish_time,
            delivery_attempt: self.delivery_attempt,
            ack_id: self.ack_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default, rename = "receivedMessages")]
    received_messages: Vec<WireReceivedMessage>,
}

pub struct Subscriber<'c> {
    client: &'c GcpClient,
    name: String,
    settings: ReceiveSettings,
}

impl<'c> Subscriber<'c> {
    pub fn new(client: &'c GcpClient, project: &str, sub_id: &str) -> Self {
        Self {
            client,
            name: subscription_name(project, sub_id),
            settings: ReceiveSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ReceiveSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive messages until `cancel` fires.
    ///
    /// Handlers for one pulled batch all finish before the batch is acked
    /// and before cancellation is observed.
    pub async fn receive<F, Fut>(&self, cancel: &CancellationToken, handler: F) -> GcpResult<()>
    where
        F: Fn(ReceivedMessage) -> Fut,
        Fut: Future<Output = Reply>,
    {
        while !cancel.is_cancelled() {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                pulled = self.pull() => pulled?,
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.idle_wait) => continue,
                }
            }

            let replies: Vec<(String, Reply)> = stream::iter(batch)
                .map(|msg| {
                    let ack_id = msg.ack_id.clone();
                    let reply = handler(msg);
                    async move { (ack_id, reply.await) }
                })
                .buffer_unordered(self.settings.num_workers.max(1))
                .collect()
                .await;

            let (acked, nacked): (Vec<_>, Vec<_>) =
                replies.into_iter().partition(|(_, r)| *r == Reply::Ack);
            self.settle(acked.into_iter().map(|(id, _)| id).collect(), Reply::Ack)
                .await;
            self.settle(nacked.into_iter().map(|(id, _)| id).collect(), Reply::Nack)
                .await;
        }
        log::debug!("receive on {} stopped", self.name);
        Ok(())
    }

    async fn pull(&self) -> GcpResult<Vec<ReceivedMessage>> {
        let path = format!("{}/{}:pull", V1, self.name);
        let body = serde_json::json!({
            "maxMessages": self.settings.max_outstanding_messages.clamp(1, 1000)
        });
        let resp: PullResponse = self
            .client
            .post(SERVICE, &path, &body)
            .await
            .context("Pull")?;
        let mut messages = Vec::with_capacity(resp.received_messages.len());
        let mut undecodable = Vec::new();
        for wire in resp.received_messages {
            let ack_id = wire.ack_id.clone();
            match wire.decode() {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    log::warn!("nacking message {} on {}: {}", ack_id, self.name, e);
                    undecodable.push(ack_id);
                }
            }
        }
        self.settle(undecodable, Reply::Nack).await;
        Ok(messages)
    }

    /// Ack, or nack via a zero ack deadline. Failures are logged: the
    /// server redelivers anything left unsettled.
    async fn settle(&self, ack_ids: Vec<String>, reply: Reply) {
        if ack_ids.is_empty() {
            return;
        }
        let (verb, body) = match reply {
            Reply::Ack => ("acknowledge", serde_json::json!({ "ackIds": ack_ids })),
            Reply::Nack => (
                "modifyAckDeadline",
                serde_json::json!({ "ackIds": ack_ids, "ackDeadlineSeconds": 0 }),
            ),
        };
        let path = format!("{}/{}:{}", V1, self.name, verb);
        let result: GcpResult<Empty> = self.client.post(SERVICE, &path, &body).await;
        if let Err(e) = result {
            log::warn!("{} of {} messages on {} failed: {}", verb, ack_ids.len(), self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_message() {
        let wire: WireReceivedMessage = serde_json::from_value(serde_json::json!({
            "ackId": "a1",
            "message": { "data": "aGVsbG8=", "messageId": "42", "attributes": { "k": "v" } },
            "deliveryAttempt": 2
        }))
        .unwrap();
        let msg = wire.decode().unwrap();
        assert_eq!(msg.ack_id(), "a1");
        assert_eq!(msg.id, "42");
        assert_eq!(msg.data, b"hello");
        assert_eq!(msg.attributes.get("k").map(String::as_str), Some("v"));
        assert_eq!(msg.delivery_attempt, Some(2));
    }

    #[test]
    fn default_settings() {
        let s = ReceiveSettings::default();
        assert_eq!(s.max_outstanding_messages, 1000);
        assert_eq!(s.num_workers, 10);
    }
}
