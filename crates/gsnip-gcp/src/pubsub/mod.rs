//! Cloud Pub/Sub snippets.
//!
//! API base: `https://pubsub.googleapis.com/v1`. Point `PUBSUB_EMULATOR_HOST`
//! at a local emulator to run them without credentials.
//!
//! The REST surface has no client-side batching or streaming pull, so the
//! [`publisher`] and [`subscriber`] modules carry the small amount of flow
//! logic the snippets rely on.

pub mod iam;
pub mod publisher;
pub mod subscriber;
pub mod subscriptions;
pub mod topics;

pub use publisher::{FlowControlSettings, LimitExceededBehavior, Message, PublishResult, PublishSettings, Publisher};
pub use subscriber::{ReceiveSettings, ReceivedMessage, Reply, Subscriber};

use crate::error::{GcpError, GcpResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub(crate) const SERVICE: &str = "pubsub";
pub(crate) const V1: &str = "/v1";

pub(crate) fn topic_name(project: &str, topic_id: &str) -> String {
    format!("projects/{}/topics/{}", project, topic_id)
}

pub(crate) fn subscription_name(project: &str, sub_id: &str) -> String {
    format!("projects/{}/subscriptions/{}", project, sub_id)
}

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(
        default,
        rename = "messageRetentionDuration",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_retention_duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PushConfig {
    #[serde(default, rename = "pushEndpoint")]
    pub push_endpoint: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default, rename = "ackDeadlineSeconds")]
    pub ack_deadline_seconds: u32,
    #[serde(default, rename = "pushConfig", skip_serializing_if = "Option::is_none")]
    pub push_config: Option<PushConfig>,
    #[serde(default, rename = "enableMessageOrdering")]
    pub enable_message_ordering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// A message as it travels over the wire: `data` is base64.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PubsubMessage {
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    #[serde(default, rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, rename = "publishTime", skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
    #[serde(default, rename = "orderingKey", skip_serializing_if = "String::is_empty")]
    pub ordering_key: String,
}

impl PubsubMessage {
    pub fn decode_data(&self) -> GcpResult<Vec<u8>> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| GcpError::invalid_argument(SERVICE, &format!("message data is not base64: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicList {
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default, rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionList {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(default, rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// `topics.subscriptions.list` returns names only.
#[derive(Debug, Deserialize)]
pub(crate) struct TopicSubscriptionList {
    #[serde(default)]
    pub subscriptions: Vec<String>,
    #[serde(default, rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_omits_empty_ordering_key() {
        let msg = PubsubMessage {
            data: STANDARD.encode("hi"),
            ..Default::default()
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v, serde_json::json!({ "data": "aGk=" }));
        assert_eq!(msg.decode_data().unwrap(), b"hi");
    }

    #[test]
    fn bad_base64_is_an_error() {
        let msg = PubsubMessage {
            data: "***".into(),
            ..Default::default()
        };
        assert_eq!(msg.decode_data().unwrap_err().status, "INVALID_ARGUMENT");
    }
}
