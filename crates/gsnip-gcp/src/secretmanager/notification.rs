//! Secret change events delivered through a Pub/Sub push subscription.
//!
//! A secret created with topics publishes `SECRET_CREATE`, `SECRET_UPDATE`,
//! `SECRET_VERSION_ADD` and similar events. The secret's name is in the
//! `secretId` attribute and the message data holds the new secret metadata.

use super::SERVICE;
use crate::error::{GcpError, GcpResult};
use crate::pubsub::PubsubMessage;
use serde::Deserialize;
use std::io::Write;

#[derive(Debug, Deserialize)]
struct PushBody {
    message: PubsubMessage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventNotification {
    pub secret_id: String,
    pub event_type: String,
    pub data: Vec<u8>,
}

impl EventNotification {
    /// Parse the JSON body Pub/Sub POSTs to a push endpoint.
    pub fn from_push_body(body: &str) -> GcpResult<Self> {
        let push: PushBody = serde_json::from_str(body).map_err(|e| {
            GcpError::invalid_argument(SERVICE, &format!("not a Pub/Sub push body: {}", e))
        })?;
        Self::from_message(push.message)
    }

    pub fn from_message(message: PubsubMessage) -> GcpResult<Self> {
        let data = message.decode_data()?;
        let attr = |key: &str| {
            message.attributes.get(key).cloned().ok_or_else(|| {
                GcpError::invalid_argument(SERVICE, &format!("missing {} attribute", key))
            })
        };
        Ok(Self {
            secret_id: attr("secretId")?,
            event_type: attr("eventType")?,
            data,
        })
    }

    pub fn describe(&self) -> String {
        format!(
            "Received {} for {}. New metadata: {:?}.",
            self.event_type,
            self.secret_id,
            String::from_utf8_lossy(&self.data)
        )
    }
}

/// Decode a push body and print what changed.
pub fn consume_event_notification(w: &mut impl Write, body: &str) -> GcpResult<EventNotification> {
    let event = EventNotification::from_push_body(body)?;
    writeln!(w, "{}", event.describe())?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "message": {
            "attributes": { "secretId": "projects/p/secrets/s", "eventType": "SECRET_UPDATE" },
            "data": "aGVsbG8h",
            "messageId": "1"
        },
        "subscription": "projects/p/subscriptions/sub"
    }"#;

    #[test]
    fn prints_event() {
        let mut out = Vec::new();
        let event = consume_event_notification(&mut out, BODY).unwrap();
        assert_eq!(event.event_type, "SECRET_UPDATE");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Received SECRET_UPDATE for projects/p/secrets/s. New metadata: \"hello!\".\n"
        );
    }

    #[test]
    fn missing_attribute_is_invalid() {
        let body = r#"{"message":{"attributes":{"eventType":"SECRET_UPDATE"},"data":""}}"#;
        let err = EventNotification::from_push_body(body).unwrap_err();
        assert_eq!(err.status, "INVALID_ARGUMENT");
        assert!(err.message.contains("secretId"));
    }
}
