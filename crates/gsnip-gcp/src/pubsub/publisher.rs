//! Batching publisher.
//!
//! Messages are buffered and sent with `topics.publish` once a batch
//! threshold is reached (count or bytes), when a timer armed by the first
//! buffered message reaches the delay threshold, when [`PublishResult::get`]
//! is awaited, or on [`Publisher::stop`]. Dropping the publisher sends
//! whatever is still buffered.
//!
//! With message ordering enabled, messages sharing an ordering key are sent
//! in publish order, one batch at a time. A failed send pauses its key: later
//! publishes with that key fail until [`Publisher::resume_publish`].

use super::{topic_name, PubsubMessage, SERVICE, V1};
use crate::client::GcpClient;
use crate::error::{Context, GcpError, GcpResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, Mutex};

// ── Settings ────────────────────────────────────────────────────────────

/// What `publish` does when flow control limits would be exceeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LimitExceededBehavior {
    /// Send everything buffered first, then accept the message.
    Block,
    /// Fail the message with `RESOURCE_EXHAUSTED`.
    SignalError,
    /// No limit.
    #[default]
    Ignore,
}

/// Limits on messages buffered but not yet sent.
#[derive(Debug, Clone, Default)]
pub struct FlowControlSettings {
    pub max_outstanding_messages: Option<usize>,
    pub max_outstanding_bytes: Option<usize>,
    pub limit_exceeded_behavior: LimitExceededBehavior,
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    /// Send a batch once its oldest message is this old.
    pub delay_threshold: Duration,
    /// Send a batch once it holds this many messages.
    pub count_threshold: usize,
    /// Send a batch once it holds this many bytes.
    pub byte_threshold: usize,
    /// Concurrent `topics.publish` calls per flush (one per ordering key).
    pub num_workers: usize,
    pub flow_control: FlowControlSettings,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            delay_threshold: Duration::from_millis(10),
            count_threshold: 100,
            byte_threshold: 1_000_000,
            num_workers: 4,
            flow_control: FlowControlSettings::default(),
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────────

/// A message to publish.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub ordering_key: String,
}

impl Message {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_ordering_key(mut self, key: &str) -> Self {
        self.ordering_key = key.to_string();
        self
    }

    /// Bytes counted against batch and flow control limits.
    pub fn size(&self) -> usize {
        self.data.len()
            + self.ordering_key.len()
            + self
                .attributes
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }

    fn into_wire(self) -> PubsubMessage {
        PubsubMessage {
            data: STANDARD.encode(&self.data),
            attributes: self.attributes,
            ordering_key: self.ordering_key,
            ..Default::default()
        }
    }
}

struct Pending {
    wire: PubsubMessage,
    size: usize,
    tx: oneshot::Sender<GcpResult<String>>,
}

impl Pending {
    fn resolve(self, result: GcpResult<String>) {
        // The caller may have dropped its result handle.
        let _ = self.tx.send(result);
    }
}

#[derive(Default)]
struct Bundle {
    pending: Vec<Pending>,
    bytes: usize,
    // Bumped each time the buffer is taken. A delay timer only flushes the
    // generation it was armed for.
    generation: u64,
    paused: HashSet<String>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default, rename = "messageIds")]
    message_ids: Vec<String>,
}

fn paused_error(key: &str) -> GcpError {
    GcpError::new(
        SERVICE,
        400,
        "FAILED_PRECONDITION",
        &format!("ordering key {} is paused; call resume_publish", key),
    )
}

#[derive(Default)]
struct State {
    bundle: Mutex<Bundle>,
    // Serializes flushes so batches for one key never overlap.
    send_lock: Mutex<()>,
}

/// Everything a flush needs. Cloned into delay timers and result handles.
#[derive(Clone)]
struct Batcher {
    client: GcpClient,
    topic: String,
    settings: PublishSettings,
    ordered: bool,
    state: Arc<State>,
}

// ── Publisher ───────────────────────────────────────────────────────────

pub struct Publisher {
    batcher: Batcher,
}

impl Publisher {
    pub fn new(client: &GcpClient, project: &str, topic_id: &str) -> Self {
        Self {
            batcher: Batcher {
                client: client.clone(),
                topic: topic_name(project, topic_id),
                settings: PublishSettings::default(),
                ordered: false,
                state: Arc::new(State::default()),
            },
        }
    }

    pub fn with_settings(mut self, settings: PublishSettings) -> Self {
        self.batcher.settings = settings;
        self
    }

    pub fn with_message_ordering(mut self, enable: bool) -> Self {
        self.batcher.ordered = enable;
        self
    }

    /// Full topic name, `projects/{p}/topics/{t}`.
    pub fn topic(&self) -> &str {
        &self.batcher.topic
    }

    /// Buffer a message. The returned handle resolves to the server-assigned
    /// message ID once the message's batch has been sent.
    pub async fn publish(&self, msg: Message) -> PublishResult {
        let b = &self.batcher;
        if !msg.ordering_key.is_empty() && !b.ordered {
            return PublishResult::failed(GcpError::invalid_argument(
                SERVICE,
                "ordering key set on a publisher without message ordering",
            ));
        }

        let size = msg.size();
        let key = msg.ordering_key.clone();

        let must_drain = {
            let bundle = b.state.bundle.lock().await;
            if !key.is_empty() && bundle.paused.contains(&key) {
                return PublishResult::failed(paused_error(&key));
            }
            if b.exceeds_flow_control(&bundle, size) {
                match b.settings.flow_control.limit_exceeded_behavior {
                    LimitExceededBehavior::SignalError => {
                        return PublishResult::failed(GcpError::new(
                            SERVICE,
                            429,
                            "RESOURCE_EXHAUSTED",
                            "publish flow control limits exceeded",
                        ))
                    }
                    LimitExceededBehavior::Block => true,
                    LimitExceededBehavior::Ignore => false,
                }
            } else {
                false
            }
        };
        if must_drain {
            b.flush().await;
        }

        let (tx, rx) = oneshot::channel();
        let (ready, arm) = {
            let mut bundle = b.state.bundle.lock().await;
            // The drain above may have paused the key.
            if !key.is_empty() && bundle.paused.contains(&key) {
                return PublishResult::failed(paused_error(&key));
            }
            let arm = bundle.pending.is_empty().then_some(bundle.generation);
            bundle.bytes += size;
            bundle.pending.push(Pending {
                wire: msg.into_wire(),
                size,
                tx,
            });
            (b.batch_ready(&bundle), arm)
        };
        if ready {
            b.flush().await;
        } else if let Some(generation) = arm {
            b.arm_timer(generation);
        }

        PublishResult {
            rx,
            batcher: Some(b.clone()),
        }
    }

    /// Unpause an ordering key after a failed publish.
    pub async fn resume_publish(&self, ordering_key: &str) {
        self.batcher.state.bundle.lock().await.paused.remove(ordering_key);
    }

    /// Send everything buffered and wait for the sends to finish.
    pub async fn stop(&self) {
        self.batcher.flush().await;
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        // Messages still buffered go out on the runtime after the publisher is gone.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let batcher = self.batcher.clone();
            handle.spawn(async move { batcher.flush().await });
        }
    }
}

impl Batcher {
    fn exceeds_flow_control(&self, bundle: &Bundle, incoming: usize) -> bool {
        let fc = &self.settings.flow_control;
        let too_many = fc
            .max_outstanding_messages
            .is_some_and(|max| bundle.pending.len() + 1 > max);
        let too_big = fc
            .max_outstanding_bytes
            .is_some_and(|max| bundle.bytes + incoming > max);
        too_many || too_big
    }

    fn batch_ready(&self, bundle: &Bundle) -> bool {
        bundle.pending.len() >= self.settings.count_threshold
            || bundle.bytes >= self.settings.byte_threshold
    }

    /// Flush buffer `generation` once the delay threshold has passed, unless
    /// a count, byte or explicit flush took it first.
    fn arm_timer(&self, generation: u64) {
        let batcher = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(batcher.settings.delay_threshold).await;
            batcher.flush_generation(Some(generation)).await;
        });
    }

    async fn flush(&self) {
        self.flush_generation(None).await;
    }

    async fn flush_generation(&self, generation: Option<u64>) {
        let _sending = self.state.send_lock.lock().await;
        let pending = {
            let mut bundle = self.state.bundle.lock().await;
            if generation.is_some_and(|g| g != bundle.generation) {
                return;
            }
            bundle.generation = bundle.generation.wrapping_add(1);
            bundle.bytes = 0;
            std::mem::take(&mut bundle.pending)
        };
        if pending.is_empty() {
            return;
        }

        let groups = group_by_key(pending, |p| p.wire.ordering_key.as_str());
        let failed: Vec<String> = stream::iter(groups)
            .map(|(key, msgs)| self.send_group(key, msgs))
            .buffer_unordered(self.settings.num_workers.max(1))
            .filter_map(|k| async move { k })
            .collect()
            .await;

        if failed.is_empty() {
            return;
        }
        let mut bundle = self.state.bundle.lock().await;
        for key in failed {
            log::warn!("pausing ordering key {} on {}", key, self.topic);
            // Messages buffered for the key while its batch was in flight.
            let (stale, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut bundle.pending)
                .into_iter()
                .partition(|p| p.wire.ordering_key == key);
            bundle.pending = keep;
            for p in stale {
                bundle.bytes = bundle.bytes.saturating_sub(p.size);
                p.resolve(Err(paused_error(&key)));
            }
            bundle.paused.insert(key);
        }
    }

    /// Send one key's messages in order. Returns the key if it must pause.
    async fn send_group(&self, key: String, msgs: Vec<Pending>) -> Option<String> {
        let ordered = self.ordered && !key.is_empty();
        let mut batches = split_batches(
            msgs,
            |p| p.size,
            self.settings.count_threshold.max(1),
            self.settings.byte_threshold.max(1),
        )
        .into_iter();

        while let Some(batch) = batches.next() {
            let wire: Vec<&PubsubMessage> = batch.iter().map(|p| &p.wire).collect();
            match self.send_batch(&wire).await {
                Ok(ids) if ids.len() == batch.len() => {
                    for (p, id) in batch.into_iter().zip(ids) {
                        p.resolve(Ok(id));
                    }
                }
                Ok(ids) => {
                    let err = GcpError::from_str(
                        SERVICE,
                        &format!("publish returned {} ids for {} messages", ids.len(), batch.len()),
                    );
                    batch.into_iter().for_each(|p| p.resolve(Err(err.clone())));
                }
                Err(err) => {
                    batch.into_iter().for_each(|p| p.resolve(Err(err.clone())));
                    if ordered {
                        batches.flatten().for_each(|p| p.resolve(Err(err.clone())));
                        return Some(key);
                    }
                }
            }
        }
        None
    }

    async fn send_batch(&self, messages: &[&PubsubMessage]) -> GcpResult<Vec<String>> {
        let path = format!("{}/{}:publish", V1, self.topic);
        let body = serde_json::json!({ "messages": messages });
        let resp: PublishResponse = self
            .client
            .post(SERVICE, &path, &body)
            .await
            .context("Publish")?;
        log::debug!("published {} messages to {}", resp.message_ids.len(), self.topic);
        Ok(resp.message_ids)
    }
}

/// Handle to the outcome of one [`Publisher::publish`].
pub struct PublishResult {
    rx: oneshot::Receiver<GcpResult<String>>,
    batcher: Option<Batcher>,
}

impl PublishResult {
    fn failed(err: GcpError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self { rx, batcher: None }
    }

    /// Wait for the message ID, sending the message's batch if it is still
    /// buffered.
    pub async fn get(mut self) -> GcpResult<String> {
        if let Some(batcher) = &self.batcher {
            match self.rx.try_recv() {
                Ok(result) => return result,
                Err(TryRecvError::Empty) => batcher.flush().await,
                Err(TryRecvError::Closed) => return Err(GcpError::cancelled(SERVICE)),
            }
        }
        self.rx.await.map_err(|_| GcpError::cancelled(SERVICE))?
    }
}

// ── Batching ────────────────────────────────────────────────────────────

/// Group items by key, keeping first-seen key order and item order.
fn group_by_key<T>(items: Vec<T>, key: impl Fn(&T) -> &str) -> Vec<(String, Vec<T>)> {
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match groups.iter().position(|(g, _)| g == k) {
            Some(i) => groups[i].1.push(item),
            None => groups.push((k.to_string(), vec![item])),
        }
    }
    groups
}

/// Split items into consecutive batches bounded by count and bytes. An item
/// larger than `max_bytes` gets a batch of its own.
fn split_batches<T>(
    items: Vec<T>,
    size: impl Fn(&T) -> usize,
    max_count: usize,
    max_bytes: usize,
) -> Vec<Vec<T>> {
    let mut batches: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut bytes = 0usize;
    for item in items {
        let s = size(&item);
        if !current.is_empty() && (current.len() >= max_count || bytes + s > max_bytes) {
            batches.push(std::mem::take(&mut current));
            bytes = 0;
        }
        bytes += s;
        current.push(item);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_keep_publish_order() {
        let items = vec![("a", 1), ("b", 2), ("a", 3), ("", 4), ("b", 5)];
        let groups = group_by_key(items, |(k, _)| k);
        let keys: Vec<&str> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", ""]);
        let a: Vec<i32> = groups[0].1.iter().map(|(_, n)| *n).collect();
        assert_eq!(a, vec![1, 3]);
    }

    #[test]
    fn batches_respect_count_and_bytes() {
        let by_count = split_batches((0..25).collect(), |_| 1, 10, 1000);
        let lens: Vec<usize> = by_count.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![10, 10, 5]);

        let by_bytes = split_batches(vec![3000, 3000, 1000, 6000], |s| *s, 10, 5000);
        assert_eq!(by_bytes, vec![vec![3000], vec![3000, 1000], vec![6000]]);
    }

    #[test]
    fn message_size_counts_attributes_and_key() {
        let msg = Message::new("hello")
            .with_attribute("origin", "rust")
            .with_ordering_key("k1");
        assert_eq!(msg.size(), 5 + 2 + 6 + 4);
    }

    #[tokio::test]
    async fn failed_result_resolves_without_publisher() {
        let err = GcpError::cancelled(SERVICE);
        let result = PublishResult::failed(err);
        assert_eq!(result.get().await.unwrap_err().status, "CANCELLED");
    }
}
