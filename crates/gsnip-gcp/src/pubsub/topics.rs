//! Topic administration and publishing snippets.

use super::publisher::{FlowControlSettings, LimitExceededBehavior, Message, PublishSettings, Publisher};
use super::{topic_name, Topic, TopicList, TopicSubscriptionList, SERVICE, V1};
use crate::client::{Empty, GcpClient};
use crate::error::{Context, GcpResult};
use std::io::Write;
use std::time::Duration;

pub async fn create_topic(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<Topic> {
    let path = format!("{}/{}", V1, topic_name(project, topic_id));
    let topic: Topic = client
        .put(SERVICE, &path, &serde_json::json!({}))
        .await
        .context("CreateTopic")?;
    writeln!(w, "Topic created: {}", topic.name)?;
    Ok(topic)
}

/// Return the topic, creating it first if it does not exist.
pub async fn create_topic_if_not_exists(
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<Topic> {
    let path = format!("{}/{}", V1, topic_name(project, topic_id));
    match client.get::<Topic>(SERVICE, &path, &[]).await {
        Ok(topic) => Ok(topic),
        Err(e) if e.is_not_found() => client
            .put(SERVICE, &path, &serde_json::json!({}))
            .await
            .context("CreateTopic"),
        Err(e) => Err(e.with_method("GetTopic")),
    }
}

pub async fn list_topics(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
) -> GcpResult<Vec<Topic>> {
    let path = format!("{}/projects/{}/topics", V1, project);
    let topics = client
        .get_all_pages(SERVICE, &path, &[], |p: TopicList| (p.topics, p.next_page_token))
        .await
        .context("ListTopics")?;
    for t in &topics {
        writeln!(w, "{}", t.name)?;
    }
    Ok(topics)
}

/// Names of the subscriptions attached to a topic.
pub async fn list_topic_subscriptions(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<Vec<String>> {
    let path = format!("{}/{}/subscriptions", V1, topic_name(project, topic_id));
    let subs = client
        .get_all_pages(SERVICE, &path, &[], |p: TopicSubscriptionList| {
            (p.subscriptions, p.next_page_token)
        })
        .await
        .context("ListTopicSubscriptions")?;
    for s in &subs {
        writeln!(w, "{}", s)?;
    }
    Ok(subs)
}

pub async fn delete_topic(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<()> {
    let name = topic_name(project, topic_id);
    let _: Empty = client
        .delete(SERVICE, &format!("{}/{}", V1, name), &[])
        .await
        .context("DeleteTopic")?;
    writeln!(w, "Deleted topic: {}", name)?;
    Ok(())
}

async fn publish_one(
    w: &mut impl Write,
    publisher: &Publisher,
    msg: Message,
) -> GcpResult<String> {
    let result = publisher.publish(msg).await;
    let id = result.get().await?;
    writeln!(w, "Published a message; msg ID: {}", id)?;
    Ok(id)
}

pub async fn publish(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
    msg: &str,
) -> GcpResult<String> {
    let publisher = Publisher::new(client, project, topic_id);
    publish_one(w, &publisher, Message::new(msg)).await
}

/// Publish with explicit batch thresholds: 5000 bytes, 10 messages, 100 ms.
pub async fn publish_with_settings(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
    msg: &[u8],
) -> GcpResult<String> {
    let publisher = Publisher::new(client, project, topic_id).with_settings(PublishSettings {
        byte_threshold: 5000,
        count_threshold: 10,
        delay_threshold: Duration::from_millis(100),
        ..Default::default()
    });
    publish_one(w, &publisher, Message::new(msg)).await
}

/// Publish with a single send worker.
pub async fn publish_single_worker(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
    msg: &[u8],
) -> GcpResult<String> {
    let publisher = Publisher::new(client, project, topic_id).with_settings(PublishSettings {
        num_workers: 1,
        ..Default::default()
    });
    publish_one(w, &publisher, Message::new(msg)).await
}

pub async fn publish_custom_attributes(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<String> {
    let publisher = Publisher::new(client, project, topic_id);
    let msg = Message::new("Hello world!")
        .with_attribute("origin", "rust")
        .with_attribute("username", "gcp");
    let id = publisher.publish(msg).await.get().await?;
    writeln!(w, "Published message with custom attributes; msg ID: {}", id)?;
    Ok(id)
}

/// Publish four messages over two ordering keys.
pub async fn publish_with_ordering_keys(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<()> {
    let publisher = Publisher::new(client, project, topic_id).with_message_ordering(true);
    let messages = [
        ("message1", "key1"),
        ("message2", "key2"),
        ("message3", "key1"),
        ("message4", "key2"),
    ];

    let mut results = Vec::with_capacity(messages.len());
    for (data, key) in messages {
        results.push(publisher.publish(Message::new(data).with_ordering_key(key)).await);
    }
    publisher.stop().await;
    for result in results {
        result.get().await?;
    }
    writeln!(w, "Published 4 messages with ordering keys successfully")?;
    Ok(())
}

/// Publish with an ordering key; on failure unpause the key so later
/// publishes can go through, and return the error.
pub async fn resume_publish_with_ordering_keys(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<()> {
    let publisher = Publisher::new(client, project, topic_id).with_message_ordering(true);
    let key = "some-ordering-key";
    let result = publisher
        .publish(Message::new("Message for a key").with_ordering_key(key))
        .await;
    if let Err(e) = result.get().await {
        publisher.resume_publish(key).await;
        return Err(e);
    }
    writeln!(w, "Published a message with ordering key successfully")?;
    Ok(())
}

/// Publish 1000 messages while keeping at most 100 messages / 10 MiB buffered.
pub async fn publish_with_flow_control(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<usize> {
    let publisher = Publisher::new(client, project, topic_id).with_settings(PublishSettings {
        flow_control: FlowControlSettings {
            max_outstanding_messages: Some(100),
            max_outstanding_bytes: Some(10 * 1024 * 1024),
            limit_exceeded_behavior: LimitExceededBehavior::Block,
        },
        ..Default::default()
    });

    let mut results = Vec::new();
    for i in 0..1000 {
        results.push(publisher.publish(Message::new(format!("message #{}", i))).await);
    }
    publisher.stop().await;

    let mut published = 0usize;
    for result in results {
        result.get().await?;
        published += 1;
    }
    writeln!(w, "Published {} messages with flow control", published)?;
    Ok(published)
}
