//! Pub/Sub snippets against a mock server.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{client, output, PROJECT};
use gsnip_gcp::pubsub::{
    iam, subscriptions, topics, FlowControlSettings, LimitExceededBehavior, Message,
    PublishSettings, Publisher, Reply, Subscriber,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers `:publish` with one id per message in the request.
struct MessageIds;

impl Respond for MessageIds {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let n = body["messages"].as_array().map(Vec::len).unwrap_or(0);
        let ids: Vec<String> = (0..n).map(|i| format!("id-{}", i)).collect();
        ResponseTemplate::new(200).set_body_json(json!({ "messageIds": ids }))
    }
}

fn topic_path(topic: &str) -> String {
    format!("/v1/projects/{}/topics/{}", PROJECT, topic)
}

fn sub_path(sub: &str) -> String {
    format!("/v1/projects/{}/subscriptions/{}", PROJECT, sub)
}

/// Message counts of the `:publish` calls the server has seen, in order.
async fn publish_batches(server: &MockServer) -> Vec<usize> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with(":publish"))
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["messages"].as_array().map(Vec::len).unwrap_or(0)
        })
        .collect()
}

async fn mount_publish(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("{}:publish", topic_path("t"))))
        .respond_with(MessageIds)
        .mount(server)
        .await;
}

fn backend_error() -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_json(json!({
        "error": { "code": 500, "message": "backend error", "status": "INTERNAL" }
    }))
}

/// Settings where only an explicit flush or a count/byte threshold sends.
fn no_delay_flush() -> PublishSettings {
    PublishSettings {
        delay_threshold: Duration::from_secs(3600),
        ..Default::default()
    }
}

fn decode(data: &Value) -> String {
    String::from_utf8(STANDARD.decode(data.as_str().unwrap_or_default()).unwrap()).unwrap()
}

#[tokio::test]
async fn create_and_delete_topic() {
    let server = MockServer::start().await;
    let name = format!("projects/{}/topics/example-topic", PROJECT);
    Mock::given(method("PUT"))
        .and(path(topic_path("example-topic")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": name })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(topic_path("example-topic")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    topics::create_topic(&mut out, &client, PROJECT, "example-topic")
        .await
        .unwrap();
    topics::delete_topic(&mut out, &client, PROJECT, "example-topic")
        .await
        .unwrap();
    assert_eq!(
        output(out),
        format!("Topic created: {}\nDeleted topic: {}\n", name, name)
    );
}

#[tokio::test]
async fn create_topic_if_not_exists_creates_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(topic_path("t")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Resource not found", "status": "NOT_FOUND" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(topic_path("t")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": format!("projects/{}/topics/t", PROJECT)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let topic = topics::create_topic_if_not_exists(&client, PROJECT, "t")
        .await
        .unwrap();
    assert_eq!(topic.name, format!("projects/{}/topics/t", PROJECT));
}

#[tokio::test]
async fn publish_prints_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:publish", topic_path("t"))))
        .and(body_json(json!({
            "messages": [{ "data": STANDARD.encode("hello world!") }]
        })))
        .respond_with(MessageIds)
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let id = topics::publish(&mut out, &client, PROJECT, "t", "hello world!")
        .await
        .unwrap();
    assert_eq!(id, "id-0");
    assert_eq!(output(out), "Published a message; msg ID: id-0\n");
}

#[tokio::test]
async fn ordering_keys_keep_publish_order_per_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:publish", topic_path("t"))))
        .respond_with(MessageIds)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    topics::publish_with_ordering_keys(&mut out, &client, PROJECT, "t")
        .await
        .unwrap();
    assert_eq!(
        output(out),
        "Published 4 messages with ordering keys successfully\n"
    );

    let mut by_key: Vec<(String, Vec<String>)> = Vec::new();
    for req in server.received_requests().await.unwrap() {
        let body: Value = serde_json::from_slice(&req.body).unwrap();
        let messages = body["messages"].as_array().unwrap();
        let key = messages[0]["orderingKey"].as_str().unwrap().to_string();
        assert!(messages.iter().all(|m| m["orderingKey"] == key.as_str()));
        by_key.push((key, messages.iter().map(|m| decode(&m["data"])).collect()));
    }
    by_key.sort();
    assert_eq!(
        by_key,
        vec![
            ("key1".to_string(), vec!["message1".to_string(), "message3".to_string()]),
            ("key2".to_string(), vec!["message2".to_string(), "message4".to_string()]),
        ]
    );
}

#[tokio::test]
async fn failed_ordered_publish_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:publish", topic_path("t"))))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "bad message", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let err = topics::resume_publish_with_ordering_keys(&mut out, &client, PROJECT, "t")
        .await
        .unwrap_err();
    assert_eq!(err.status, "INVALID_ARGUMENT");
    assert_eq!(err.method.as_deref(), Some("Publish"));
    assert!(out.is_empty());
}

#[tokio::test]
async fn pull_msgs_receives_ten_and_acks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:publish", topic_path("t"))))
        .respond_with(MessageIds)
        .mount(&server)
        .await;

    let received: Vec<Value> = (0..10)
        .map(|i| {
            json!({
                "ackId": format!("ack-{}", i),
                "message": {
                    "data": STANDARD.encode(format!("hello world #{}", i)),
                    "messageId": format!("m-{}", i)
                }
            })
        })
        .collect();
    Mock::given(method("POST"))
        .and(path(format!("{}:pull", sub_path("s"))))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "receivedMessages": received })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:pull", sub_path("s"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:acknowledge", sub_path("s"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let n = subscriptions::pull_msgs(&mut out, &client, PROJECT, "s", "t")
        .await
        .unwrap();
    assert_eq!(n, 10);

    let text = output(out);
    assert_eq!(text.lines().count(), 10);
    for i in 0..10 {
        assert!(text.contains(&format!("Got message: \"hello world #{}\"", i)));
    }
}

#[tokio::test]
async fn pull_error_ends_receive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:pull", sub_path("s"))))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "denied", "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let cancel = CancellationToken::new();
    let mut out = Vec::new();
    let err = subscriptions::pull_msgs_error(&mut out, &client, PROJECT, "s", &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.status, "PERMISSION_DENIED");
    assert_eq!(err.method.as_deref(), Some("Receive"));
}

#[tokio::test]
async fn cancelled_receive_returns_without_pulling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:pull", sub_path("s"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut out = Vec::new();
    subscriptions::pull_msgs_settings(&mut out, &client, PROJECT, "s", &cancel)
        .await
        .unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn create_subscription_uses_twenty_second_deadline() {
    let server = MockServer::start().await;
    let name = format!("projects/{}/subscriptions/s", PROJECT);
    Mock::given(method("PUT"))
        .and(path(sub_path("s")))
        .and(wiremock::matchers::body_partial_json(json!({
            "topic": format!("projects/{}/topics/t", PROJECT),
            "ackDeadlineSeconds": 20
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": name,
            "topic": format!("projects/{}/topics/t", PROJECT),
            "ackDeadlineSeconds": 20
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    subscriptions::create_subscription(&mut out, &client, PROJECT, "s", "t")
        .await
        .unwrap();
    assert_eq!(output(out), format!("Created subscription: {}\n", name));
}

#[tokio::test]
async fn topic_policy_lists_members() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}:getIamPolicy", topic_path("t"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": 1,
            "etag": "BwW=",
            "bindings": [
                { "role": "roles/viewer", "members": ["allUsers"] },
                { "role": "roles/editor", "members": ["group:cloud-logs@google.com"] }
            ]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    iam::get_topic_policy(&mut out, &client, PROJECT, "t")
        .await
        .unwrap();
    assert_eq!(
        output(out),
        "role: roles/viewer, member: allUsers\nrole: roles/editor, member: group:cloud-logs@google.com\n"
    );
}

#[tokio::test]
async fn lone_message_is_sent_after_delay_threshold() {
    let server = MockServer::start().await;
    mount_publish(&server).await;

    let client = client(&server);
    let publisher = Publisher::new(&client, PROJECT, "t");
    let _result = publisher.publish(Message::new("lone")).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(publish_batches(&server).await, vec![1]);
}

#[tokio::test]
async fn dropping_publisher_sends_buffered_messages() {
    let server = MockServer::start().await;
    mount_publish(&server).await;

    let client = client(&server);
    let publisher = Publisher::new(&client, PROJECT, "t").with_settings(no_delay_flush());
    let result = publisher.publish(Message::new("left behind")).await;
    drop(result);
    drop(publisher);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(publish_batches(&server).await, vec![1]);
}

#[tokio::test]
async fn signal_error_rejects_until_buffer_drains() {
    let server = MockServer::start().await;
    mount_publish(&server).await;

    let client = client(&server);
    let publisher = Publisher::new(&client, PROJECT, "t").with_settings(PublishSettings {
        flow_control: FlowControlSettings {
            max_outstanding_messages: Some(1),
            max_outstanding_bytes: None,
            limit_exceeded_behavior: LimitExceededBehavior::SignalError,
        },
        ..no_delay_flush()
    });

    let first = publisher.publish(Message::new("one")).await;
    let err = publisher
        .publish(Message::new("two"))
        .await
        .get()
        .await
        .unwrap_err();
    assert_eq!(err.status, "RESOURCE_EXHAUSTED");
    assert!(publish_batches(&server).await.is_empty());

    publisher.stop().await;
    assert_eq!(first.get().await.unwrap(), "id-0");
    let third = publisher.publish(Message::new("three")).await;
    assert_eq!(third.get().await.unwrap(), "id-0");
    assert_eq!(publish_batches(&server).await, vec![1, 1]);
}

#[tokio::test]
async fn block_sends_buffer_before_accepting() {
    let server = MockServer::start().await;
    mount_publish(&server).await;

    let client = client(&server);
    let publisher = Publisher::new(&client, PROJECT, "t").with_settings(PublishSettings {
        flow_control: FlowControlSettings {
            max_outstanding_messages: Some(2),
            max_outstanding_bytes: None,
            limit_exceeded_behavior: LimitExceededBehavior::Block,
        },
        ..no_delay_flush()
    });

    let mut results = Vec::new();
    for i in 0..3 {
        results.push(publisher.publish(Message::new(format!("m{}", i))).await);
    }
    assert_eq!(publish_batches(&server).await, vec![2]);

    publisher.stop().await;
    for result in results {
        result.get().await.unwrap();
    }
    assert_eq!(publish_batches(&server).await, vec![2, 1]);
}

#[tokio::test]
async fn resume_publish_unpauses_ordering_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:publish", topic_path("t"))))
        .respond_with(backend_error())
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_publish(&server).await;

    let client = client(&server);
    let publisher = Publisher::new(&client, PROJECT, "t")
        .with_message_ordering(true)
        .with_settings(no_delay_flush());
    let keyed = |data: &str| Message::new(data).with_ordering_key("k");

    let err = publisher.publish(keyed("a")).await.get().await.unwrap_err();
    assert_eq!(err.method.as_deref(), Some("Publish"));

    let paused = publisher.publish(keyed("b")).await.get().await.unwrap_err();
    assert_eq!(paused.status, "FAILED_PRECONDITION");

    publisher.resume_publish("k").await;
    let id = publisher.publish(keyed("c")).await.get().await.unwrap();
    assert_eq!(id, "id-0");
    assert_eq!(publish_batches(&server).await, vec![1, 1]);
}

#[tokio::test]
async fn failed_key_fails_messages_buffered_during_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:publish", topic_path("t"))))
        .respond_with(backend_error().set_delay(Duration::from_millis(300)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_publish(&server).await;

    let client = client(&server);
    let publisher = Publisher::new(&client, PROJECT, "t")
        .with_message_ordering(true)
        .with_settings(PublishSettings {
            delay_threshold: Duration::from_millis(20),
            ..Default::default()
        });

    let first = publisher
        .publish(Message::new("first").with_ordering_key("k"))
        .await;
    // The delay timer has sent "first" and the server is still answering.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = publisher
        .publish(Message::new("second").with_ordering_key("k"))
        .await;

    assert_eq!(first.get().await.unwrap_err().status, "INTERNAL");
    assert_eq!(second.get().await.unwrap_err().status, "FAILED_PRECONDITION");
    assert_eq!(publish_batches(&server).await, vec![1]);
}

#[tokio::test]
async fn nack_sets_zero_ack_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:pull", sub_path("s"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "receivedMessages": [{
                "ackId": "ack-1",
                "message": { "data": STANDARD.encode("retry me"), "messageId": "m-1" }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:modifyAckDeadline", sub_path("s"))))
        .and(body_json(json!({ "ackIds": ["ack-1"], "ackDeadlineSeconds": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:acknowledge", sub_path("s"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let cancel = CancellationToken::new();
    Subscriber::new(&client, PROJECT, "s")
        .receive(&cancel, |_msg| {
            cancel.cancel();
            async { Reply::Nack }
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn undecodable_message_is_nacked_and_receive_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:pull", sub_path("s"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "receivedMessages": [
                { "ackId": "ack-bad", "message": { "data": "%%%not base64", "messageId": "m-1" } },
                { "ackId": "ack-good", "message": { "data": STANDARD.encode("ok"), "messageId": "m-2" } }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:modifyAckDeadline", sub_path("s"))))
        .and(body_json(json!({ "ackIds": ["ack-bad"], "ackDeadlineSeconds": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:acknowledge", sub_path("s"))))
        .and(body_json(json!({ "ackIds": ["ack-good"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let cancel = CancellationToken::new();
    let seen = RefCell::new(Vec::new());
    Subscriber::new(&client, PROJECT, "s")
        .receive(&cancel, |msg| {
            seen.borrow_mut().push(msg.data);
            cancel.cancel();
            async { Reply::Ack }
        })
        .await
        .unwrap();
    assert_eq!(seen.into_inner(), vec![b"ok".to_vec()]);
}

#[tokio::test]
async fn update_push_endpoint_prints_updated_config() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(sub_path("s")))
        .and(body_json(json!({
            "subscription": { "pushConfig": { "pushEndpoint": "https://example.com/push" } },
            "updateMask": "pushConfig"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": format!("projects/{}/subscriptions/s", PROJECT),
            "topic": format!("projects/{}/topics/t", PROJECT),
            "ackDeadlineSeconds": 10,
            "pushConfig": { "pushEndpoint": "https://example.com/push" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    subscriptions::update_push_endpoint(&mut out, &client, PROJECT, "s", "https://example.com/push")
        .await
        .unwrap();
    assert_eq!(
        output(out),
        format!(
            "Updated subscription config: {{\"name\":\"projects/{p}/subscriptions/s\",\
             \"topic\":\"projects/{p}/topics/t\",\"ackDeadlineSeconds\":10,\
             \"pushConfig\":{{\"pushEndpoint\":\"https://example.com/push\"}},\
             \"enableMessageOrdering\":false}}\n",
            p = PROJECT
        )
    );
}
