//! Subscription administration and receive snippets.

use super::publisher::{Message, Publisher};
use super::subscriber::{ReceiveSettings, Reply, Subscriber};
use super::{subscription_name, topic_name, PushConfig, Subscription, SubscriptionList, SERVICE, V1};
use crate::client::{Empty, GcpClient};
use crate::error::{Context, GcpResult};
use std::cell::{Cell, RefCell};
use std::io::Write;
use tokio_util::sync::CancellationToken;

pub async fn list_subscriptions(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
) -> GcpResult<Vec<Subscription>> {
    let path = format!("{}/projects/{}/subscriptions", V1, project);
    let subs = client
        .get_all_pages(SERVICE, &path, &[], |p: SubscriptionList| {
            (p.subscriptions, p.next_page_token)
        })
        .await
        .context("ListSubscriptions")?;
    for s in &subs {
        writeln!(w, "{}", s.name)?;
    }
    Ok(subs)
}

async fn insert_subscription(
    client: &GcpClient,
    project: &str,
    sub_id: &str,
    sub: &Subscription,
) -> GcpResult<Subscription> {
    let path = format!("{}/{}", V1, subscription_name(project, sub_id));
    client.put(SERVICE, &path, sub).await.context("CreateSubscription")
}

/// Pull subscription with a 20 second ack deadline.
pub async fn create_subscription(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
    topic_id: &str,
) -> GcpResult<Subscription> {
    let sub = Subscription {
        topic: topic_name(project, topic_id),
        ack_deadline_seconds: 20,
        ..Default::default()
    };
    let created = insert_subscription(client, project, sub_id, &sub).await?;
    writeln!(w, "Created subscription: {}", created.name)?;
    Ok(created)
}

/// Push subscription delivering to `endpoint`, e.g.
/// `https://my-test-project.appspot.com/push`.
pub async fn create_push_subscription(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
    topic_id: &str,
    endpoint: &str,
) -> GcpResult<Subscription> {
    let sub = Subscription {
        topic: topic_name(project, topic_id),
        ack_deadline_seconds: 10,
        push_config: Some(PushConfig {
            push_endpoint: endpoint.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let created = insert_subscription(client, project, sub_id, &sub).await?;
    writeln!(w, "Created subscription: {}", created.name)?;
    Ok(created)
}

pub async fn update_push_endpoint(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
    endpoint: &str,
) -> GcpResult<Subscription> {
    let path = format!("{}/{}", V1, subscription_name(project, sub_id));
    let body = serde_json::json!({
        "subscription": { "pushConfig": { "pushEndpoint": endpoint } },
        "updateMask": "pushConfig"
    });
    let updated: Subscription = client
        .patch(SERVICE, &path, &body, &[])
        .await
        .context("UpdateSubscription")?;
    writeln!(
        w,
        "Updated subscription config: {}",
        serde_json::to_string(&updated)?
    )?;
    Ok(updated)
}

pub async fn delete_subscription(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
) -> GcpResult<()> {
    let path = format!("{}/{}", V1, subscription_name(project, sub_id));
    let _: Empty = client
        .delete(SERVICE, &path, &[])
        .await
        .context("DeleteSubscription")?;
    writeln!(w, "Subscription deleted.")?;
    Ok(())
}

/// Output shared by handlers that run concurrently on the receiving task.
struct Printer<'a, W: Write> {
    w: RefCell<&'a mut W>,
    error: RefCell<Option<std::io::Error>>,
}

impl<'a, W: Write> Printer<'a, W> {
    fn new(w: &'a mut W) -> Self {
        Self {
            w: RefCell::new(w),
            error: RefCell::new(None),
        }
    }

    /// Print the message; a message that could not be printed is nacked.
    fn got_message(&self, data: &[u8]) -> Reply {
        let mut w = self.w.borrow_mut();
        match writeln!(w, "Got message: {:?}", String::from_utf8_lossy(data)) {
            Ok(()) => Reply::Ack,
            Err(e) => {
                self.error.borrow_mut().get_or_insert(e);
                Reply::Nack
            }
        }
    }

    fn finish(self) -> GcpResult<()> {
        match self.error.into_inner() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Publish ten messages, then receive until ten have been handled.
pub async fn pull_msgs(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
    topic_id: &str,
) -> GcpResult<usize> {
    let publisher = Publisher::new(client, project, topic_id);
    let mut results = Vec::with_capacity(10);
    for i in 0..10 {
        results.push(publisher.publish(Message::new(format!("hello world #{}", i))).await);
    }
    for result in results {
        result.get().await?;
    }

    let printer = Printer::new(w);
    let received = Cell::new(0usize);
    let cancel = CancellationToken::new();
    {
        let (printer, received, cancel) = (&printer, &received, &cancel);
        Subscriber::new(client, project, sub_id)
            .receive(cancel, move |msg| async move {
                let reply = printer.got_message(&msg.data);
                received.set(received.get() + 1);
                if received.get() == 10 {
                    cancel.cancel();
                }
                reply
            })
            .await
            .context("Receive")?;
    }
    printer.finish()?;
    Ok(received.get())
}

/// Receive with at most ten messages outstanding, until `cancel` fires.
pub async fn pull_msgs_settings(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
    cancel: &CancellationToken,
) -> GcpResult<()> {
    let printer = Printer::new(w);
    let settings = ReceiveSettings {
        max_outstanding_messages: 10,
        ..Default::default()
    };
    {
        let printer = &printer;
        Subscriber::new(client, project, sub_id)
            .with_settings(settings)
            .receive(cancel, move |msg| async move { printer.got_message(&msg.data) })
            .await
            .context("Receive")?;
    }
    printer.finish()
}

/// Receive until `cancel` fires; an error from the service ends the receive
/// and is returned once outstanding handlers finish.
pub async fn pull_msgs_error(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
    cancel: &CancellationToken,
) -> GcpResult<()> {
    let printer = Printer::new(w);
    {
        let printer = &printer;
        Subscriber::new(client, project, sub_id)
            .receive(cancel, move |msg| async move { printer.got_message(&msg.data) })
            .await
            .context("Receive")?;
    }
    printer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_quotes_payload() {
        let mut out = Vec::new();
        let printer = Printer::new(&mut out);
        assert_eq!(printer.got_message(b"hello \"world\""), Reply::Ack);
        printer.finish().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Got message: \"hello \\\"world\\\"\"\n"
        );
    }
}
