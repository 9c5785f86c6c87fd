use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::Subject;
use super::model::{Notification, NotificationStream};

const LOCAL_CAPACITY: usize = 1024;

#[async_trait]
pub trait EventService {
    async fn publish(&self, subject: &Subject<'_>, noti: &Notification) -> super::Result<()>;

    async fn subscribe(&self, subject: &Subject<'_>) -> super::Result<NotificationStream>;
}

#[derive(Clone)]
pub struct NatsEventService {
    pubsub: async_nats::Client,
}

impl NatsEventService {
    pub fn new(pubsub: async_nats::Client) -> Self {
        Self { pubsub }
    }
}

#[async_trait]
impl EventService for NatsEventService {
    async fn publish(&self, subject: &Subject<'_>, noti: &Notification) -> super::Result<()> {
        let payload = serde_json::to_vec(noti)?;
        self.pubsub.publish(subject, payload.into()).await?;
        Ok(())
    }

    async fn subscribe(&self, subject: &Subject<'_>) -> super::Result<NotificationStream> {
        let subscriber = self.pubsub.subscribe(subject).await?;
        debug!("Subscribed to {subject}");

        let stream = subscriber.filter_map(|msg| async move {
            match serde_json::from_slice::<Notification>(&msg.payload) {
                Ok(noti) => Some(noti),
                Err(e) => {
                    warn!("Failed to deserialize notification on {}: {e:?}", msg.subject);
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Single-process bus used when no NATS server is configured.
#[derive(Clone)]
pub struct LocalEventService {
    tx: broadcast::Sender<(String, Notification)>,
}

impl LocalEventService {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for LocalEventService {
    fn default() -> Self {
        Self::new(LOCAL_CAPACITY)
    }
}

#[async_trait]
impl EventService for LocalEventService {
    async fn publish(&self, subject: &Subject<'_>, noti: &Notification) -> super::Result<()> {
        // no receivers is not an error, nobody is connected yet
        if self.tx.send((subject.to_string(), noti.clone())).is_err() {
            debug!("No subscribers on {subject}");
        }
        Ok(())
    }

    async fn subscribe(&self, subject: &Subject<'_>) -> super::Result<NotificationStream> {
        let rx = self.tx.subscribe();
        let subject = subject.to_string();

        let stream = futures::stream::unfold((rx, subject), |(mut rx, subject)| async move {
            loop {
                match rx.recv().await {
                    Ok((s, noti)) if s == subject => return Some((noti, (rx, subject))),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(n)) => {
                        warn!("Subscriber of {subject} skipped {n} notifications");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
