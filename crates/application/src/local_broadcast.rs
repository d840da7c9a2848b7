//! 进程内的房间级消息总线
//!
//! 每个房间对应一个主题（`messageAdded:<room>`），主题在第一个订阅者出现时创建，
//! 最后一个订阅者断开时移除。每个订阅者的积压上限为通道容量，超过后订阅流结束，
//! 由上层断开连接。

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{ready, Context, Poll};

use async_trait::async_trait;
use domain::{Message, RoomId};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};

use crate::broadcaster::{topic_for, BroadcastError, MessageBroadcaster};

type Topics = Mutex<HashMap<String, broadcast::Sender<Message>>>;

fn lock(topics: &Topics) -> MutexGuard<'_, HashMap<String, broadcast::Sender<Message>>> {
    topics.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct LocalMessageBroadcaster {
    topics: Arc<Topics>,
    capacity: usize,
}

impl LocalMessageBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// 当前有订阅者的主题数
    pub fn topic_count(&self) -> usize {
        lock(&self.topics).len()
    }

    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        lock(&self.topics)
            .get(&topic_for(room_id))
            .map_or(0, |sender| sender.receiver_count())
    }
}

impl Default for LocalMessageBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl MessageBroadcaster for LocalMessageBroadcaster {
    async fn publish(&self, room_id: &RoomId, message: Message) -> Result<usize, BroadcastError> {
        let sender = lock(&self.topics).get(&topic_for(room_id)).cloned();
        let Some(sender) = sender else {
            return Ok(0);
        };
        // 发送失败只意味着此刻没有接收者
        Ok(sender.send(message).unwrap_or(0))
    }

    fn subscribe(&self, room_id: &RoomId) -> MessageStream {
        let topic = topic_for(room_id);
        let receiver = lock(&self.topics)
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        tracing::debug!(topic = %topic, "subscriber registered");
        MessageStream {
            inner: Some(BroadcastStream::new(receiver)),
            room_id: room_id.clone(),
            registration: Some(Registration {
                topics: Arc::downgrade(&self.topics),
                topic,
            }),
        }
    }
}

/// 订阅登记，订阅流结束或被丢弃时注销
struct Registration {
    topics: Weak<Topics>,
    topic: String,
}

impl Registration {
    fn release(self) {
        let Some(topics) = self.topics.upgrade() else {
            return;
        };
        let mut topics = lock(&topics);
        if topics
            .get(&self.topic)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            topics.remove(&self.topic);
            tracing::debug!(topic = %self.topic, "topic removed after last subscriber left");
        }
    }
}

/// 单个房间的消息流
pub struct MessageStream {
    inner: Option<BroadcastStream<Message>>,
    room_id: RoomId,
    registration: Option<Registration>,
}

impl MessageStream {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.next().await
    }

    fn close(&mut self) {
        // 先释放接收端，注销时才能看到正确的接收者数量
        self.inner = None;
        if let Some(registration) = self.registration.take() {
            registration.release();
        }
    }
}

impl Stream for MessageStream {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(inner).poll_next(cx)) {
            Some(Ok(message)) => Poll::Ready(Some(message)),
            Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                tracing::warn!(
                    room_id = %this.room_id,
                    skipped,
                    "subscriber fell behind, closing stream"
                );
                this.close();
                Poll::Ready(None)
            }
            None => {
                this.close();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        self.close();
    }
}
