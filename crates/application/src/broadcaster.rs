use async_trait::async_trait;
use domain::{Message, RoomId};
use thiserror::Error;

use crate::local_broadcast::MessageStream;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 房间级发布/订阅
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    /// 推送给当前所有订阅者，返回送达的订阅者数量；没有订阅者不是错误
    async fn publish(&self, room_id: &RoomId, message: Message) -> Result<usize, BroadcastError>;

    /// 只能收到订阅之后发布的消息，不回放历史
    fn subscribe(&self, room_id: &RoomId) -> MessageStream;
}

/// 房间对应的主题名
pub fn topic_for(room_id: &RoomId) -> String {
    format!("messageAdded:{room_id}")
}
