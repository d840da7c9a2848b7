use std::sync::Arc;

use chrono::Duration;
use domain::{Message, MessageAuthor, MessageContent, MessageId, User};
use validator::Validate;

use crate::{
    broadcaster::MessageBroadcaster,
    clock::Clock,
    dto::{CreateMessageInput, MessageDto},
    error::ApplicationError,
    local_broadcast::MessageStream,
    repository::MessageRepository,
    rooms::RoomRegistry,
};

pub struct ChatServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub broadcaster: Arc<dyn MessageBroadcaster>,
    pub rooms: Arc<RoomRegistry>,
    pub clock: Arc<dyn Clock>,
    pub message_ttl: Duration,
}

/// 房间消息：落库后再广播，两步之间没有事务
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    pub fn available_rooms(&self) -> Vec<String> {
        self.deps
            .rooms
            .list()
            .iter()
            .map(|room| room.as_str().to_owned())
            .collect()
    }

    pub async fn create_message(
        &self,
        author: &User,
        input: CreateMessageInput,
    ) -> Result<MessageDto, ApplicationError> {
        input.validate()?;
        let content = MessageContent::new(input.content)
            .map_err(|err| ApplicationError::Validation(vec![err.to_string()]))?;
        let room_id = self.deps.rooms.require(&input.room_id)?;

        let message = Message::post(
            MessageId::generate(),
            room_id.clone(),
            content,
            MessageAuthor::from(author),
            self.deps.clock.now(),
            self.deps.message_ttl,
        );
        let stored = self.deps.message_repository.insert(message).await?;
        let dto = MessageDto::from(&stored);

        // 广播失败不回滚，消息仍可通过列表查询到
        match self.deps.broadcaster.publish(&room_id, stored).await {
            Ok(delivered) => {
                tracing::debug!(room_id = %room_id, message_id = %dto.id, delivered, "message published")
            }
            Err(err) => {
                tracing::warn!(room_id = %room_id, message_id = %dto.id, error = %err, "failed to publish message")
            }
        }

        Ok(dto)
    }

    /// 未过期的消息，按创建时间升序
    pub async fn messages(&self, room_id: Option<&str>) -> Result<Vec<MessageDto>, ApplicationError> {
        let room_id = room_id.map(|room| self.deps.rooms.require(room)).transpose()?;
        let messages = self
            .deps
            .message_repository
            .list_active(room_id, self.deps.clock.now())
            .await?;
        Ok(messages.iter().map(MessageDto::from).collect())
    }

    /// 订阅房间的新消息，订阅前发布的消息不会出现在流中
    pub fn message_added(&self, room_id: &str) -> Result<MessageStream, ApplicationError> {
        let room_id = self.deps.rooms.require(room_id)?;
        Ok(self.deps.broadcaster.subscribe(&room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::{BroadcastError, MockMessageBroadcaster};
    use crate::memory::MemoryMessageRepository;
    use crate::rooms::RoomRegistry;
    use crate::test_support::Harness;
    use chrono::SubsecRound;

    fn input(room_id: &str, content: &str) -> CreateMessageInput {
        CreateMessageInput {
            room_id: room_id.into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn message_expires_after_configured_ttl() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let now = harness.clock.now().trunc_subsecs(6);

        let message = harness
            .chat_service
            .create_message(&alice, input("general", "hi"))
            .await
            .unwrap();
        assert_eq!(message.timestamp, now);
        assert_eq!(message.expires_at, now + Duration::minutes(5));
        assert_eq!(message.author.name, "Alice");

        let listed = harness.chat_service.messages(Some("general")).await.unwrap();
        assert_eq!(listed, vec![message]);

        harness.clock.advance(Duration::minutes(5));
        assert!(harness.chat_service.messages(Some("general")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_messages_are_not_persisted() {
        let harness = Harness::new();
        let alice = harness.alice().await;

        let err = harness
            .chat_service
            .create_message(&alice, input("lobby", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::RoomNotFound(_)));

        let err = harness
            .chat_service
            .create_message(&alice, input("general", "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));

        assert!(harness.chat_service.messages(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_unknown_room_fails() {
        let harness = Harness::new();
        assert!(matches!(
            harness.chat_service.messages(Some("lobby")).await,
            Err(ApplicationError::RoomNotFound(_))
        ));
        assert!(matches!(
            harness.chat_service.message_added("lobby"),
            Err(ApplicationError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn subscribers_only_see_their_room() {
        let harness = Harness::new();
        let alice = harness.alice().await;
        let mut general = harness.chat_service.message_added("general").unwrap();

        harness
            .chat_service
            .create_message(&alice, input("random", "elsewhere"))
            .await
            .unwrap();
        let sent = harness
            .chat_service
            .create_message(&alice, input("general", "hi"))
            .await
            .unwrap();

        let received = general.recv().await.unwrap();
        assert_eq!(MessageDto::from(&received), sent);
    }

    #[tokio::test]
    async fn broadcast_failure_keeps_persisted_message() {
        let harness = Harness::new();
        let alice = harness.alice().await;

        let mut broadcaster = MockMessageBroadcaster::new();
        broadcaster
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(BroadcastError::failed("bus down")));

        let repository = Arc::new(MemoryMessageRepository::new());
        let service = ChatService::new(ChatServiceDependencies {
            message_repository: repository.clone(),
            broadcaster: Arc::new(broadcaster),
            rooms: Arc::new(RoomRegistry::new(["general"])),
            clock: harness.clock.clone(),
            message_ttl: Duration::minutes(5),
        });

        let created = service
            .create_message(&alice, input("general", "hi"))
            .await
            .unwrap();
        assert_eq!(service.messages(Some("general")).await.unwrap(), vec![created]);
    }

    #[test]
    fn rooms_are_listed_in_order() {
        let harness = Harness::new();
        assert_eq!(
            harness.chat_service.available_rooms(),
            vec!["general", "random", "tech"]
        );
    }
}
