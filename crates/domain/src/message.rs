use chrono::{Duration, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::user::User;
use crate::value_objects::{
    MessageContent, MessageId, PersonName, RoomId, Timestamp, UserEmail, UserId,
};

/// 消息作者的快照，随消息一起加载。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: UserId,
    pub name: PersonName,
    pub email: UserEmail,
}

impl From<&User> for MessageAuthor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// 限时聊天消息，创建后不可修改，过期后由清理任务删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub content: MessageContent,
    pub author: MessageAuthor,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Message {
    pub fn post(
        id: MessageId,
        room_id: RoomId,
        content: MessageContent,
        author: MessageAuthor,
        now: Timestamp,
        ttl: Duration,
    ) -> Self {
        // 存储层只保留微秒精度，发布的内容要与之后查询到的一致
        let created_at = now.trunc_subsecs(6);
        Self {
            id,
            room_id,
            content,
            author,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// `expires_at` 恰好等于 `now` 时已视为过期
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn author() -> MessageAuthor {
        MessageAuthor {
            id: UserId::generate(),
            name: PersonName::parse("Alice").unwrap(),
            email: UserEmail::parse("alice@x.com").unwrap(),
        }
    }

    #[test]
    fn expiry_is_creation_plus_ttl() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let message = Message::post(
            MessageId::generate(),
            RoomId::parse("general").unwrap(),
            MessageContent::new("hi").unwrap(),
            author(),
            now,
            Duration::minutes(5),
        );

        assert_eq!(message.expires_at, now + Duration::minutes(5));
        assert!(!message.is_expired_at(now + Duration::minutes(4)));
        assert!(message.is_expired_at(now + Duration::minutes(5)));
    }

    #[test]
    fn timestamps_keep_microsecond_precision() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + Duration::nanoseconds(1_234_567);
        let message = Message::post(
            MessageId::generate(),
            RoomId::parse("general").unwrap(),
            MessageContent::new("hi").unwrap(),
            author(),
            now,
            Duration::minutes(5),
        );

        assert_eq!(message.created_at.timestamp_subsec_nanos(), 1_234_000);
        assert_eq!(message.expires_at - message.created_at, Duration::minutes(5));
    }
}
