use domain::RoomId;

use crate::error::ApplicationError;

/// 固定房间列表，进程启动时确定，运行期间不可变
#[derive(Debug, Clone)]
pub struct RoomRegistry {
    rooms: Vec<RoomId>,
}

impl RoomRegistry {
    /// 保留声明顺序，忽略空白和重复项
    pub fn new<I, S>(rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<RoomId> = Vec::new();
        for room in rooms {
            if let Ok(room) = RoomId::parse(room) {
                if !unique.contains(&room) {
                    unique.push(room);
                }
            }
        }
        Self { rooms: unique }
    }

    pub fn list(&self) -> &[RoomId] {
        &self.rooms
    }

    pub fn exists(&self, room_id: &str) -> bool {
        self.rooms.iter().any(|room| room.as_str() == room_id)
    }

    /// 所有接收房间参数的入口都必须先经过这里
    pub fn require(&self, room_id: &str) -> Result<RoomId, ApplicationError> {
        self.rooms
            .iter()
            .find(|room| room.as_str() == room_id)
            .cloned()
            .ok_or_else(|| ApplicationError::RoomNotFound(room_id.to_owned()))
    }
}
