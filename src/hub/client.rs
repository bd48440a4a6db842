//! 허브에 등록되는 클라이언트 정보

use super::{RoomId, UserId};
use uuid::Uuid;

pub type ClientId = Uuid;

/// 소켓 하나당 하나. 송신 채널은 허브가 소유하고, 연결은 수신 쪽만 가진다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub is_host: bool,
}

impl Client {
    pub fn new(room_id: RoomId, user_id: UserId, is_host: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            user_id,
            is_host,
        }
    }
}
