//! 방별 게임 상태 관리 (비활성 → 활성 → 비활성)

use crate::clock::Clock;
use crate::directory::{Member, Video};
use crate::hub::{RoomId, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// 활성 게임 하나의 상태. 만들어진 뒤에는 바뀌지 않는다.
#[derive(Debug, Clone)]
pub struct GameState {
    pub room_id: RoomId,
    pub started_at_unix: i64,
    /// 호출자가 이미 섞어 둔 재생 순서
    pub videos: Vec<Video>,
    pub members: Vec<Member>,
    /// video_id → 제출자 user_id
    pub submitters: HashMap<String, UserId>,
}

impl GameState {
    /// 영상을 제출한 멤버
    pub fn video_submitter(&self, video_id: &str) -> Option<&Member> {
        let submitter_id = self.submitters.get(video_id)?;
        self.members.iter().find(|m| m.id == *submitter_id)
    }
}

/// 게임 상태 관리자
pub struct GameStateManager {
    active_games: DashMap<RoomId, Arc<GameState>>,
    clock: Arc<dyn Clock>,
}

impl GameStateManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            active_games: DashMap::new(),
            clock,
        }
    }

    /// 게임 시작. 이미 활성 게임이 있으면 아무것도 바꾸지 않고 false.
    pub fn start_game(
        &self,
        room_id: RoomId,
        videos: Vec<Video>,
        members: Vec<Member>,
        submitters: HashMap<String, UserId>,
    ) -> bool {
        match self.active_games.entry(room_id) {
            Entry::Occupied(_) => {
                tracing::warn!(room_id = room_id, "Game already started for room");
                false
            }
            Entry::Vacant(slot) => {
                let video_count = videos.len();
                let member_count = members.len();
                slot.insert(Arc::new(GameState {
                    room_id,
                    started_at_unix: self.clock.unix_now(),
                    videos,
                    members,
                    submitters,
                }));
                tracing::info!(
                    room_id = room_id,
                    videos = video_count,
                    members = member_count,
                    "Game started"
                );
                true
            }
        }
    }

    /// 게임 종료. 활성 게임이 없으면 false.
    pub fn stop_game(&self, room_id: RoomId) -> bool {
        if self.active_games.remove(&room_id).is_none() {
            tracing::warn!(room_id = room_id, "No active game for room");
            return false;
        }
        tracing::info!(room_id = room_id, "Game stopped");
        true
    }

    pub fn is_active(&self, room_id: RoomId) -> bool {
        self.active_games.contains_key(&room_id)
    }

    pub fn get_state(&self, room_id: RoomId) -> Option<Arc<GameState>> {
        self.active_games.get(&room_id).map(|g| g.value().clone())
    }

    pub fn get_submitter(&self, room_id: RoomId, video_id: &str) -> Option<Member> {
        let game = self.active_games.get(&room_id)?;
        game.video_submitter(video_id).cloned()
    }

    pub fn active_games_count(&self) -> usize {
        self.active_games.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn video(id: &str) -> Video {
        Video {
            video_id: id.to_string(),
            title: format!("title {id}"),
            channel_name: "chan".to_string(),
            thumbnail_url: String::new(),
        }
    }

    fn member(id: UserId, name: &str) -> Member {
        Member {
            id,
            name: name.to_string(),
            avatar: String::new(),
        }
    }

    fn setup() -> (Arc<ManualClock>, GameStateManager) {
        let clock = Arc::new(ManualClock::new(1_000));
        (clock.clone(), GameStateManager::new(clock))
    }

    #[test]
    fn double_start_keeps_first_state() {
        let (clock, games) = setup();
        assert!(games.start_game(1, vec![video("a")], vec![], HashMap::new()));
        let first = games.get_state(1).unwrap();

        clock.advance(Duration::from_secs(10));
        assert!(!games.start_game(1, vec![video("b")], vec![], HashMap::new()));

        let current = games.get_state(1).unwrap();
        assert_eq!(current.started_at_unix, first.started_at_unix);
        assert_eq!(current.videos[0].video_id, "a");
    }

    #[test]
    fn stop_requires_active_game() {
        let (_, games) = setup();
        assert!(!games.stop_game(1));
        assert!(games.start_game(1, vec![], vec![], HashMap::new()));
        assert!(games.is_active(1));
        assert!(games.stop_game(1));
        assert!(!games.is_active(1));
        assert!(!games.stop_game(1));
    }

    #[test]
    fn restart_after_stop() {
        let (_, games) = setup();
        assert!(games.start_game(1, vec![], vec![], HashMap::new()));
        assert!(games.stop_game(1));
        assert!(games.start_game(1, vec![], vec![], HashMap::new()));
        assert_eq!(games.active_games_count(), 1);
    }

    #[test]
    fn submitter_lookup() {
        let (_, games) = setup();
        let submitters = HashMap::from([("a".to_string(), 2), ("b".to_string(), 99)]);
        games.start_game(
            1,
            vec![video("a"), video("b")],
            vec![member(1, "host"), member(2, "bob")],
            submitters,
        );

        assert_eq!(games.get_submitter(1, "a").unwrap().name, "bob");
        // 제출자가 멤버 목록에 없음
        assert!(games.get_submitter(1, "b").is_none());
        assert!(games.get_submitter(1, "zzz").is_none());
        assert!(games.get_submitter(2, "a").is_none());
    }
}
