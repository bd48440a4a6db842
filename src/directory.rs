//! 방/멤버/영상 제출 목록 (메모리 저장)
//!
//! 영속 저장소 자리를 대신한다. 프로세스가 재시작되면 모두 사라진다.

use crate::error::DirectoryError;
use crate::hub::{RoomId, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: UserId,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub video: Video,
    pub submitter_id: UserId,
}

/// 방 정보
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub host_id: UserId,
    pub members: Vec<Member>,
    pub submissions: Vec<Submission>,
}

impl Room {
    pub fn is_host(&self, user_id: UserId) -> bool {
        self.host_id == user_id
    }
}

pub struct RoomDirectory {
    rooms: DashMap<RoomId, Room>,
    /// 방 이름 → id (이름은 유일하다)
    names: DashMap<String, RoomId>,
    next_room_id: AtomicI32,
    next_user_id: AtomicI32,
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            names: DashMap::new(),
            next_room_id: AtomicI32::new(1),
            next_user_id: AtomicI32::new(1),
        }
    }

    /// 새 방과 그 방의 호스트 멤버 생성. 같은 이름의 방이 있으면 실패.
    pub fn create_room(
        &self,
        name: &str,
        host_name: &str,
        avatar: &str,
    ) -> Result<(Room, Member), DirectoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectoryError::InvalidName);
        }

        let room_id = match self.names.entry(name.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(room_name = %name, "Room name already exists");
                return Err(DirectoryError::NameTaken(name.to_string()));
            }
            Entry::Vacant(slot) => {
                let room_id = self.next_room_id.fetch_add(1, Ordering::SeqCst);
                slot.insert(room_id);
                room_id
            }
        };

        let host = self.new_member(host_name, avatar);
        let room = Room {
            id: room_id,
            name: name.to_string(),
            host_id: host.id,
            members: vec![host.clone()],
            submissions: Vec::new(),
        };
        self.rooms.insert(room_id, room.clone());
        tracing::info!(room_id = room_id, host_id = host.id, "Room created");
        Ok((room, host))
    }

    /// 기존 방에 참여. 같은 이름의 멤버가 이미 있으면 그 멤버로 다시 들어간다
    /// (호스트 여부 유지, 아바타만 갱신).
    pub fn join_room(
        &self,
        room_id: RoomId,
        name: &str,
        avatar: &str,
    ) -> Result<(Room, Member), DirectoryError> {
        let mut room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| DirectoryError::RoomNotFound(room_id.to_string()))?;
        let name = name.trim();

        let existing = room.members.iter().position(|m| m.name == name);
        let member = match existing {
            Some(i) => {
                let member = &mut room.members[i];
                if member.avatar != avatar {
                    tracing::debug!(
                        room_id = room_id,
                        user_id = member.id,
                        "Updating member avatar"
                    );
                    member.avatar = avatar.to_string();
                }
                tracing::info!(
                    room_id = room_id,
                    user_id = member.id,
                    "Existing member rejoined room"
                );
                member.clone()
            }
            None => {
                let member = self.new_member(name, avatar);
                room.members.push(member.clone());
                tracing::info!(room_id = room_id, user_id = member.id, "Member joined room");
                member
            }
        };

        Ok((room.clone(), member))
    }

    /// 이름이 정확히 같은 방
    pub fn find_by_name(&self, name: &str) -> Option<Room> {
        let room_id = *self.names.get(name.trim())?;
        self.get(room_id)
    }

    /// 이름에 검색어가 들어간 방 목록 (대소문자 무시, id 순). 빈 검색어는 전체.
    pub fn search(&self, term: &str) -> Vec<Room> {
        let term = term.trim().to_lowercase();
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter(|r| term.is_empty() || r.name.to_lowercase().contains(&term))
            .map(|r| r.value().clone())
            .collect();
        rooms.sort_by_key(|r| r.id);
        rooms
    }

    pub fn get(&self, room_id: RoomId) -> Option<Room> {
        self.rooms.get(&room_id).map(|r| r.clone())
    }

    pub fn members(&self, room_id: RoomId) -> Vec<Member> {
        self.rooms
            .get(&room_id)
            .map(|r| r.members.clone())
            .unwrap_or_default()
    }

    pub fn submissions(&self, room_id: RoomId) -> Vec<Submission> {
        self.rooms
            .get(&room_id)
            .map(|r| r.submissions.clone())
            .unwrap_or_default()
    }

    /// 영상 제출. 같은 멤버가 같은 영상을 두 번 내면 false.
    pub fn submit_video(&self, room_id: RoomId, user_id: UserId, video: Video) -> bool {
        let Some(mut room) = self.rooms.get_mut(&room_id) else {
            return false;
        };
        let duplicate = room
            .submissions
            .iter()
            .any(|s| s.submitter_id == user_id && s.video.video_id == video.video_id);
        if duplicate {
            return false;
        }
        tracing::debug!(
            room_id = room_id,
            user_id = user_id,
            video_id = %video.video_id,
            "Video submitted"
        );
        room.submissions.push(Submission {
            video,
            submitter_id: user_id,
        });
        true
    }

    /// 본인이 낸 영상만 지울 수 있다
    pub fn remove_video(&self, room_id: RoomId, user_id: UserId, video_id: &str) -> bool {
        let Some(mut room) = self.rooms.get_mut(&room_id) else {
            return false;
        };
        let before = room.submissions.len();
        room.submissions
            .retain(|s| !(s.submitter_id == user_id && s.video.video_id == video_id));
        before != room.submissions.len()
    }

    fn new_member(&self, name: &str, avatar: &str) -> Member {
        Member {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
            name: name.trim().to_string(),
            avatar: avatar.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str) -> Video {
        Video {
            video_id: id.to_string(),
            title: "t".to_string(),
            channel_name: "c".to_string(),
            thumbnail_url: String::new(),
        }
    }

    #[test]
    fn host_is_first_member() {
        let dir = RoomDirectory::new();
        let (room, host) = dir.create_room("Couch Crew", "alice", "cat").unwrap();
        assert!(room.is_host(host.id));
        assert_eq!(dir.members(room.id), vec![host]);
    }

    #[test]
    fn join_unknown_room_fails() {
        let dir = RoomDirectory::new();
        assert_eq!(
            dir.join_room(404, "bob", "").unwrap_err(),
            DirectoryError::RoomNotFound("404".to_string())
        );
    }

    #[test]
    fn room_names_are_unique() {
        let dir = RoomDirectory::new();
        dir.create_room("Couch Crew", "alice", "").unwrap();
        assert_eq!(
            dir.create_room("  Couch Crew ", "bob", "").unwrap_err(),
            DirectoryError::NameTaken("Couch Crew".to_string())
        );
        assert_eq!(
            dir.create_room("   ", "bob", "").unwrap_err(),
            DirectoryError::InvalidName
        );
    }

    #[test]
    fn rejoin_by_name_reuses_member() {
        let dir = RoomDirectory::new();
        let (room, host) = dir.create_room("r", "alice", "cat").unwrap();
        let (_, bob) = dir.join_room(room.id, "bob", "").unwrap();

        let (room, again) = dir.join_room(room.id, " alice ", "owl").unwrap();
        assert_eq!(again.id, host.id);
        assert_eq!(again.avatar, "owl");
        assert!(room.is_host(again.id));
        assert_eq!(room.members.len(), 2);

        let (_, bob_again) = dir.join_room(room.id, "bob", "").unwrap();
        assert_eq!(bob_again.id, bob.id);
    }

    #[test]
    fn search_and_find_by_name() {
        let dir = RoomDirectory::new();
        let (crew, _) = dir.create_room("Couch Crew", "alice", "").unwrap();
        let (club, _) = dir.create_room("Film Club", "bob", "").unwrap();

        assert_eq!(dir.find_by_name("Film Club").map(|r| r.id), Some(club.id));
        assert!(dir.find_by_name("film club").is_none());

        let found: Vec<RoomId> = dir.search("CREW").iter().map(|r| r.id).collect();
        assert_eq!(found, vec![crew.id]);
        assert_eq!(dir.search("").len(), 2);
        assert!(dir.search("zzz").is_empty());
    }

    #[test]
    fn submissions_are_per_member() {
        let dir = RoomDirectory::new();
        let (room, host) = dir.create_room("r", "alice", "").unwrap();
        let (_, bob) = dir.join_room(room.id, "bob", "").unwrap();

        assert!(dir.submit_video(room.id, host.id, video("a")));
        assert!(!dir.submit_video(room.id, host.id, video("a")));
        assert!(dir.submit_video(room.id, bob.id, video("a")));

        assert!(!dir.remove_video(room.id, bob.id, "zzz"));
        assert!(dir.remove_video(room.id, bob.id, "a"));
        assert_eq!(dir.submissions(room.id).len(), 1);
    }
}
