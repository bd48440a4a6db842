//! 방별 재생 상태와 호스트 기준 타임라인 계산

use super::RoomId;
use crate::clock::Clock;
use crate::protocol::{CurrentVideoContent, PlaybackAction};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// 방에서 지금 재생 중인 영상과 마지막 호스트 보고 시점
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub video_id: String,
    pub index: usize,
    pub title: String,
    pub channel: String,
    pub is_paused: bool,
    /// 마지막 보고 시점의 호스트 재생 위치 (초)
    pub host_timestamp: f64,
    pub updated_at: Instant,
    pub last_action: PlaybackAction,
}

impl PlaybackState {
    /// `host_timestamp + (일시정지면 0, 아니면 now - updated_at)`, 음수는 0으로 자른다.
    pub fn effective_timestamp(&self, now: Instant) -> f64 {
        let mut elapsed = self.host_timestamp;
        if !self.is_paused {
            elapsed += now.saturating_duration_since(self.updated_at).as_secs_f64();
        }
        if elapsed < 0.0 || elapsed.is_nan() {
            tracing::warn!(
                video_id = %self.video_id,
                elapsed = elapsed,
                "Calculated negative timestamp, resetting to 0"
            );
            elapsed = 0.0;
        }
        elapsed
    }
}

/// 재생 상태 추적기. 허브를 통해서만 변경된다.
pub struct PlaybackStateTracker {
    states: DashMap<RoomId, PlaybackState>,
    clock: Arc<dyn Clock>,
}

impl PlaybackStateTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            states: DashMap::new(),
            clock,
        }
    }

    /// 영상 교체. 타임라인은 항상 0에서 재생 상태로 다시 시작한다.
    pub fn set_current_video(
        &self,
        room_id: RoomId,
        video_id: &str,
        index: usize,
        title: &str,
        channel: &str,
    ) {
        let state = PlaybackState {
            video_id: video_id.to_string(),
            index,
            title: title.to_string(),
            channel: channel.to_string(),
            is_paused: false,
            host_timestamp: 0.0,
            updated_at: self.clock.now(),
            last_action: PlaybackAction::Play,
        };
        self.states.insert(room_id, state);

        tracing::info!(
            room_id = room_id,
            video_id = %video_id,
            index = index,
            "Current video set (timestamp: 0.0)"
        );
    }

    /// 호스트가 보고한 위치/일시정지 상태 반영. 영상이 없으면 false.
    pub fn update_playback_state(
        &self,
        room_id: RoomId,
        action: PlaybackAction,
        host_timestamp: f64,
        is_paused: bool,
    ) -> bool {
        let Some(mut state) = self.states.get_mut(&room_id) else {
            tracing::warn!(
                room_id = room_id,
                "Cannot update playback state - no video exists for room"
            );
            return false;
        };

        state.host_timestamp = host_timestamp;
        state.updated_at = self.clock.now();
        state.is_paused = is_paused;
        state.last_action = action;

        tracing::info!(
            room_id = room_id,
            action = %action,
            paused = is_paused,
            timestamp = host_timestamp,
            "Playback update"
        );
        true
    }

    /// 늦게 들어온 클라이언트용 현재 상태 계산
    pub fn current_video(&self, room_id: RoomId) -> Option<CurrentVideoContent> {
        let state = self.states.get(&room_id)?;
        let timestamp = state.effective_timestamp(self.clock.now());

        tracing::debug!(
            room_id = room_id,
            action = %state.last_action,
            paused = state.is_paused,
            base = state.host_timestamp,
            start = timestamp,
            "Late joiner sync"
        );

        Some(content(&state, timestamp))
    }

    /// 상태 조회용 현재 위치 (로그 없음)
    pub fn position(&self, room_id: RoomId) -> Option<CurrentVideoContent> {
        let state = self.states.get(&room_id)?;
        Some(content(&state, state.effective_timestamp(self.clock.now())))
    }
}

fn content(state: &PlaybackState, timestamp: f64) -> CurrentVideoContent {
    CurrentVideoContent {
        video_id: state.video_id.clone(),
        index: state.index,
        title: state.title.clone(),
        channel: state.channel.clone(),
        timestamp,
        is_paused: state.is_paused,
    }
}
