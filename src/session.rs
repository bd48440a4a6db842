//! 서명된 세션 토큰 발급/검증/재발급
//!
//! 토큰 형식: `base64url(json).nonce.base64url(hmac_sha256(base64url(json).nonce))`
//! 서버는 세션을 저장하지 않는다. 비밀 키만 있으면 어떤 인스턴스든 검증 가능.

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::hub::{RoomId, UserId};
use base64::{engine::general_purpose::URL_SAFE as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const NONCE_BYTES: usize = 16;

/// 토큰에 실리는 세션 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub room_name: String,
    pub display_name: String,
    pub avatar: String,
    pub is_host: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub expiry: i64,
}

impl SessionData {
    pub fn new(
        user_id: UserId,
        room_id: RoomId,
        room_name: impl Into<String>,
        display_name: impl Into<String>,
        avatar: impl Into<String>,
        is_host: bool,
    ) -> Self {
        Self {
            user_id,
            room_id,
            room_name: room_name.into(),
            display_name: display_name.into(),
            avatar: avatar.into(),
            is_host,
            created_at: 0,
            expiry: 0,
        }
    }
}

/// 세션 토큰 저장소 (프로세스 시작 시 하나 만들어 주입)
pub struct SessionTokenStore {
    secret: Vec<u8>,
    lifetime_secs: i64,
    rotate_after_secs: i64,
    clock: Arc<dyn Clock>,
}

impl SessionTokenStore {
    pub fn new(config: &SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: config.secret.clone(),
            lifetime_secs: config.lifetime_secs,
            rotate_after_secs: config.rotate_after_secs,
            clock,
        }
    }

    /// 새 토큰 발급. `created_at`/`expiry`는 지금 기준으로 다시 찍는다.
    pub fn create_token(&self, data: &SessionData) -> Result<String, SessionError> {
        let now = self.clock.unix_now();
        let stamped = SessionData {
            created_at: now,
            expiry: now + self.lifetime_secs,
            ..data.clone()
        };

        let json = serde_json::to_vec(&stamped)?;

        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);

        let payload = format!("{}.{}", BASE64.encode(json), BASE64.encode(nonce));
        let signature = BASE64.encode(self.sign(&payload).finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    /// 토큰 검증. 형식 오류, 서명 불일치, 만료를 각각 구분한다.
    pub fn validate_token(&self, token: &str) -> Result<SessionData, SessionError> {
        let parts: Vec<&str> = token.split('.').collect();
        let [encoded, nonce, signature] = parts.as_slice() else {
            return Err(SessionError::Malformed);
        };

        let supplied = BASE64
            .decode(signature)
            .map_err(|_| SessionError::InvalidSignature)?;
        // verify_slice는 상수 시간 비교
        self.sign(&format!("{}.{}", encoded, nonce))
            .verify_slice(&supplied)
            .map_err(|_| SessionError::InvalidSignature)?;

        let json = BASE64
            .decode(encoded)
            .map_err(|e| SessionError::Decode(e.to_string()))?;
        let data: SessionData =
            serde_json::from_slice(&json).map_err(|e| SessionError::Decode(e.to_string()))?;

        if self.clock.unix_now() > data.expiry {
            return Err(SessionError::Expired);
        }

        Ok(data)
    }

    /// 유효하면서 재발급 나이를 넘긴 토큰만 true
    pub fn should_rotate(&self, token: &str) -> bool {
        match self.validate_token(token) {
            Ok(data) => self.clock.unix_now() - data.created_at > self.rotate_after_secs,
            Err(_) => false,
        }
    }

    /// 같은 세션 정보로 새 토큰 발급. 이전 토큰은 자연 만료까지 그대로 유효하다.
    pub fn rotate_token(
        &self,
        _old_token: &str,
        data: &SessionData,
    ) -> Result<String, SessionError> {
        self.create_token(data)
    }

    fn sign(&self, payload: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn store_with(clock: Arc<ManualClock>) -> SessionTokenStore {
        SessionTokenStore::new(&SessionConfig::with_secret("unit-test-secret"), clock)
    }

    fn member() -> SessionData {
        SessionData::new(7, 3, "Couch Crew", "alice", "cat", false)
    }

    #[test]
    fn token_has_three_segments() {
        let store = store_with(Arc::new(ManualClock::new(1_700_000_000)));
        let token = store.create_token(&member()).unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn validate_stamps_timestamps() {
        let store = store_with(Arc::new(ManualClock::new(1_700_000_000)));
        let token = store.create_token(&member()).unwrap();
        let data = store.validate_token(&token).unwrap();
        assert_eq!(data.created_at, 1_700_000_000);
        assert_eq!(data.expiry, 1_700_000_000 + 86_400);
        assert_eq!(data.display_name, "alice");
    }

    #[test]
    fn nonce_makes_tokens_unique() {
        let store = store_with(Arc::new(ManualClock::new(1_700_000_000)));
        let a = store.create_token(&member()).unwrap();
        let b = store.create_token(&member()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let store = store_with(Arc::new(ManualClock::new(0)));
        assert!(matches!(
            store.validate_token("only.two"),
            Err(SessionError::Malformed)
        ));
        assert!(matches!(
            store.validate_token("a.b.c.d"),
            Err(SessionError::Malformed)
        ));
    }

    #[test]
    fn rotation_requires_age() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let store = store_with(clock.clone());
        let token = store.create_token(&member()).unwrap();
        assert!(!store.should_rotate(&token));

        clock.advance(Duration::from_secs(1_801));
        assert!(store.should_rotate(&token));
        assert!(!store.should_rotate("garbage"));
    }
}
