//! 환경 변수 기반 설정 관리

use anyhow::{bail, Context};
use std::env;
use std::time::Duration;

/// CORS_ORIGINS가 없을 때 허용하는 출처 (로컬 프론트엔드)
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub session: SessionConfig,
    pub hub: HubConfig,
    pub log_level: String,
}

/// 세션 토큰 설정
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: Vec<u8>,
    /// 토큰 유효 기간 (초)
    pub lifetime_secs: i64,
    /// 이 나이(초)를 넘긴 토큰은 재발급 대상
    pub rotate_after_secs: i64,
    pub cookie_secure: bool,
}

/// WebSocket 허브 설정
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// 클라이언트별 송신 버퍼 크기
    pub send_buffer: usize,
    pub pong_wait: Duration,
    pub write_wait: Duration,
    pub max_message_size: usize,
}

impl HubConfig {
    /// ping 주기는 항상 pong 대기 시간보다 짧아야 한다 (9/10)
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_buffer: 256,
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            max_message_size: 512,
        }
    }
}

impl SessionConfig {
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            lifetime_secs: 24 * 60 * 60,
            rotate_after_secs: 30 * 60,
            cookie_secure: true,
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let secret = env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?;
        if secret.is_empty() {
            bail!("SESSION_SECRET must not be empty");
        }

        let defaults = HubConfig::default();
        let mut session = SessionConfig::with_secret(secret);
        session.lifetime_secs = parse_env("SESSION_LIFETIME_SECS", session.lifetime_secs);
        session.rotate_after_secs =
            parse_env("SESSION_ROTATE_AFTER_SECS", session.rotate_after_secs);
        session.cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .map(|v| v != "false")
            .unwrap_or(true);

        Ok(Self {
            port: parse_env("PORT", 9000),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string())
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
                .collect(),
            session,
            hub: HubConfig {
                send_buffer: parse_env("WS_SEND_BUFFER", defaults.send_buffer),
                pong_wait: Duration::from_secs(parse_env(
                    "WS_PONG_WAIT_SECS",
                    defaults.pong_wait.as_secs(),
                )),
                write_wait: Duration::from_secs(parse_env(
                    "WS_WRITE_WAIT_SECS",
                    defaults.write_wait.as_secs(),
                )),
                max_message_size: parse_env("WS_MAX_MESSAGE_SIZE", defaults.max_message_size),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// 환경 변수 없이 쓰는 설정 (테스트, 로컬 실행용)
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            port: 9000,
            host: "127.0.0.1".to_string(),
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            session: SessionConfig::with_secret(secret),
            hub: HubConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_interval_is_shorter_than_pong_wait() {
        let hub = HubConfig::default();
        assert_eq!(hub.ping_interval(), Duration::from_secs(54));
        assert!(hub.ping_interval() < hub.pong_wait);
    }

    #[test]
    fn session_defaults_match_cookie_policy() {
        let session = SessionConfig::with_secret("s3cret");
        assert_eq!(session.lifetime_secs, 86_400);
        assert_eq!(session.rotate_after_secs, 1_800);
        assert!(session.cookie_secure);
    }
}
