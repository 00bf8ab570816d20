//! Event Types - 버스 전체에서 사용되는 이벤트 타입 정의
//!
//! 발행된 이벤트는 불변입니다. 페이로드는 불투명한 구조화 값(serde_json::Value)이며
//! 코어는 내용을 해석하지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Event ID
// ============================================================================

/// 이벤트 고유 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// 새 이벤트 ID 생성
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event - 핵심 이벤트 타입
// ============================================================================

/// Atrium 시스템 이벤트
///
/// 발행 시 버스가 시퀀스 번호를 부여하며, 이후 변경되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// 이벤트 ID
    pub id: EventId,

    /// 토픽 (예: "plugin.loaded", "state.changed.counter.value")
    pub topic: String,

    /// 이벤트 데이터 (불투명)
    pub payload: Value,

    /// 발행자 (플러그인 ID 또는 코어 컴포넌트 이름)
    pub source: String,

    /// 버스가 부여하는 전역 발행 시퀀스 번호
    pub seq: u64,

    /// 발행 시간
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// 새 이벤트 생성 (시퀀스 번호는 발행 시 버스가 부여)
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: EventId::new(),
            topic: topic.into(),
            payload,
            source: String::new(),
            seq: 0,
            timestamp: Utc::now(),
        }
    }

    /// 소스 설정
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

// ============================================================================
// TopicPattern - 구독 토픽 패턴
// ============================================================================

/// 구독 토픽 패턴
///
/// 정확히 일치하거나, 끝에 '*'를 붙인 계층 prefix 매칭을 지원합니다.
/// 예: "plugin.*"는 "plugin.loaded"와 "plugin.unloaded"에 매칭됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPattern {
    /// 정확한 토픽 일치
    Exact(String),

    /// prefix 매칭 (저장된 문자열은 '*'를 제거한 prefix)
    Prefix(String),
}

impl TopicPattern {
    /// 패턴 문자열 파싱
    ///
    /// '*'는 패턴 끝에만 올 수 있습니다.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::InvalidInput("empty topic pattern".to_string()));
        }

        match pattern.find('*') {
            None => Ok(Self::Exact(pattern.to_string())),
            Some(pos) if pos == pattern.len() - 1 => {
                Ok(Self::Prefix(pattern[..pos].to_string()))
            }
            Some(_) => Err(Error::InvalidInput(format!(
                "'*' is only allowed at the end of a topic pattern: '{pattern}'"
            ))),
        }
    }

    /// 토픽이 패턴에 매칭되는지 확인
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            Self::Exact(t) => t == topic,
            Self::Prefix(prefix) => topic.starts_with(prefix.as_str()),
        }
    }
}

impl std::fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(t) => write!(f, "{t}"),
            Self::Prefix(p) => write!(f, "{p}*"),
        }
    }
}

// ============================================================================
// 사전 정의된 이벤트 타입들
// ============================================================================

/// 플러그인 라이프사이클 이벤트
pub mod plugin {
    use super::*;

    /// 플러그인 로드 완료 이벤트
    pub fn loaded(plugin_id: &str, version: &str) -> Event {
        Event::new(
            "plugin.loaded",
            serde_json::json!({
                "plugin_id": plugin_id,
                "version": version,
            }),
        )
        .with_source("plugin_manager")
    }

    /// 플러그인 언로드 완료 이벤트
    pub fn unloaded(plugin_id: &str) -> Event {
        Event::new(
            "plugin.unloaded",
            serde_json::json!({
                "plugin_id": plugin_id,
            }),
        )
        .with_source("plugin_manager")
    }

    /// 플러그인 실패 이벤트
    pub fn failed(plugin_id: &str, reason: &str) -> Event {
        Event::new(
            "plugin.failed",
            serde_json::json!({
                "plugin_id": plugin_id,
                "reason": reason,
            }),
        )
        .with_source("plugin_manager")
    }
}

/// 상태 변경 이벤트
pub mod state {
    use super::*;

    /// 커밋된 상태 변경 이벤트
    ///
    /// 토픽은 "state.changed.{key}" 형식이므로 키 prefix로 구독할 수 있습니다.
    pub fn changed(key: &str, value: &Value, origin: Option<&str>) -> Event {
        Event::new(
            format!("state.changed.{key}"),
            serde_json::json!({
                "key": key,
                "value": value,
                "origin": origin,
            }),
        )
        .with_source("state_store")
    }
}

/// 프레젠테이션 레이어로 전달되는 UI 이벤트
pub mod ui {
    use super::*;

    /// 상태 표시줄 알림 요청 이벤트
    pub fn status(plugin_id: &str, message: &str, duration_ms: u64) -> Event {
        Event::new(
            "ui.status",
            serde_json::json!({
                "plugin_id": plugin_id,
                "message": message,
                "duration_ms": duration_ms,
            }),
        )
        .with_source(plugin_id)
    }
}
