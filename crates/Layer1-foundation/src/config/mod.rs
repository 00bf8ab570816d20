//! Runtime Config - 런타임 설정
//!
//! 호스트가 부트스트랩 시 한 번 구성하여 RuntimeContext에 주입합니다.
//! 파일 파싱은 코어 밖의 일이며, 여기서는 이미 검증된 값만 다룹니다.

use serde::{Deserialize, Serialize};

/// 이벤트 버스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// 최근 이벤트 히스토리 보관 개수
    #[serde(default = "default_event_history")]
    pub history_size: usize,

    /// 디버그 모드 (모든 발행/전달을 trace 로깅)
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            history_size: 100,
            debug_mode: false,
        }
    }
}

/// 상태 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateStoreConfig {
    /// undo/redo 히스토리 최대 깊이 (초과 시 가장 오래된 항목 제거)
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self { history_depth: 100 }
    }
}

/// 통합 런타임 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// 이벤트 버스 설정
    #[serde(default)]
    pub event_bus: EventBusConfig,

    /// 상태 저장소 설정
    #[serde(default)]
    pub state: StateStoreConfig,
}

fn default_event_history() -> usize {
    100
}

fn default_history_depth() -> usize {
    100
}
