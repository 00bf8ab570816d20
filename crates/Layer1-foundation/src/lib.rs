//! # atrium-foundation
//!
//! Foundation layer for Atrium:
//! - Error: 중앙 에러 타입 및 Result alias
//! - Config: 런타임 설정 (호스트가 주입, 파일 파싱 없음)
//! - Event: 토픽 기반 발행/구독 EventBus (비동기, 순서 보존)
//! - State: 키 주소 상태 저장소 + 제한 깊이 undo/redo 히스토리
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Plugin code (via PluginContext, Layer2)                │
//! │        │ publish/subscribe        │ get/set             │
//! │        ▼                          ▼                     │
//! │   ┌─────────┐   state.changed  ┌────────────┐          │
//! │   │ EventBus│ ◀─────────────── │ StateStore │          │
//! │   └─────────┘                  └────────────┘          │
//! │        │                          │                     │
//! │   FIFO queue                 History (cursor)           │
//! │   (호스트 루프가 펌프)        undo/redo, bounded         │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod state;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{EventBusConfig, RuntimeConfig, StateStoreConfig};

// ============================================================================
// Event (이벤트 시스템)
// ============================================================================
pub use event::{
    // Helpers
    handler_fn,
    // Bus
    EventBus,
    EventHandler,
    SubscriptionHandle,
    // Types
    Event,
    EventId,
    TopicPattern,
};

// ============================================================================
// State (상태 저장소)
// ============================================================================
pub use state::{History, HistoryEntry, KeyChange, StateStore};
