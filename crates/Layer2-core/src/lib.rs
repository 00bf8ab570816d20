//! # atrium-core
//!
//! Core runtime layer for Atrium:
//! - Context: RuntimeContext (서브시스템 조립, 전역 싱글턴 없음)
//! - Extension: 뷰/메뉴/툴바 확장 레지스트리
//! - Plugin: 디스크립터, 의존성 해석, 생명주기, PluginContext
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Host (프레젠테이션 레이어)                                │
//! │     │ RuntimeContext::new                                 │
//! │     ▼                                                     │
//! │  PluginManager ──→ EntryRegistry ──→ PluginFactory        │
//! │     │                                                     │
//! │     ▼ on_load(PluginContext)                              │
//! │  Plugin ──→ EventBus / StateStore / ExtensionRegistry     │
//! │              (atrium-foundation)      (atrium-core)       │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod context;
pub mod extension;
pub mod plugin;

// ============================================================================
// Context (런타임 조립)
// ============================================================================
pub use context::RuntimeContext;

// ============================================================================
// Extension (확장 지점)
// ============================================================================
pub use extension::{
    ActionHandle, ExtensionEntry, ExtensionRegistry, MenuEntry, ToolbarEntry, ViewEntry,
    ViewFactory, ViewHandle, WidgetHandle,
};

// ============================================================================
// Plugin (플러그인 시스템)
// ============================================================================
pub use plugin::{
    EntryRegistry, LifecycleState, LoadReport, Plugin, PluginContext, PluginDescriptor,
    PluginFactory, PluginManager, PluginStatus, PluginVersion, VersionReq,
};

// ============================================================================
// Foundation 재노출 (호스트 편의)
// ============================================================================
pub use atrium_foundation::{
    handler_fn, Error, EventBus, EventHandler, Result, RuntimeConfig, StateStore,
    SubscriptionHandle,
};
