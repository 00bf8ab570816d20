//! Event System - 토픽 기반 발행/구독 시스템
//!
//! 플러그인 간의 결합 없는 통신 채널입니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventBus                              │
//! │   publish(topic, payload) ──▶ [ FIFO queue ]                 │
//! │                                    │ dispatch_next()         │
//! │                                    ▼ (호스트 루프가 펌프)      │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Handler 1    │  │ Handler 2    │  │ Handler N    │       │
//! │  │ (plugin a)   │  │ (plugin b)   │  │ (state sub)  │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │        구독 등록 순서대로, 토픽별 발행 순서대로 전달            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용법
//!
//! ```ignore
//! use atrium_foundation::event::{EventBus, handler_fn};
//!
//! let bus = EventBus::new();
//! let handle = bus.subscribe("plugin.*", handler_fn(|e| {
//!     println!("Received: {}", e.topic);
//!     Ok(())
//! }), "my.plugin").await?;
//!
//! bus.publish("plugin.loaded", serde_json::json!({}), "host").await;
//! bus.run_until_idle().await;
//! ```

pub mod bus;
pub mod types;

// Re-exports
pub use bus::{
    // Helpers
    handler_fn,
    // EventBus
    EventBus,
    EventHandler,
    SubscriptionHandle,
};

pub use types::{
    // Event constructors
    plugin,
    state,
    ui,
    // Core types
    Event,
    EventId,
    TopicPattern,
};
