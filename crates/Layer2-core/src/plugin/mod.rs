//! Plugin System - 디스크립터, 해석, 생명주기, 컨텍스트
//!
//! ```text
//! PluginDescriptor ──resolve──→ 로드 순서 (위상정렬)
//!        │                           │
//!   EntryRegistry ──create──→ Plugin ──on_load(PluginContext)──→ Active
//! ```

pub mod context;
pub mod descriptor;
pub mod lifecycle;
pub mod manager;
pub mod resolver;
pub mod traits;

// Re-exports
pub use context::PluginContext;
pub use descriptor::{PluginDescriptor, PluginVersion, VersionReq};
pub use lifecycle::LifecycleState;
pub use manager::{LoadReport, PluginManager, PluginStatus};
pub use resolver::{resolve, ResolutionOutcome};
pub use traits::{EntryRegistry, Plugin, PluginFactory};
