//! Lifecycle - 플러그인 생명주기 상태 머신
//!
//! ```text
//! Discovered → Resolved → Loaded → Active → Unloading → Unloaded
//!      │           │         │        │          │
//!      └───────────┴─────────┴────────┴──────────┴──→ Failed (흡수 상태)
//! ```
//!
//! Failed에서 벗어나는 유일한 길은 디스크립터 재등록입니다.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::PluginContext;
use super::descriptor::PluginDescriptor;
use super::traits::Plugin;

/// 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// 디스크립터만 등록된 상태
    Discovered,
    /// 의존성 해석 완료, 로드 순서 확정
    Resolved,
    /// 인스턴스 생성됨, on_load 진행 중
    Loaded,
    /// 정상 동작 중
    Active,
    /// on_unload 및 등록 해제 진행 중
    Unloading,
    /// 언로드 완료, 재등록 가능
    Unloaded,
    /// 해석 또는 로드 실패 (흡수 상태)
    Failed,
}

impl LifecycleState {
    /// 이 상태에서 디스크립터 재등록이 허용되는지
    pub fn allows_reregistration(self) -> bool {
        matches!(self, Self::Discovered | Self::Unloaded | Self::Failed)
    }

    /// load() 진입이 가능한 상태인지
    pub fn is_loadable(self) -> bool {
        self == Self::Resolved
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::Resolved => "resolved",
            Self::Loaded => "loaded",
            Self::Active => "active",
            Self::Unloading => "unloading",
            Self::Unloaded => "unloaded",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// 매니저가 관리하는 플러그인 단위
///
/// plugin/context는 Active 구간에만 존재합니다. error는 마지막 실패 사유를
/// 보존하며 재등록 전까지 유지됩니다.
pub(crate) struct PluginInstance {
    pub descriptor: PluginDescriptor,
    pub state: LifecycleState,
    pub plugin: Option<Arc<dyn Plugin>>,
    pub context: Option<Arc<PluginContext>>,
    pub error: Option<String>,
    pub load_order: Option<usize>,
}

impl PluginInstance {
    pub fn discovered(descriptor: PluginDescriptor) -> Self {
        Self {
            descriptor,
            state: LifecycleState::Discovered,
            plugin: None,
            context: None,
            error: None,
            load_order: None,
        }
    }

    /// Failed로 전이하고 실패 사유를 기록
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = LifecycleState::Failed;
        self.error = Some(reason.into());
        self.plugin = None;
        self.context = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reregistration_rules() {
        assert!(LifecycleState::Discovered.allows_reregistration());
        assert!(LifecycleState::Unloaded.allows_reregistration());
        assert!(LifecycleState::Failed.allows_reregistration());
        assert!(!LifecycleState::Active.allows_reregistration());
        assert!(!LifecycleState::Resolved.allows_reregistration());
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecycleState::Active.to_string(), "active");
        assert_eq!(LifecycleState::Failed.to_string(), "failed");
    }
}
