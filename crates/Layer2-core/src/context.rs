//! Runtime Context - 코어 서브시스템의 조립과 소유
//!
//! 전역 싱글턴 없이, 호스트가 만든 RuntimeContext 하나가 EventBus,
//! StateStore, ExtensionRegistry, EntryRegistry를 소유하고 명시적으로
//! 전달합니다. 테스트에서는 컨텍스트를 여러 개 만들어 완전히 격리된
//! 런타임을 병렬로 돌릴 수 있습니다.

use std::sync::Arc;

use atrium_foundation::{EventBus, RuntimeConfig, StateStore};

use crate::extension::ExtensionRegistry;
use crate::plugin::EntryRegistry;

/// 런타임 컨텍스트
///
/// 클론은 같은 서브시스템을 공유합니다 (내부는 전부 Arc).
#[derive(Clone)]
pub struct RuntimeContext {
    bus: Arc<EventBus>,
    state: Arc<StateStore>,
    extensions: Arc<ExtensionRegistry>,
    entries: Arc<EntryRegistry>,
}

impl RuntimeContext {
    pub fn new(config: RuntimeConfig) -> Self {
        let bus = Arc::new(EventBus::with_config(config.event_bus));
        let state = Arc::new(StateStore::with_config(bus.clone(), config.state));

        Self {
            bus,
            state,
            extensions: Arc::new(ExtensionRegistry::new()),
            entries: Arc::new(EntryRegistry::new()),
        }
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn state(&self) -> Arc<StateStore> {
        self.state.clone()
    }

    pub fn extensions(&self) -> Arc<ExtensionRegistry> {
        self.extensions.clone()
    }

    pub fn entries(&self) -> Arc<EntryRegistry> {
        self.entries.clone()
    }

    /// 큐에 쌓인 이벤트를 모두 전달 (호스트 루프의 펌프 지점)
    pub async fn pump(&self) -> usize {
        self.bus.run_until_idle().await
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_contexts_are_isolated() {
        let a = RuntimeContext::default();
        let b = RuntimeContext::default();

        a.state().set("doc.title", json!("A"), None).await;
        assert_eq!(a.state().get("doc.title").await, Some(json!("A")));
        assert_eq!(b.state().get("doc.title").await, None);
    }

    #[tokio::test]
    async fn test_clone_shares_subsystems() {
        let ctx = RuntimeContext::default();
        let clone = ctx.clone();

        ctx.state().set("n", json!(1), None).await;
        assert_eq!(clone.state().get("n").await, Some(json!(1)));
    }
}
