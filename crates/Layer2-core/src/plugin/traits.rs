//! Plugin Traits - 플러그인 계약과 정적 타입 엔트리 레지스트리
//!
//! 동적 심볼 로딩 대신 컴파일 타임에 등록된 팩토리로 플러그인을 만듭니다.
//! 호스트는 시작 시 EntryRegistry에 팩토리를 등록하고, 디스크립터의
//! entry_ref가 그 키를 가리킵니다.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use atrium_foundation::{Error, Result};

use super::context::PluginContext;

// ============================================================================
// Plugin 계약
// ============================================================================

/// 플러그인이 구현하는 라이프사이클 훅
#[async_trait]
pub trait Plugin: Send + Sync {
    /// 로드 직후 호출. Err 반환 시 로드는 실패로 처리되고 부분 등록이
    /// 롤백됩니다.
    async fn on_load(&self, ctx: &PluginContext) -> Result<()>;

    /// 언로드 시작 시 호출. 실패해도 언로드는 계속 진행됩니다.
    async fn on_unload(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }
}

/// 플러그인 인스턴스를 만드는 팩토리
pub trait PluginFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Plugin>;
}

impl<F> PluginFactory for F
where
    F: Fn() -> Arc<dyn Plugin> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Plugin> {
        (self)()
    }
}

// ============================================================================
// Entry Registry
// ============================================================================

/// entry_ref → 팩토리 매핑
///
/// 디스크립터가 참조하는 모든 entry_ref는 로드 전에 여기 등록되어 있어야
/// 합니다. 미등록 참조는 로드 시 UnknownEntry로 실패합니다.
pub struct EntryRegistry {
    entries: RwLock<HashMap<String, Arc<dyn PluginFactory>>>,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 팩토리 등록. 같은 entry_ref의 중복 등록은 거부합니다.
    pub async fn register(
        &self,
        entry_ref: impl Into<String>,
        factory: Arc<dyn PluginFactory>,
    ) -> Result<()> {
        let entry_ref = entry_ref.into();
        let mut entries = self.entries.write().await;

        if entries.contains_key(&entry_ref) {
            return Err(Error::Plugin(format!(
                "entry '{}' is already registered",
                entry_ref
            )));
        }

        debug!(entry_ref = %entry_ref, "Plugin entry registered");
        entries.insert(entry_ref, factory);
        Ok(())
    }

    /// 클로저를 팩토리로 등록하는 편의 메서드
    pub async fn register_fn<F>(&self, entry_ref: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.register(entry_ref, Arc::new(factory)).await
    }

    /// entry_ref로 팩토리 조회
    pub async fn resolve(&self, entry_ref: &str) -> Option<Arc<dyn PluginFactory>> {
        self.entries.read().await.get(entry_ref).cloned()
    }

    pub async fn contains(&self, entry_ref: &str) -> bool {
        self.entries.read().await.contains_key(entry_ref)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for EntryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopPlugin;

    #[async_trait]
    impl Plugin for NoopPlugin {
        async fn on_load(&self, _ctx: &PluginContext) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = EntryRegistry::new();
        registry
            .register_fn("noop", || Arc::new(NoopPlugin) as Arc<dyn Plugin>)
            .await
            .unwrap();

        assert!(registry.contains("noop").await);
        assert!(registry.resolve("noop").await.is_some());
        assert!(registry.resolve("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = EntryRegistry::new();
        registry
            .register_fn("noop", || Arc::new(NoopPlugin) as Arc<dyn Plugin>)
            .await
            .unwrap();

        let err = registry
            .register_fn("noop", || Arc::new(NoopPlugin) as Arc<dyn Plugin>)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Plugin(_)));
        assert_eq!(registry.len().await, 1);
    }
}
