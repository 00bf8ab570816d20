//! Plugin Manager - 플러그인 생명주기 오케스트레이션
//!
//! 디스크립터 등록 → 의존성 해석 → 로드 → 언로드의 전 과정을 단독으로
//! 소유합니다. 실패는 플러그인 단위로 격리되며, 한 플러그인의 실패가
//! 무관한 플러그인의 로드를 막지 않습니다.
//!
//! ```text
//! register_descriptor ─→ resolve ─→ load_all
//!                          │           │
//!                       resolver    EntryRegistry → PluginFactory
//!                       (위상정렬)      │
//!                                   on_load(ctx) ──실패──→ 롤백 + Failed
//!                                      │
//!                                   Active (plugin.loaded 이벤트)
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use atrium_foundation::event;
use atrium_foundation::{Error, EventBus, Result, StateStore};

use crate::context::RuntimeContext;
use crate::extension::ExtensionRegistry;

use super::context::PluginContext;
use super::descriptor::{PluginDescriptor, PluginVersion};
use super::lifecycle::{LifecycleState, PluginInstance};
use super::resolver::{self, ResolutionOutcome};
use super::traits::EntryRegistry;

// ============================================================================
// 보조 타입
// ============================================================================

/// 플러그인 상태 스냅샷 (진단/UI용)
#[derive(Debug, Clone)]
pub struct PluginStatus {
    pub id: String,
    pub state: LifecycleState,
    pub version: PluginVersion,
    pub error: Option<String>,
}

/// load_all 결과 요약
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저
///
/// PluginInstance를 단독 소유하며, 외부에는 스냅샷 조회만 노출합니다.
pub struct PluginManager {
    bus: Arc<EventBus>,
    state: Arc<StateStore>,
    extensions: Arc<ExtensionRegistry>,
    entries: Arc<EntryRegistry>,

    plugins: RwLock<BTreeMap<String, PluginInstance>>,
    load_counter: AtomicUsize,
}

impl PluginManager {
    pub fn new(ctx: &RuntimeContext) -> Self {
        Self {
            bus: ctx.bus(),
            state: ctx.state(),
            extensions: ctx.extensions(),
            entries: ctx.entries(),
            plugins: RwLock::new(BTreeMap::new()),
            load_counter: AtomicUsize::new(0),
        }
    }

    // ========================================================================
    // 디스크립터 등록
    // ========================================================================

    /// 디스크립터 등록
    ///
    /// 같은 ID의 재등록은 Discovered/Unloaded/Failed 상태에서만 허용되며,
    /// 기존 인스턴스를 새 Discovered 인스턴스로 교체합니다 (에러 기록 초기화).
    pub async fn register_descriptor(&self, descriptor: PluginDescriptor) -> Result<()> {
        let mut plugins = self.plugins.write().await;

        if let Some(existing) = plugins.get(&descriptor.id) {
            if !existing.state.allows_reregistration() {
                return Err(Error::Plugin(format!(
                    "plugin '{}' cannot be re-registered in state '{}'",
                    descriptor.id, existing.state
                )));
            }
            info!(plugin_id = %descriptor.id, "Plugin descriptor replaced");
        } else {
            info!(
                plugin_id = %descriptor.id,
                version = %descriptor.version,
                "Plugin descriptor registered"
            );
        }

        plugins.insert(descriptor.id.clone(), PluginInstance::discovered(descriptor));
        Ok(())
    }

    /// 디스크립터 일괄 등록, 성공 개수 반환 (거부 항목은 경고 후 건너뜀)
    pub async fn register_descriptors(&self, descriptors: Vec<PluginDescriptor>) -> usize {
        let mut registered = 0;
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            match self.register_descriptor(descriptor).await {
                Ok(()) => registered += 1,
                Err(e) => warn!(plugin_id = %id, error = %e, "Descriptor registration skipped"),
            }
        }
        registered
    }

    // ========================================================================
    // 해석
    // ========================================================================

    /// 의존성 해석 및 로드 순서 확정
    ///
    /// 탈락 플러그인은 Failed로 전이하고 plugin.failed 이벤트가 발행됩니다.
    /// 순환이 있으면 나머지 해석을 마친 뒤 DependencyCycle을 반환합니다.
    pub async fn resolve(&self) -> Result<Vec<String>> {
        let outcome = self.resolve_internal().await;

        if let Some(members) = outcome.cycle {
            return Err(Error::DependencyCycle { members });
        }
        Ok(outcome.order)
    }

    async fn resolve_internal(&self) -> ResolutionOutcome {
        let outcome = {
            let plugins = self.plugins.read().await;
            let descriptors: BTreeMap<String, PluginDescriptor> = plugins
                .iter()
                .filter(|(_, inst)| inst.state != LifecycleState::Failed)
                .map(|(id, inst)| (id.clone(), inst.descriptor.clone()))
                .collect();
            resolver::resolve(&descriptors)
        };

        let mut failed_events: Vec<(String, String)> = Vec::new();
        {
            let mut plugins = self.plugins.write().await;

            for (id, err) in &outcome.failures {
                if let Some(inst) = plugins.get_mut(id) {
                    // 이미 Active인 플러그인은 해석 실패로 끌어내리지 않음
                    if matches!(
                        inst.state,
                        LifecycleState::Discovered | LifecycleState::Resolved
                    ) {
                        warn!(plugin_id = id, error = %err, "Plugin failed resolution");
                        inst.fail(err.to_string());
                        failed_events.push((id.clone(), err.to_string()));
                    }
                }
            }

            for id in &outcome.order {
                if let Some(inst) = plugins.get_mut(id) {
                    if inst.state == LifecycleState::Discovered {
                        inst.state = LifecycleState::Resolved;
                    }
                }
            }
        }

        for (id, reason) in failed_events {
            self.bus
                .publish_event(event::plugin::failed(&id, &reason))
                .await;
        }

        outcome
    }

    // ========================================================================
    // 로드
    // ========================================================================

    /// 단일 플러그인 로드 (Resolved 상태여야 함)
    pub async fn load(&self, id: &str) -> Result<()> {
        let descriptor = {
            let plugins = self.plugins.read().await;
            let inst = plugins
                .get(id)
                .ok_or_else(|| Error::NotFound(format!("plugin '{id}'")))?;

            if inst.state == LifecycleState::Active {
                return Ok(()); // 이미 로드됨
            }
            if !inst.state.is_loadable() {
                return Err(Error::Plugin(format!(
                    "plugin '{}' is not loadable from state '{}'",
                    id, inst.state
                )));
            }

            inst.descriptor.clone()
        };

        // 모든 의존성이 Active인지 확인 (해석은 통과했어도 의존성이
        // 로드 실패했을 수 있음)
        let inactive_dep = {
            let plugins = self.plugins.read().await;
            descriptor
                .dependencies
                .keys()
                .find(|dep_id| {
                    plugins
                        .get(*dep_id)
                        .map(|d| d.state == LifecycleState::Active)
                        != Some(true)
                })
                .cloned()
        };
        if let Some(dep_id) = inactive_dep {
            let reason = format!("dependency '{dep_id}' is not active");
            self.fail_and_report(id, &reason).await;
            return Err(Error::load(id, reason));
        }

        // 팩토리 조회
        let factory = match self.entries.resolve(&descriptor.entry_ref).await {
            Some(factory) => factory,
            None => {
                let err = Error::UnknownEntry {
                    plugin: id.to_string(),
                    entry_ref: descriptor.entry_ref.clone(),
                };
                self.fail_and_report(id, &err.to_string()).await;
                return Err(err);
            }
        };

        // 인스턴스 생성 및 컨텍스트 주입
        let plugin = factory.create();
        let ctx = Arc::new(PluginContext::new(
            &descriptor,
            self.bus.clone(),
            self.state.clone(),
            self.extensions.clone(),
        ));

        {
            let mut plugins = self.plugins.write().await;
            if let Some(inst) = plugins.get_mut(id) {
                inst.state = LifecycleState::Loaded;
            }
        }

        // on_load 실패 시 부분 등록 롤백
        if let Err(e) = plugin.on_load(&ctx).await {
            let removed_subs = self.bus.unsubscribe_all(id).await;
            let removed_ext = self.extensions.unregister_all(id).await;
            warn!(
                plugin_id = id,
                subscriptions = removed_subs,
                extensions = removed_ext,
                "Partial registrations rolled back after on_load failure"
            );

            let reason = e.to_string();
            self.fail_and_report(id, &reason).await;
            return Err(Error::load(id, reason));
        }

        {
            let mut plugins = self.plugins.write().await;
            if let Some(inst) = plugins.get_mut(id) {
                inst.state = LifecycleState::Active;
                inst.plugin = Some(plugin);
                inst.context = Some(ctx);
                inst.load_order = Some(self.load_counter.fetch_add(1, Ordering::SeqCst));
            }
        }

        info!(plugin_id = id, version = %descriptor.version, "Plugin loaded");
        self.bus
            .publish_event(event::plugin::loaded(id, &descriptor.version.to_string()))
            .await;
        Ok(())
    }

    /// 해석 후 전체 로드
    ///
    /// 실패한 플러그인이 있어도 무관한 플러그인은 계속 로드됩니다.
    pub async fn load_all(&self) -> LoadReport {
        let outcome = self.resolve_internal().await;

        let mut report = LoadReport::default();
        report.failed.extend(
            outcome
                .failures
                .iter()
                .map(|(id, _)| id.clone()),
        );

        for id in &outcome.order {
            let loadable = self
                .lifecycle(id)
                .await
                .map(LifecycleState::is_loadable)
                .unwrap_or(false);
            if !loadable {
                continue; // 이미 Active이거나 직전 단계에서 탈락
            }

            match self.load(id).await {
                Ok(()) => report.loaded.push(id.clone()),
                Err(e) => {
                    warn!(plugin_id = %id, error = %e, "Plugin load failed");
                    report.failed.push(id.clone());
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Plugin load pass complete"
        );
        report
    }

    // ========================================================================
    // 언로드
    // ========================================================================

    /// 단일 플러그인 언로드
    ///
    /// on_unload 실패는 경고 후 무시하고 등록 해제를 계속합니다. 플러그인이
    /// 기록한 상태 키는 의도적으로 남습니다 (문서 데이터 보존).
    pub async fn unload(&self, id: &str) -> Result<()> {
        let (plugin, ctx) = {
            let mut plugins = self.plugins.write().await;
            let inst = plugins
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("plugin '{id}'")))?;

            if inst.state != LifecycleState::Active {
                return Err(Error::Plugin(format!(
                    "plugin '{}' is not active (state '{}')",
                    id, inst.state
                )));
            }

            inst.state = LifecycleState::Unloading;
            (inst.plugin.clone(), inst.context.clone())
        };

        if let (Some(plugin), Some(ctx)) = (plugin, ctx) {
            if let Err(e) = plugin.on_unload(&ctx).await {
                warn!(plugin_id = id, error = %e, "on_unload failed, continuing teardown");
            }
        }

        let removed_subs = self.bus.unsubscribe_all(id).await;
        let removed_ext = self.extensions.unregister_all(id).await;

        {
            let mut plugins = self.plugins.write().await;
            if let Some(inst) = plugins.get_mut(id) {
                inst.state = LifecycleState::Unloaded;
                inst.plugin = None;
                inst.context = None;
                inst.load_order = None;
            }
        }

        info!(
            plugin_id = id,
            subscriptions = removed_subs,
            extensions = removed_ext,
            "Plugin unloaded"
        );
        self.bus.publish_event(event::plugin::unloaded(id)).await;
        Ok(())
    }

    /// 전체 언로드 (로드 역순)
    pub async fn unload_all(&self) {
        let mut active: Vec<(usize, String)> = {
            let plugins = self.plugins.read().await;
            plugins
                .iter()
                .filter(|(_, inst)| inst.state == LifecycleState::Active)
                .filter_map(|(id, inst)| inst.load_order.map(|o| (o, id.clone())))
                .collect()
        };
        active.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, id) in active {
            if let Err(e) = self.unload(&id).await {
                warn!(plugin_id = %id, error = %e, "Unload failed during unload_all");
            }
        }
    }

    /// 언로드 후 같은 디스크립터로 재등록, 재해석, 재로드
    pub async fn reload(&self, id: &str) -> Result<()> {
        let descriptor = {
            let plugins = self.plugins.read().await;
            plugins
                .get(id)
                .map(|inst| inst.descriptor.clone())
                .ok_or_else(|| Error::NotFound(format!("plugin '{id}'")))?
        };

        self.unload(id).await?;
        self.register_descriptor(descriptor).await?;
        self.resolve().await?;
        self.load(id).await
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub async fn lifecycle(&self, id: &str) -> Option<LifecycleState> {
        self.plugins.read().await.get(id).map(|inst| inst.state)
    }

    /// 마지막 실패 사유 (재등록 전까지 유지)
    pub async fn last_error(&self, id: &str) -> Option<String> {
        self.plugins
            .read()
            .await
            .get(id)
            .and_then(|inst| inst.error.clone())
    }

    pub async fn descriptor(&self, id: &str) -> Option<PluginDescriptor> {
        self.plugins
            .read()
            .await
            .get(id)
            .map(|inst| inst.descriptor.clone())
    }

    /// 등록된 모든 플러그인의 상태 스냅샷 (ID 순)
    pub async fn statuses(&self) -> Vec<PluginStatus> {
        self.plugins
            .read()
            .await
            .iter()
            .map(|(id, inst)| PluginStatus {
                id: id.clone(),
                state: inst.state,
                version: inst.descriptor.version,
                error: inst.error.clone(),
            })
            .collect()
    }

    pub async fn plugin_count(&self) -> usize {
        self.plugins.read().await.len()
    }

    pub async fn active_count(&self) -> usize {
        self.plugins
            .read()
            .await
            .values()
            .filter(|inst| inst.state == LifecycleState::Active)
            .count()
    }

    // ========================================================================
    // 내부
    // ========================================================================

    /// Failed 전이 + 에러 기록 + plugin.failed 이벤트 발행
    async fn fail_and_report(&self, id: &str, reason: &str) {
        {
            let mut plugins = self.plugins.write().await;
            if let Some(inst) = plugins.get_mut(id) {
                inst.fail(reason);
            }
        }

        error!(plugin_id = id, reason = reason, "Plugin failed");
        self.bus
            .publish_event(event::plugin::failed(id, reason))
            .await;
    }
}
