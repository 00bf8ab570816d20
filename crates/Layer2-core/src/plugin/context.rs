//! Plugin Context - 플러그인에게 주어지는 유일한 런타임 창구
//!
//! 전역 싱글턴 없이, 로드 시 각 플러그인에 명시적으로 주입됩니다.
//! 모든 호출은 플러그인 ID가 자동으로 태깅되어 언로드 시 일괄 해제와
//! 진단 로그의 근거가 됩니다.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use atrium_foundation::{Error, EventBus, EventHandler, Result, StateStore, SubscriptionHandle};
use atrium_foundation::event::ui;

use crate::extension::{ActionHandle, ExtensionRegistry, ViewFactory, WidgetHandle};

use super::descriptor::{PluginDescriptor, PluginVersion};

/// 플러그인별 컨텍스트 파사드
///
/// 컨텍스트 수명은 Active 구간과 같습니다. 언로드 후 남은 클론으로 호출해도
/// 등록 소유자가 이미 해제된 상태라 다음 일괄 해제에서 함께 제거됩니다.
pub struct PluginContext {
    plugin_id: String,
    version: PluginVersion,
    permissions: Vec<String>,
    config: Value,

    bus: Arc<EventBus>,
    state: Arc<StateStore>,
    extensions: Arc<ExtensionRegistry>,
}

impl PluginContext {
    pub(crate) fn new(
        descriptor: &PluginDescriptor,
        bus: Arc<EventBus>,
        state: Arc<StateStore>,
        extensions: Arc<ExtensionRegistry>,
    ) -> Self {
        Self {
            plugin_id: descriptor.id.clone(),
            version: descriptor.version,
            permissions: descriptor.permissions.clone(),
            config: descriptor.config.clone(),
            bus,
            state,
            extensions,
        }
    }

    // ========================================================================
    // 식별자 / 메타데이터
    // ========================================================================

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn version(&self) -> PluginVersion {
        self.version
    }

    /// 디스크립터 설정 블록에서 점 구분 경로로 값 조회
    ///
    /// `get_config("server.port")`는 `{"server": {"port": 8080}}`에서
    /// `8080`을 반환합니다. 경로 중간이 오브젝트가 아니면 None.
    pub fn get_config(&self, path: &str) -> Option<Value> {
        let mut current = &self.config;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// 자문적 권한 검사 (구조적 매칭, 강제 없음)
    ///
    /// 선언 "state.write"는 "state.write"와 "state.write.ui" 모두 허용하고,
    /// 선언 "net.*"는 "net." 아래 전부를 허용합니다.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|declared| {
            if let Some(prefix) = declared.strip_suffix(".*") {
                permission == prefix || permission.starts_with(&format!("{prefix}."))
            } else {
                permission == declared || permission.starts_with(&format!("{declared}."))
            }
        })
    }

    // ========================================================================
    // 이벤트
    // ========================================================================

    /// 이벤트 발행 (source는 플러그인 ID로 태깅)
    pub async fn publish(&self, topic: &str, payload: Value) {
        self.bus.publish(topic, payload, &self.plugin_id).await;
    }

    /// 토픽 패턴 구독 (소유자는 플러그인 ID)
    pub async fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionHandle> {
        self.bus.subscribe(pattern, handler, &*self.plugin_id).await
    }

    /// 개별 구독 해제
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.bus.unsubscribe(handle).await
    }

    // ========================================================================
    // 상태
    // ========================================================================

    pub async fn get_state(&self, key: &str) -> Option<Value> {
        self.state.get(key).await
    }

    /// 상태 설정 (origin은 플러그인 ID로 태깅)
    pub async fn set_state(&self, key: &str, value: Value, group: Option<&str>) {
        self.state
            .set_tagged(key, value, group, Some(&self.plugin_id))
            .await;
    }

    /// 키 또는 키 패턴의 변경 구독
    pub async fn subscribe_to_state(
        &self,
        key_pattern: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionHandle> {
        self.state
            .subscribe_to_change(key_pattern, handler, &*self.plugin_id)
            .await
    }

    // ========================================================================
    // 확장 지점
    // ========================================================================

    /// 뷰 선언
    pub async fn declare_view(
        &self,
        view_id: &str,
        display_name: &str,
        factory: Arc<dyn ViewFactory>,
    ) -> Result<()> {
        self.extensions
            .register_view(&self.plugin_id, view_id, display_name, factory)
            .await
    }

    /// 메뉴 액션 등록
    pub async fn register_menu_action(&self, path: &str, action: ActionHandle) -> Result<()> {
        self.extensions
            .register_menu_action(&self.plugin_id, path, action)
            .await
    }

    /// 툴바 위젯 등록
    pub async fn register_toolbar_widget(
        &self,
        section: Option<&str>,
        widget: WidgetHandle,
    ) -> Result<()> {
        self.extensions
            .register_toolbar_widget(&self.plugin_id, section, widget)
            .await
    }

    // ========================================================================
    // UI 피드백
    // ========================================================================

    /// 상태줄 메시지 요청 ("ui.status" 이벤트 발행)
    pub async fn update_status(&self, message: &str, duration_ms: u64) -> Result<()> {
        if message.trim().is_empty() {
            return Err(Error::InvalidInput(
                "status message must not be empty".to_string(),
            ));
        }

        debug!(plugin_id = %self.plugin_id, message, "Status update requested");
        self.bus
            .publish_event(ui::status(&self.plugin_id, message, duration_ms))
            .await;
        Ok(())
    }
}
