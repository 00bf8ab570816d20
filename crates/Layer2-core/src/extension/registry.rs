//! Extension Registry - UI 확장 지점의 단일 저장소
//!
//! 플러그인이 선언한 뷰, 메뉴 액션, 툴바 위젯을 등록 순서대로 보관합니다.
//! 프레젠테이션 레이어는 이 레지스트리를 열람해 실제 UI를 구성하고,
//! 플러그인 언로드 시 `unregister_all`로 소유 항목이 일괄 제거됩니다.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use atrium_foundation::{Error, Result};

use super::entry::{
    ActionHandle, ExtensionEntry, MenuEntry, ToolbarEntry, ViewEntry, ViewFactory, WidgetHandle,
};

/// 섹션 미지정 툴바 위젯이 들어가는 기본 섹션
const DEFAULT_TOOLBAR_SECTION: &str = "Default";

#[derive(Default)]
struct Inner {
    views: Vec<ViewEntry>,
    menus: Vec<MenuEntry>,
    toolbars: Vec<ToolbarEntry>,
}

/// 확장 레지스트리
///
/// 모든 목록 조회는 등록 순서를 보존한 스냅샷을 반환합니다.
pub struct ExtensionRegistry {
    inner: RwLock<Inner>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    // ========================================================================
    // 등록
    // ========================================================================

    /// 뷰 선언
    ///
    /// 같은 소유자의 재선언은 기존 항목을 교체합니다. 다른 플러그인이 이미
    /// 차지한 view_id는 거부되며 최초 등록이 유지됩니다.
    pub async fn register_view(
        &self,
        owner: &str,
        view_id: &str,
        display_name: &str,
        factory: Arc<dyn ViewFactory>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.views.iter_mut().find(|v| v.view_id == view_id) {
            if existing.owner != owner {
                warn!(
                    view_id = view_id,
                    owner = %existing.owner,
                    attempted = owner,
                    "View registration conflict, keeping first registration"
                );
                return Err(Error::RegistrationConflict {
                    view_id: view_id.to_string(),
                    owner: existing.owner.clone(),
                    attempted_owner: owner.to_string(),
                });
            }

            debug!(view_id = view_id, owner = owner, "View re-declared, replacing");
            existing.display_name = display_name.to_string();
            existing.factory = factory;
            return Ok(());
        }

        inner.views.push(ViewEntry {
            owner: owner.to_string(),
            view_id: view_id.to_string(),
            display_name: display_name.to_string(),
            factory,
        });

        debug!(view_id = view_id, owner = owner, "View registered");
        Ok(())
    }

    /// 메뉴 액션 등록
    ///
    /// 경로는 '/'로 구분된 계층 문자열입니다. 앞뒤 구분자는 정규화로 제거되며
    /// 정규화 후 비어 있으면 거부됩니다.
    pub async fn register_menu_action(
        &self,
        owner: &str,
        path: &str,
        action: ActionHandle,
    ) -> Result<()> {
        let normalized = path.trim_matches('/').to_string();
        if normalized.is_empty() {
            return Err(Error::InvalidInput(
                "menu path must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;
        inner.menus.push(MenuEntry {
            owner: owner.to_string(),
            path: normalized.clone(),
            action,
        });

        debug!(path = %normalized, owner = owner, "Menu action registered");
        Ok(())
    }

    /// 툴바 위젯 등록
    ///
    /// 섹션 이름은 "{owner}/{section}"으로 네임스페이스되어 플러그인 간
    /// 섹션 충돌을 차단합니다.
    pub async fn register_toolbar_widget(
        &self,
        owner: &str,
        section: Option<&str>,
        widget: WidgetHandle,
    ) -> Result<()> {
        let section = format!(
            "{}/{}",
            owner,
            section.unwrap_or(DEFAULT_TOOLBAR_SECTION)
        );

        let mut inner = self.inner.write().await;
        inner.toolbars.push(ToolbarEntry {
            owner: owner.to_string(),
            section: section.clone(),
            widget,
        });

        debug!(section = %section, owner = owner, "Toolbar widget registered");
        Ok(())
    }

    // ========================================================================
    // 해제
    // ========================================================================

    /// 소유 플러그인의 모든 확장 항목 제거, 제거된 개수 반환
    pub async fn unregister_all(&self, owner: &str) -> usize {
        let mut inner = self.inner.write().await;

        let before =
            inner.views.len() + inner.menus.len() + inner.toolbars.len();

        inner.views.retain(|v| v.owner != owner);
        inner.menus.retain(|m| m.owner != owner);
        inner.toolbars.retain(|t| t.owner != owner);

        let removed =
            before - (inner.views.len() + inner.menus.len() + inner.toolbars.len());

        if removed > 0 {
            debug!(owner = owner, count = removed, "Extensions unregistered");
        }
        removed
    }

    // ========================================================================
    // 조회 (프레젠테이션 레이어용)
    // ========================================================================

    /// 모든 뷰 (등록 순)
    pub async fn list_views(&self) -> Vec<ViewEntry> {
        self.inner.read().await.views.clone()
    }

    /// view_id로 단일 뷰 조회
    pub async fn view(&self, view_id: &str) -> Option<ViewEntry> {
        self.inner
            .read()
            .await
            .views
            .iter()
            .find(|v| v.view_id == view_id)
            .cloned()
    }

    /// 모든 메뉴 액션 (등록 순)
    pub async fn list_menu_actions(&self) -> Vec<MenuEntry> {
        self.inner.read().await.menus.clone()
    }

    /// 네임스페이스된 툴바 섹션 이름 (중복 제거, 첫 등장 순)
    pub async fn list_toolbar_sections(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut sections = Vec::new();
        for entry in &inner.toolbars {
            if !sections.contains(&entry.section) {
                sections.push(entry.section.clone());
            }
        }
        sections
    }

    /// 섹션의 위젯들 (등록 순)
    pub async fn toolbar_widgets(&self, section: &str) -> Vec<ToolbarEntry> {
        self.inner
            .read()
            .await
            .toolbars
            .iter()
            .filter(|t| t.section == section)
            .cloned()
            .collect()
    }

    /// 특정 소유자의 모든 확장 항목
    pub async fn entries_for(&self, owner: &str) -> Vec<ExtensionEntry> {
        let inner = self.inner.read().await;
        let mut entries = Vec::new();
        entries.extend(
            inner
                .views
                .iter()
                .filter(|v| v.owner == owner)
                .cloned()
                .map(ExtensionEntry::View),
        );
        entries.extend(
            inner
                .menus
                .iter()
                .filter(|m| m.owner == owner)
                .cloned()
                .map(ExtensionEntry::MenuAction),
        );
        entries.extend(
            inner
                .toolbars
                .iter()
                .filter(|t| t.owner == owner)
                .cloned()
                .map(ExtensionEntry::ToolbarWidget),
        );
        entries
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::entry::ViewHandle;

    fn dummy_factory() -> Arc<dyn ViewFactory> {
        Arc::new(|| Box::new(()) as ViewHandle)
    }

    #[tokio::test]
    async fn test_view_registration_and_lookup() {
        let registry = ExtensionRegistry::new();
        registry
            .register_view("editor", "outline", "Outline", dummy_factory())
            .await
            .unwrap();

        let view = registry.view("outline").await.unwrap();
        assert_eq!(view.owner, "editor");
        assert_eq!(view.display_name, "Outline");
    }

    #[tokio::test]
    async fn test_view_conflict_keeps_first_registration() {
        let registry = ExtensionRegistry::new();
        registry
            .register_view("alpha", "panel", "Alpha Panel", dummy_factory())
            .await
            .unwrap();

        let err = registry
            .register_view("beta", "panel", "Beta Panel", dummy_factory())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RegistrationConflict { .. }));

        let view = registry.view("panel").await.unwrap();
        assert_eq!(view.owner, "alpha");
        assert_eq!(view.display_name, "Alpha Panel");
    }

    #[tokio::test]
    async fn test_same_owner_redeclaration_replaces() {
        let registry = ExtensionRegistry::new();
        registry
            .register_view("alpha", "panel", "Old Name", dummy_factory())
            .await
            .unwrap();
        registry
            .register_view("alpha", "panel", "New Name", dummy_factory())
            .await
            .unwrap();

        let views = registry.list_views().await;
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].display_name, "New Name");
    }

    #[tokio::test]
    async fn test_menu_path_normalization() {
        let registry = ExtensionRegistry::new();
        registry
            .register_menu_action("alpha", "/Tools/Export/", ActionHandle::new(()))
            .await
            .unwrap();

        let menus = registry.list_menu_actions().await;
        assert_eq!(menus[0].path, "Tools/Export");

        let err = registry
            .register_menu_action("alpha", "///", ActionHandle::new(()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_toolbar_sections_are_namespaced() {
        let registry = ExtensionRegistry::new();
        registry
            .register_toolbar_widget("alpha", None, WidgetHandle::new(1u8))
            .await
            .unwrap();
        registry
            .register_toolbar_widget("beta", Some("Tools"), WidgetHandle::new(2u8))
            .await
            .unwrap();

        let sections = registry.list_toolbar_sections().await;
        assert_eq!(sections, vec!["alpha/Default", "beta/Tools"]);
        assert_eq!(registry.toolbar_widgets("alpha/Default").await.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_all_removes_everything_for_owner() {
        let registry = ExtensionRegistry::new();
        registry
            .register_view("alpha", "panel", "Panel", dummy_factory())
            .await
            .unwrap();
        registry
            .register_menu_action("alpha", "Tools/Run", ActionHandle::new(()))
            .await
            .unwrap();
        registry
            .register_toolbar_widget("alpha", None, WidgetHandle::new(()))
            .await
            .unwrap();
        registry
            .register_view("beta", "other", "Other", dummy_factory())
            .await
            .unwrap();

        let removed = registry.unregister_all("alpha").await;
        assert_eq!(removed, 3);
        assert!(registry.entries_for("alpha").await.is_empty());
        assert_eq!(registry.list_views().await.len(), 1);
    }
}
