//! Extension Entries - 플러그인이 선언하는 확장 지점 항목
//!
//! 코어는 뷰/액션/위젯의 내용을 들여다보지 않습니다. 팩토리가 만드는 값과
//! 핸들은 프레젠테이션 레이어의 계약을 만족하는 불투명 값일 뿐이며, 코어는
//! 저장하고 전달만 합니다.

use std::any::Any;
use std::sync::Arc;

// ============================================================================
// 불투명 핸들
// ============================================================================

/// 뷰 팩토리가 생산하는 불투명 값
pub type ViewHandle = Box<dyn Any + Send>;

/// 뷰 팩토리
///
/// 인자 없는 연산으로, 프레젠테이션 레이어가 소비할 값을 만듭니다.
pub trait ViewFactory: Send + Sync {
    fn create(&self) -> ViewHandle;
}

impl<F> ViewFactory for F
where
    F: Fn() -> ViewHandle + Send + Sync,
{
    fn create(&self) -> ViewHandle {
        (self)()
    }
}

/// 메뉴 액션 핸들 (불투명, 복제 가능)
#[derive(Clone)]
pub struct ActionHandle(Arc<dyn Any + Send + Sync>);

impl ActionHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// 프레젠테이션 레이어가 원래 타입으로 되찾을 때 사용
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl std::fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActionHandle(..)")
    }
}

/// 툴바 위젯 핸들 (불투명, 복제 가능)
#[derive(Clone)]
pub struct WidgetHandle(Arc<dyn Any + Send + Sync>);

impl WidgetHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl std::fmt::Debug for WidgetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WidgetHandle(..)")
    }
}

// ============================================================================
// 등록 항목
// ============================================================================

/// 선언된 뷰
#[derive(Clone)]
pub struct ViewEntry {
    /// 소유 플러그인 ID
    pub owner: String,

    /// 플러그인 한정 뷰 ID
    pub view_id: String,

    /// 표시 이름
    pub display_name: String,

    /// 뷰 팩토리
    pub factory: Arc<dyn ViewFactory>,
}

/// 등록된 메뉴 액션
///
/// 경로는 "Tools/My Plugin Actions" 같은 계층 문자열입니다. 중간 노드는
/// 프레젠테이션 레이어가 처음 사용 시 암묵적으로 만듭니다.
#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub owner: String,
    pub path: String,
    pub action: ActionHandle,
}

/// 등록된 툴바 위젯
#[derive(Debug, Clone)]
pub struct ToolbarEntry {
    pub owner: String,

    /// "{owner}/{section}" 형식으로 네임스페이스된 섹션 이름
    pub section: String,

    pub widget: WidgetHandle,
}

/// 확장 항목 (소유 플러그인별 일괄 해제의 단위)
#[derive(Clone)]
pub enum ExtensionEntry {
    View(ViewEntry),
    MenuAction(MenuEntry),
    ToolbarWidget(ToolbarEntry),
}

impl ExtensionEntry {
    /// 소유 플러그인 ID
    pub fn owner(&self) -> &str {
        match self {
            Self::View(e) => &e.owner,
            Self::MenuAction(e) => &e.owner,
            Self::ToolbarWidget(e) => &e.owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_opaque_but_recoverable() {
        let action = ActionHandle::new("open-file".to_string());
        assert_eq!(
            action.downcast_ref::<String>().map(String::as_str),
            Some("open-file")
        );
        assert!(action.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn test_factory_closure() {
        let factory: Arc<dyn ViewFactory> = Arc::new(|| Box::new(42u32) as ViewHandle);
        let view = factory.create();
        assert_eq!(view.downcast_ref::<u32>(), Some(&42));
    }
}
