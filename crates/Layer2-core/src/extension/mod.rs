//! Extension System - 뷰/메뉴/툴바 확장 지점
//!
//! 플러그인은 PluginContext를 통해 확장 항목을 선언하고, 프레젠테이션
//! 레이어는 ExtensionRegistry를 열람해 UI를 구성합니다.

pub mod entry;
pub mod registry;

// Re-exports
pub use entry::{
    ActionHandle, ExtensionEntry, MenuEntry, ToolbarEntry, ViewEntry, ViewFactory, ViewHandle,
    WidgetHandle,
};
pub use registry::ExtensionRegistry;
