//! State System - 중앙 상태 저장소 + undo/redo 히스토리
//!
//! 모든 변경은 배치/커밋 계약을 거쳐 논리적 변경 하나당 정확히 하나의
//! HistoryEntry를 만듭니다. 변경 통지는 EventBus의 합성 이벤트로 흐릅니다.

pub mod history;
pub mod store;

// Re-exports
pub use history::{History, HistoryEntry, KeyChange};
pub use store::StateStore;
