//! History - 제한 깊이의 선형 undo/redo 히스토리
//!
//! 커밋된 변경 하나당 정확히 하나의 HistoryEntry가 쌓입니다. 엔트리는
//! 정방향/역방향 패치 쌍(각 키의 before/after)을 담아 재생이 결정적입니다.
//! 커서는 항상 [0, len] 범위에 있으며, 커서 뒤에 새 엔트리를 밀어 넣으면
//! 커서 이후의 엔트리는 모두 버려집니다 (표준 undo 분기 절단).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

// ============================================================================
// KeyChange / HistoryEntry
// ============================================================================

/// 단일 키의 변경 (before/after 페어)
///
/// `None`은 "키 없음"을 의미합니다: before가 None이면 키 생성,
/// after가 None이면 키 삭제입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyChange {
    pub key: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl KeyChange {
    pub fn new(key: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            key: key.into(),
            before,
            after,
        }
    }
}

/// 커밋된 변경 하나 (단일 set 또는 배치)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 키별 변경 목록 (정방향 = after 적용, 역방향 = before 적용)
    pub changes: Vec<KeyChange>,

    /// 연속 커밋 병합용 그룹 라벨
    pub group: Option<String>,

    /// 커밋 시간
    pub timestamp: DateTime<Utc>,

    /// 변경을 일으킨 플러그인 ID (진단용, 제약 아님)
    pub origin: Option<String>,
}

impl HistoryEntry {
    pub fn new(changes: Vec<KeyChange>, group: Option<String>, origin: Option<String>) -> Self {
        Self {
            changes,
            group,
            timestamp: Utc::now(),
            origin,
        }
    }

    /// 후속 변경을 이 엔트리에 병합 (같은 그룹의 연속 커밋 병합)
    ///
    /// 키가 이미 있으면 after만 갱신하여 최초의 before를 보존합니다.
    pub fn merge(&mut self, changes: Vec<KeyChange>) {
        for incoming in changes {
            match self.changes.iter_mut().find(|c| c.key == incoming.key) {
                Some(existing) => existing.after = incoming.after,
                None => self.changes.push(incoming),
            }
        }
        self.timestamp = Utc::now();
    }
}

// ============================================================================
// History
// ============================================================================

/// 제한 깊이의 선형 히스토리 + 커서
pub struct History {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    max_depth: usize,

    /// 직전 push 이후 커서가 움직이지 않았을 때만 그룹 병합 허용.
    /// undo/redo를 거친 뒤의 같은 그룹 커밋은 연속 커밋이 아님.
    last_push_coalescible: bool,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_depth,
            last_push_coalescible: false,
        }
    }

    /// 새 엔트리 추가
    ///
    /// 커서 이후의 redo 분기는 버려집니다. 직전 커밋과 그룹 라벨이
    /// 일치하면(둘 다 Some이고 같음) 새 엔트리 대신 병합합니다. 병합은
    /// 연속 커밋에만 적용되며, 사이에 undo/redo가 끼면 새 엔트리가 됩니다.
    /// 깊이 제한을 넘으면 가장 오래된 엔트리를 제거합니다. 오래된
    /// 히스토리의 소실은 의도된 동작입니다.
    pub fn push(&mut self, entry: HistoryEntry) {
        // redo 분기 절단
        self.entries.truncate(self.cursor);

        let coalesce = self.last_push_coalescible
            && match (self.entries.back(), &entry.group) {
                (Some(last), Some(group)) => last.group.as_deref() == Some(group.as_str()),
                _ => false,
            };

        if coalesce {
            debug!(group = ?entry.group, "Coalescing into previous history entry");
            if let Some(last) = self.entries.back_mut() {
                last.merge(entry.changes);
            }
        } else {
            self.entries.push_back(entry);
        }
        self.cursor = self.entries.len();
        self.last_push_coalescible = true;

        while self.entries.len() > self.max_depth {
            self.entries.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    /// 커서를 한 칸 되돌리고 적용할 역방향 엔트리를 반환
    ///
    /// 경계에서는 None (에러 아님).
    pub fn step_back(&mut self) -> Option<HistoryEntry> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.last_push_coalescible = false;
        self.entries.get(self.cursor).cloned()
    }

    /// 커서를 한 칸 전진시키고 적용할 정방향 엔트리를 반환
    pub fn step_forward(&mut self) -> Option<HistoryEntry> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        let entry = self.entries.get(self.cursor).cloned();
        self.cursor += 1;
        self.last_push_coalescible = false;
        entry
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, before: Option<i64>, after: Option<i64>, group: Option<&str>) -> HistoryEntry {
        HistoryEntry::new(
            vec![KeyChange::new(
                key,
                before.map(Value::from),
                after.map(Value::from),
            )],
            group.map(String::from),
            None,
        )
    }

    #[test]
    fn test_cursor_moves_with_push_and_steps() {
        let mut history = History::new(10);
        assert!(!history.can_undo());
        assert!(!history.can_redo());

        history.push(entry("a", None, Some(1), None));
        history.push(entry("a", Some(1), Some(2), None));
        assert_eq!(history.cursor(), 2);

        let back = history.step_back().unwrap();
        assert_eq!(back.changes[0].after, Some(Value::from(2)));
        assert_eq!(history.cursor(), 1);
        assert!(history.can_redo());

        let forward = history.step_forward().unwrap();
        assert_eq!(forward.changes[0].after, Some(Value::from(2)));
        assert_eq!(history.cursor(), 2);
    }

    #[test]
    fn test_push_after_undo_truncates_redo_branch() {
        let mut history = History::new(10);
        history.push(entry("a", None, Some(1), None));
        history.push(entry("a", Some(1), Some(2), None));

        history.step_back().unwrap();
        history.push(entry("a", Some(1), Some(9), None));

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        let last = history.step_back().unwrap();
        assert_eq!(last.changes[0].after, Some(Value::from(9)));
    }

    #[test]
    fn test_depth_cap_evicts_oldest() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(entry("a", Some(i), Some(i + 1), None));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 3);

        // 남은 윈도우만큼만 undo 가능
        let mut undone = 0;
        while history.step_back().is_some() {
            undone += 1;
        }
        assert_eq!(undone, 3);
    }

    #[test]
    fn test_consecutive_same_group_coalesces() {
        let mut history = History::new(10);
        history.push(entry("x", None, Some(1), Some("drag")));
        history.push(entry("x", Some(1), Some(2), Some("drag")));
        history.push(entry("x", Some(2), Some(3), Some("drag")));

        // 하나의 undo 스텝으로 병합되고 최초 before가 보존됨
        assert_eq!(history.len(), 1);
        let back = history.step_back().unwrap();
        assert_eq!(back.changes[0].before, None);
        assert_eq!(back.changes[0].after, Some(Value::from(3)));
    }

    #[test]
    fn test_different_groups_do_not_coalesce() {
        let mut history = History::new(10);
        history.push(entry("x", None, Some(1), Some("a")));
        history.push(entry("x", Some(1), Some(2), Some("b")));
        history.push(entry("x", Some(2), Some(3), None));
        history.push(entry("x", Some(3), Some(4), None));

        // None 그룹은 절대 병합되지 않음
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_undo_breaks_group_coalescing() {
        let mut history = History::new(10);
        history.push(entry("x", None, Some(1), Some("g")));
        history.push(entry("y", None, Some(2), None));
        history.step_back().unwrap();
        history.push(entry("x", Some(1), Some(3), Some("g")));

        // 커서가 이동했으므로 같은 그룹이어도 별도 엔트리
        assert_eq!(history.len(), 2);
        let back = history.step_back().unwrap();
        assert_eq!(back.changes[0].before, Some(Value::from(1)));
        assert_eq!(back.changes[0].after, Some(Value::from(3)));
    }

    #[test]
    fn test_redo_breaks_group_coalescing() {
        let mut history = History::new(10);
        history.push(entry("x", None, Some(1), Some("g")));
        history.step_back().unwrap();
        history.step_forward().unwrap();
        history.push(entry("x", Some(1), Some(2), Some("g")));

        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_group_merge_keeps_distinct_keys() {
        let mut history = History::new(10);
        history.push(entry("x", None, Some(1), Some("g")));
        history.push(entry("y", None, Some(2), Some("g")));

        assert_eq!(history.len(), 1);
        let back = history.step_back().unwrap();
        assert_eq!(back.changes.len(), 2);
    }
}
