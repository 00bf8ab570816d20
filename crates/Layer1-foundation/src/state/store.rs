//! State Store - 중앙 상태 저장소
//!
//! 키 주소 방식의 공유 상태를 담당합니다. 커밋된 변경(단일 set 또는 배치)
//! 하나당 정확히 하나의 HistoryEntry가 기록되며, 변경 통지는 EventBus를
//! 통해 "state.changed.{key}" 토픽의 합성 이벤트로 발행됩니다.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::history::{History, HistoryEntry, KeyChange};
use crate::config::StateStoreConfig;
use crate::error::{Error, Result};
use crate::event::{self, EventBus, EventHandler, SubscriptionHandle};

/// 내부 상태 (RwLock으로 내부 가변성)
struct Inner {
    state: HashMap<String, Value>,
    history: History,

    /// 배치 중첩 깊이 (0이면 배치 아님)
    batch_depth: u32,

    /// 진행 중인 배치에 쌓인 변경
    batch: Vec<KeyChange>,

    /// 배치를 시작한 플러그인 ID (첫 set 기준)
    batch_origin: Option<String>,
}

/// 상태 저장소
///
/// ## 사용법
///
/// ```ignore
/// let store = StateStore::new(bus.clone());
///
/// store.set("counter.value", json!(1), None).await;
/// store.begin_batch().await;
/// store.set("a", json!(1), None).await;
/// store.set("b", json!(2), None).await;
/// store.commit_batch().await?;   // 하나의 undo 스텝
///
/// assert!(store.undo().await);   // 배치 전체가 되돌려짐
/// ```
pub struct StateStore {
    inner: RwLock<Inner>,
    bus: Arc<EventBus>,
}

impl StateStore {
    /// 기본 설정으로 생성
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_config(bus, StateStoreConfig::default())
    }

    /// 커스텀 설정으로 생성
    pub fn with_config(bus: Arc<EventBus>, config: StateStoreConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: HashMap::new(),
                history: History::new(config.history_depth),
                batch_depth: 0,
                batch: Vec::new(),
                batch_origin: None,
            }),
            bus,
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 키의 현재 값 조회
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().await.state.get(key).cloned()
    }

    /// 키 존재 여부
    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.state.contains_key(key)
    }

    /// 현재 모든 키 (정렬됨)
    pub async fn keys(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut keys: Vec<String> = inner.state.keys().cloned().collect();
        keys.sort();
        keys
    }

    // ========================================================================
    // 변경
    // ========================================================================

    /// 값 설정
    ///
    /// `group`이 직전 커밋과 일치하면 하나의 undo 스텝으로 병합됩니다
    /// (드래그 중 연속 갱신 등). 값이 바뀌지 않으면 no-op입니다.
    pub async fn set(&self, key: &str, value: Value, group: Option<&str>) {
        self.set_tagged(key, value, group, None).await;
    }

    /// 발생 플러그인 ID를 태깅하여 값 설정 (PluginContext 경유 경로)
    ///
    /// 태그는 진단용일 뿐 키 접근을 제한하지 않습니다 (advisory 네임스페이스).
    pub async fn set_tagged(
        &self,
        key: &str,
        value: Value,
        group: Option<&str>,
        origin: Option<&str>,
    ) {
        let notification = {
            let mut inner = self.inner.write().await;

            let before = inner.state.get(key).cloned();
            if before.as_ref() == Some(&value) {
                return; // 변경 없음
            }

            debug!(key, ?origin, "State changed");
            inner.state.insert(key.to_string(), value.clone());
            let change = KeyChange::new(key, before, Some(value.clone()));

            if inner.batch_depth > 0 {
                if inner.batch_origin.is_none() {
                    inner.batch_origin = origin.map(String::from);
                }
                inner.batch.push(change);
                None // 통지는 commit 시점으로 미룸
            } else {
                let entry = HistoryEntry::new(
                    vec![change],
                    group.map(String::from),
                    origin.map(String::from),
                );
                inner.history.push(entry);
                Some((key.to_string(), value, origin.map(String::from)))
            }
        };

        if let Some((key, value, origin)) = notification {
            self.notify(&key, &value, origin.as_deref()).await;
        }
    }

    /// 배치 시작 (중첩 가능)
    pub async fn begin_batch(&self) {
        let mut inner = self.inner.write().await;
        inner.batch_depth += 1;
    }

    /// 배치 커밋
    ///
    /// 최외곽 커밋에서 쌓인 변경 전체가 하나의 HistoryEntry로 접힙니다.
    pub async fn commit_batch(&self) -> Result<()> {
        let committed = {
            let mut inner = self.inner.write().await;
            if inner.batch_depth == 0 {
                return Err(Error::InvalidInput(
                    "commit_batch called without begin_batch".to_string(),
                ));
            }

            inner.batch_depth -= 1;
            if inner.batch_depth > 0 || inner.batch.is_empty() {
                Vec::new()
            } else {
                let changes = std::mem::take(&mut inner.batch);
                let origin = inner.batch_origin.take();
                debug!(changes = changes.len(), "Committing batch");

                let notifications: Vec<(String, Value, Option<String>)> = changes
                    .iter()
                    .map(|c| {
                        (
                            c.key.clone(),
                            c.after.clone().unwrap_or(Value::Null),
                            origin.clone(),
                        )
                    })
                    .collect();

                inner.history.push(HistoryEntry::new(changes, None, origin));
                notifications
            }
        };

        for (key, value, origin) in committed {
            self.notify(&key, &value, origin.as_deref()).await;
        }
        Ok(())
    }

    // ========================================================================
    // Undo / Redo
    // ========================================================================

    /// 마지막 커밋을 되돌림 (경계에서는 false, 에러 아님)
    pub async fn undo(&self) -> bool {
        let (notifications, origin) = {
            let mut inner = self.inner.write().await;
            if inner.batch_depth > 0 {
                warn!("undo called during an open batch; ignored");
                return false;
            }
            let Some(entry) = inner.history.step_back() else {
                return false;
            };

            // 역방향 패치 적용
            let mut notifications = Vec::new();
            for change in entry.changes.iter().rev() {
                let value = match &change.before {
                    Some(v) => {
                        inner.state.insert(change.key.clone(), v.clone());
                        v.clone()
                    }
                    None => {
                        inner.state.remove(&change.key);
                        Value::Null
                    }
                };
                notifications.push((change.key.clone(), value));
            }
            (notifications, entry.origin)
        };

        // 통지는 원래 커밋의 origin 태그를 그대로 싣는다
        for (key, value) in notifications {
            self.notify(&key, &value, origin.as_deref()).await;
        }
        true
    }

    /// 마지막 undo를 다시 적용 (경계에서는 false)
    pub async fn redo(&self) -> bool {
        let (notifications, origin) = {
            let mut inner = self.inner.write().await;
            if inner.batch_depth > 0 {
                warn!("redo called during an open batch; ignored");
                return false;
            }
            let Some(entry) = inner.history.step_forward() else {
                return false;
            };

            // 정방향 패치 적용
            let mut notifications = Vec::new();
            for change in &entry.changes {
                let value = match &change.after {
                    Some(v) => {
                        inner.state.insert(change.key.clone(), v.clone());
                        v.clone()
                    }
                    None => {
                        inner.state.remove(&change.key);
                        Value::Null
                    }
                };
                notifications.push((change.key.clone(), value));
            }
            (notifications, entry.origin)
        };

        for (key, value) in notifications {
            self.notify(&key, &value, origin.as_deref()).await;
        }
        true
    }

    pub async fn can_undo(&self) -> bool {
        self.inner.read().await.history.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.inner.read().await.history.can_redo()
    }

    /// 히스토리 엔트리 수
    pub async fn history_len(&self) -> usize {
        self.inner.read().await.history.len()
    }

    // ========================================================================
    // 변경 구독
    // ========================================================================

    /// 키 또는 키 패턴("ui.*")의 변경 구독
    ///
    /// EventBus의 "state.changed.{key}" 합성 이벤트 구독으로 구현되므로
    /// 전달 순서/취소 규칙은 버스와 동일합니다.
    pub async fn subscribe_to_change(
        &self,
        key_pattern: &str,
        handler: Arc<dyn EventHandler>,
        owner: impl Into<String>,
    ) -> Result<SubscriptionHandle> {
        self.bus
            .subscribe(&format!("state.changed.{key_pattern}"), handler, owner)
            .await
    }

    async fn notify(&self, key: &str, value: &Value, origin: Option<&str>) {
        self.bus
            .publish_event(event::state::changed(key, value, origin))
            .await;
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::handler_fn;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn store() -> StateStore {
        StateStore::new(Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = store();
        assert_eq!(store.get("missing").await, None);

        store.set("counter.value", json!(7), None).await;
        assert_eq!(store.get("counter.value").await, Some(json!(7)));
    }

    #[tokio::test]
    async fn test_unchanged_set_is_noop() {
        let store = store();
        store.set("k", json!(1), None).await;
        store.set("k", json!(1), None).await;

        assert_eq!(store.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_undo_restores_pre_set_state() {
        let store = store();
        store.set("a", json!(1), None).await;
        store.set("b", json!(2), None).await;

        assert!(store.undo().await);
        assert!(store.undo().await);

        // 생성을 되돌리면 키 자체가 사라짐
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.get("b").await, None);
        assert!(!store.undo().await);
    }

    #[tokio::test]
    async fn test_undo_redo_identity() {
        let store = store();
        for i in 0..5 {
            store.set("x", json!(i), None).await;
        }

        // 어느 깊이에서든 undo 직후의 redo는 undo 직전 상태를 그대로 복원
        for _ in 0..5 {
            let before_undo = store.get("x").await;
            assert!(store.undo().await);
            assert!(store.redo().await);
            assert_eq!(store.get("x").await, before_undo);
            assert!(store.undo().await);
        }
        assert!(!store.undo().await);
    }

    #[tokio::test]
    async fn test_batch_collapses_to_one_entry() {
        let store = store();
        store.begin_batch().await;
        store.set("a", json!(1), None).await;
        store.set("b", json!(2), None).await;
        store.set("c", json!(3), None).await;
        store.commit_batch().await.unwrap();

        assert_eq!(store.history_len().await, 1);

        assert!(store.undo().await);
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.get("b").await, None);
        assert_eq!(store.get("c").await, None);

        assert!(store.redo().await);
        assert_eq!(store.get("c").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_nested_batch_commits_once() {
        let store = store();
        store.begin_batch().await;
        store.set("a", json!(1), None).await;
        store.begin_batch().await;
        store.set("b", json!(2), None).await;
        store.commit_batch().await.unwrap();
        // 내부 commit은 아직 엔트리를 만들지 않음
        assert_eq!(store.history_len().await, 0);
        store.commit_batch().await.unwrap();

        assert_eq!(store.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_commit_without_begin_is_error() {
        let store = store();
        assert!(store.commit_batch().await.is_err());
    }

    #[tokio::test]
    async fn test_group_coalescing_is_single_undo_step() {
        let store = store();
        store.set("drag.x", json!(10), Some("drag-42")).await;
        store.set("drag.x", json!(20), Some("drag-42")).await;
        store.set("drag.x", json!(30), Some("drag-42")).await;

        assert_eq!(store.history_len().await, 1);
        assert!(store.undo().await);
        assert_eq!(store.get("drag.x").await, None);
    }

    #[tokio::test]
    async fn test_same_group_set_after_undo_is_new_undo_step() {
        let store = store();
        store.set("x", json!(1), Some("g")).await;
        store.set("y", json!(2), None).await;
        assert!(store.undo().await);

        // undo를 거친 뒤의 같은 그룹 커밋은 병합되지 않음
        store.set("x", json!(3), Some("g")).await;
        assert_eq!(store.history_len().await, 2);

        assert!(store.undo().await);
        assert_eq!(store.get("x").await, Some(json!(1)));
        assert!(store.undo().await);
        assert_eq!(store.get("x").await, None);
    }

    #[tokio::test]
    async fn test_history_cap_evicts_oldest_but_stays_consistent() {
        let bus = Arc::new(EventBus::new());
        let store = StateStore::with_config(bus, StateStoreConfig { history_depth: 3 });

        for i in 0..6 {
            store.set("n", json!(i), None).await;
        }
        assert_eq!(store.history_len().await, 3);

        // 유지된 윈도우만큼만 undo 가능
        assert!(store.undo().await);
        assert!(store.undo().await);
        assert!(store.undo().await);
        assert!(!store.undo().await);

        // 가장 오래된 보존 엔트리의 before까지 되돌아감
        assert_eq!(store.get("n").await, Some(json!(2)));

        assert!(store.redo().await);
        assert_eq!(store.get("n").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_change_notification_via_bus() {
        let bus = Arc::new(EventBus::new());
        let store = StateStore::new(bus.clone());
        let log = Arc::new(StdMutex::new(Vec::new()));

        let log2 = log.clone();
        store
            .subscribe_to_change(
                "ui.*",
                handler_fn(move |e| {
                    log2.lock().unwrap().push(e.topic.clone());
                    Ok(())
                }),
                "test.owner",
            )
            .await
            .unwrap();

        store.set("ui.theme", json!("dark"), None).await;
        store.set("core.other", json!(1), None).await;
        bus.run_until_idle().await;

        assert_eq!(log.lock().unwrap().as_slice(), ["state.changed.ui.theme"]);
    }

    #[tokio::test]
    async fn test_undo_notifies_subscribers() {
        let bus = Arc::new(EventBus::new());
        let store = StateStore::new(bus.clone());
        let log = Arc::new(StdMutex::new(Vec::new()));

        let log2 = log.clone();
        store
            .subscribe_to_change(
                "k",
                handler_fn(move |e| {
                    log2.lock().unwrap().push(e.payload["value"].clone());
                    Ok(())
                }),
                "test.owner",
            )
            .await
            .unwrap();

        store.set("k", json!(1), None).await;
        store.set("k", json!(2), None).await;
        store.undo().await;
        bus.run_until_idle().await;

        assert_eq!(
            log.lock().unwrap().as_slice(),
            [json!(1), json!(2), json!(1)]
        );
    }

    #[tokio::test]
    async fn test_undo_redo_notifications_carry_origin() {
        let bus = Arc::new(EventBus::new());
        let store = StateStore::new(bus.clone());
        let log = Arc::new(StdMutex::new(Vec::new()));

        let log2 = log.clone();
        store
            .subscribe_to_change(
                "k",
                handler_fn(move |e| {
                    log2.lock().unwrap().push(e.payload["origin"].clone());
                    Ok(())
                }),
                "test.owner",
            )
            .await
            .unwrap();

        store.set_tagged("k", json!(1), None, Some("editor")).await;
        store.undo().await;
        store.redo().await;
        bus.run_until_idle().await;

        assert_eq!(
            log.lock().unwrap().as_slice(),
            [json!("editor"), json!("editor"), json!("editor")]
        );
    }
}
