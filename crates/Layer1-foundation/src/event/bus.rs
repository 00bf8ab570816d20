//! Event Bus - 토픽 기반 발행/구독 시스템
//!
//! `publish`는 큐에 넣고 즉시 반환하며, 실제 전달은 호스트 루프가
//! `dispatch_next`/`run_until_idle`을 호출할 때 일어납니다. 같은 토픽의
//! 이벤트는 발행 순서대로(FIFO), 한 이벤트의 핸들러들은 구독 등록 순서대로
//! 실행됩니다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use super::types::{Event, TopicPattern};
use crate::config::EventBusConfig;
use crate::error::Result;

// ============================================================================
// EventHandler Trait
// ============================================================================

/// 구독 핸들 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// 이벤트 핸들러 trait
///
/// 핸들러가 반환한 에러는 버스가 잡아 보고하며, 같은 이벤트의 다른
/// 핸들러 전달을 중단시키지 않습니다.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 이벤트 처리
    async fn handle(&self, event: &Event) -> Result<()>;
}

/// 동기 클로저를 EventHandler로 감싸는 어댑터
struct FnHandler<F>(F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    async fn handle(&self, event: &Event) -> Result<()> {
        (self.0)(event)
    }
}

/// 클로저로부터 핸들러 생성 (테스트와 내부 구독에서 주로 사용)
pub fn handler_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

// ============================================================================
// EventBus
// ============================================================================

/// 등록된 구독 정보
///
/// 구독은 버스가 소유하며, owner(플러그인 ID)로 역참조되어 언로드 시
/// 일괄 해제됩니다.
struct Subscription {
    handle: SubscriptionHandle,
    pattern: TopicPattern,
    owner: String,
    handler: Arc<dyn EventHandler>,
}

/// 이벤트 버스
///
/// ## 사용법
///
/// ```ignore
/// let bus = EventBus::new();
///
/// let handle = bus.subscribe("plugin.*", handler_fn(|e| {
///     println!("{}", e.topic);
///     Ok(())
/// }), "my.plugin").await?;
///
/// bus.publish("plugin.loaded", serde_json::json!({}), "host").await;
/// bus.run_until_idle().await;   // 호스트 루프가 펌프
///
/// bus.unsubscribe(handle).await;
/// ```
pub struct EventBus {
    /// 설정
    config: EventBusConfig,

    /// 등록 순서를 보존하는 구독 목록
    subscriptions: RwLock<Vec<Subscription>>,

    /// 전달 대기 중인 이벤트 큐 (단일 FIFO)
    queue: Mutex<VecDeque<Event>>,

    /// 최근 이벤트 히스토리
    history: RwLock<VecDeque<Event>>,

    /// 구독 핸들 카운터
    handle_counter: AtomicU64,

    /// 발행 시퀀스 카운터
    seq_counter: AtomicU64,
}

impl EventBus {
    /// 기본 설정으로 이벤트 버스 생성
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 이벤트 버스 생성
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            config,
            subscriptions: RwLock::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            history: RwLock::new(VecDeque::new()),
            handle_counter: AtomicU64::new(0),
            seq_counter: AtomicU64::new(0),
        }
    }

    // ========================================================================
    // 구독
    // ========================================================================

    /// 핸들러를 토픽 패턴에 구독
    pub async fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
        owner: impl Into<String>,
    ) -> Result<SubscriptionHandle> {
        let pattern = TopicPattern::parse(pattern)?;
        let owner = owner.into();
        let handle = SubscriptionHandle(self.handle_counter.fetch_add(1, Ordering::SeqCst));

        debug!(%handle, %pattern, %owner, "Subscribed");

        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.push(Subscription {
            handle,
            pattern,
            owner,
            handler,
        });

        Ok(handle)
    }

    /// 구독 해제
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.handle != handle);
        let removed = subscriptions.len() < before;

        if removed {
            debug!(%handle, "Unsubscribed");
        } else {
            warn!(%handle, "Unsubscribe: handle not found");
        }
        removed
    }

    /// 소유자의 모든 구독 해제
    ///
    /// 언로드 경로에서 호출됩니다. 아직 시작되지 않은 전달은 이후
    /// 건너뛰어지며, 이미 실행 중인 핸들러는 완료까지 실행됩니다.
    pub async fn unsubscribe_all(&self, owner: &str) -> usize {
        let mut subscriptions = self.subscriptions.write().await;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.owner != owner);
        let removed = before - subscriptions.len();

        if removed > 0 {
            debug!(owner, removed, "Unsubscribed all for owner");
        }
        removed
    }

    // ========================================================================
    // 발행/전달
    // ========================================================================

    /// 이벤트 발행 (큐에 넣고 즉시 반환)
    pub async fn publish(&self, topic: impl Into<String>, payload: Value, source: &str) {
        let event = Event::new(topic, payload).with_source(source);
        self.publish_event(event).await;
    }

    /// 사전 구성된 이벤트 발행
    pub async fn publish_event(&self, mut event: Event) {
        event.seq = self.seq_counter.fetch_add(1, Ordering::SeqCst) + 1;

        if self.config.debug_mode {
            trace!(
                topic = %event.topic,
                source = %event.source,
                seq = event.seq,
                "Publishing event"
            );
        }

        // 히스토리에 추가
        {
            let mut history = self.history.write().await;
            history.push_back(event.clone());
            while history.len() > self.config.history_size {
                history.pop_front();
            }
        }

        let mut queue = self.queue.lock().await;
        queue.push_back(event);
    }

    /// 큐의 다음 이벤트 하나를 모든 매칭 구독자에게 전달
    ///
    /// 전달할 이벤트가 없으면 false를 반환합니다. 핸들러 목록은 이벤트를
    /// 꺼내는 시점에 스냅샷되며, 각 핸들러는 호출 직전에 구독이 아직
    /// 살아있는지 재확인됩니다 (언로드된 소유자에 대한 전달 취소).
    pub async fn dispatch_next(&self) -> bool {
        let event = {
            let mut queue = self.queue.lock().await;
            match queue.pop_front() {
                Some(event) => event,
                None => return false,
            }
        };

        // 등록 순서 스냅샷 (핸들러 실행 중 구독 변경이 가능해야 하므로
        // 락을 잡은 채 핸들러를 호출하지 않음)
        let matched: Vec<(SubscriptionHandle, String, Arc<dyn EventHandler>)> = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions
                .iter()
                .filter(|s| s.pattern.matches(&event.topic))
                .map(|s| (s.handle, s.owner.clone(), Arc::clone(&s.handler)))
                .collect()
        };

        if self.config.debug_mode {
            trace!(
                topic = %event.topic,
                handlers = matched.len(),
                "Dispatching event"
            );
        }

        for (handle, owner, handler) in matched {
            // 스냅샷 이후 해제된 구독은 건너뜀
            let still_subscribed = {
                let subscriptions = self.subscriptions.read().await;
                subscriptions.iter().any(|s| s.handle == handle)
            };
            if !still_subscribed {
                trace!(%handle, owner, topic = %event.topic, "Skipping cancelled delivery");
                continue;
            }

            if let Err(e) = handler.handle(&event).await {
                // 핸들러 에러는 격리: 보고 후 다음 핸들러로 계속
                error!(
                    owner,
                    topic = %event.topic,
                    error = %e,
                    "Event handler failed"
                );
            }
        }

        true
    }

    /// 큐가 빌 때까지 전달 (처리한 이벤트 수 반환)
    ///
    /// 핸들러가 발행한 이벤트도 같은 호출 안에서 이어서 처리됩니다.
    pub async fn run_until_idle(&self) -> usize {
        let mut dispatched = 0;
        while self.dispatch_next().await {
            dispatched += 1;
        }
        dispatched
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 전달 대기 중인 이벤트 수
    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// 등록된 구독 수
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// 소유자의 구독 수
    pub async fn subscription_count_for(&self, owner: &str) -> usize {
        let subscriptions = self.subscriptions.read().await;
        subscriptions.iter().filter(|s| s.owner == owner).count()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.seq_counter.load(Ordering::SeqCst)
    }

    /// 최근 이벤트 히스토리 조회 (최신 우선)
    pub async fn history(&self, limit: Option<usize>) -> Vec<Event> {
        let history = self.history.read().await;
        let limit = limit.unwrap_or(history.len());
        history.iter().rev().take(limit).cloned().collect()
    }

    /// 히스토리 클리어
    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// 호출 순서를 기록하는 테스트 핸들러
    fn recorder(log: Arc<StdMutex<Vec<String>>>, tag: &str) -> Arc<dyn EventHandler> {
        let tag = tag.to_string();
        handler_fn(move |event| {
            log.lock().unwrap().push(format!("{tag}:{}", event.topic));
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_publish_is_deferred_until_dispatch() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        bus.subscribe("a", recorder(log.clone(), "h"), "p1")
            .await
            .unwrap();
        bus.publish("a", Value::Null, "test").await;

        // publish는 큐에만 넣음
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.pending_count().await, 1);

        assert_eq!(bus.run_until_idle().await, 1);
        assert_eq!(log.lock().unwrap().as_slice(), ["h:a"]);
    }

    #[tokio::test]
    async fn test_delivery_in_registration_then_publish_order() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        bus.subscribe("t", recorder(log.clone(), "first"), "p1")
            .await
            .unwrap();
        bus.subscribe("t", recorder(log.clone(), "second"), "p2")
            .await
            .unwrap();

        bus.publish("t", serde_json::json!(1), "test").await;
        bus.publish("t", serde_json::json!(2), "test").await;
        bus.run_until_idle().await;

        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["first:t", "second:t", "first:t", "second:t"]
        );
    }

    #[tokio::test]
    async fn test_wildcard_subscription() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        bus.subscribe("plugin.*", recorder(log.clone(), "w"), "p1")
            .await
            .unwrap();

        bus.publish("plugin.loaded", Value::Null, "test").await;
        bus.publish("state.changed.x", Value::Null, "test").await;
        bus.run_until_idle().await;

        assert_eq!(log.lock().unwrap().as_slice(), ["w:plugin.loaded"]);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish("nobody.listens", Value::Null, "test").await;
        assert_eq!(bus.run_until_idle().await, 1);
        assert_eq!(bus.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        bus.subscribe(
            "t",
            handler_fn(|_| Err(crate::Error::Internal("boom".into()))),
            "p1",
        )
        .await
        .unwrap();
        bus.subscribe("t", recorder(log.clone(), "ok"), "p2")
            .await
            .unwrap();

        bus.publish("t", Value::Null, "test").await;
        bus.run_until_idle().await;

        // 첫 핸들러의 실패에도 두 번째 핸들러는 호출됨
        assert_eq!(log.lock().unwrap().as_slice(), ["ok:t"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_all_cancels_pending_deliveries() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        bus.subscribe("t", recorder(log.clone(), "gone"), "p1")
            .await
            .unwrap();
        bus.subscribe("t", recorder(log.clone(), "kept"), "p2")
            .await
            .unwrap();

        // 이벤트가 큐에 있는 상태에서 p1을 해제
        bus.publish("t", Value::Null, "test").await;
        assert_eq!(bus.unsubscribe_all("p1").await, 1);
        bus.run_until_idle().await;

        assert_eq!(log.lock().unwrap().as_slice(), ["kept:t"]);
        assert_eq!(bus.subscription_count_for("p1").await, 0);
    }

    #[tokio::test]
    async fn test_handler_published_events_are_processed() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(StdMutex::new(Vec::new()));

        // 핸들러 안에서의 재발행은 publish가 큐잉만 하므로 재진입이 없음.
        // 대신 후속 펌프에서 처리되는지 확인.
        bus.subscribe("ping", recorder(log.clone(), "ping"), "p1")
            .await
            .unwrap();
        bus.subscribe("pong", recorder(log.clone(), "pong"), "p1")
            .await
            .unwrap();

        bus.publish("ping", Value::Null, "test").await;
        bus.publish("pong", Value::Null, "test").await;
        let dispatched = bus.run_until_idle().await;

        assert_eq!(dispatched, 2);
        assert_eq!(log.lock().unwrap().as_slice(), ["ping:ping", "pong:pong"]);
    }

    #[tokio::test]
    async fn test_event_history_bounded() {
        let config = EventBusConfig {
            history_size: 5,
            ..Default::default()
        };
        let bus = EventBus::with_config(config);

        for i in 0..10 {
            bus.publish(format!("t.{i}"), Value::Null, "test").await;
        }
        bus.run_until_idle().await;

        let history = bus.history(None).await;
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].topic, "t.9");
        assert_eq!(bus.event_count(), 10);
    }
}
