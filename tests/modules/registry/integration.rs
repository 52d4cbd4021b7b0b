//! 注册表模块集成测试
//!
//! 测试并发查找、降级以及管理操作

use crate::common::*;
use fuseguard::{BreakerConfigOverride, BreakerError, BreakerRegistry, CircuitState};
use std::sync::Arc;
use std::time::Duration;

/// 并发首次查找只构造一个实例
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registry_concurrent_get_or_create() {
    let registry = Arc::new(BreakerRegistry::default());

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let overrides = BreakerConfigOverride::new().failure_threshold(i + 1);
                registry.get_or_create("payments", Some(&overrides)).unwrap()
            })
        })
        .collect();

    let breakers: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(registry.len(), 1);
    let first = &breakers[0];
    assert!(breakers.iter().all(|b| Arc::ptr_eq(b, first)));
}

/// 熔断器打开时使用降级结果
#[tokio::test]
async fn test_registry_fallback_on_open() {
    let registry = create_registry(&["shipping"]);
    fail_times(&registry.breaker("shipping"), 3).await;

    let spy = CallCounter::new();
    let counter = spy.clone();
    let rate = registry
        .execute_with_fallback(
            "shipping",
            || async move {
                counter.hit();
                Ok::<_, VendorError>(1850u64)
            },
            || async { 999u64 },
        )
        .await
        .unwrap();

    assert_eq!(rate, 999);
    assert_eq!(spy.count(), 0);
}

/// 操作错误不会被降级结果掩盖
#[tokio::test]
async fn test_registry_fallback_does_not_mask_operation_error() {
    let registry = create_registry(&["payments"]);
    let fallback_calls = CallCounter::new();

    let counter = fallback_calls.clone();
    let result = registry
        .execute_with_fallback(
            "payments",
            || async { Err::<u64, _>(VendorError::new(500, "internal")) },
            || async move {
                counter.hit();
                0u64
            },
        )
        .await;

    match result {
        Err(BreakerError::Operation(e)) => assert_eq!(e, VendorError::new(500, "internal")),
        other => panic!("expected operation error, got {:?}", other),
    }
    assert_eq!(fallback_calls.count(), 0);
    assert_eq!(registry.breaker("payments").state(), CircuitState::Closed);
}

/// 超时不会被降级结果掩盖
#[tokio::test(start_paused = true)]
async fn test_registry_fallback_does_not_mask_timeout() {
    let registry = create_registry(&["email"]);

    let result = registry
        .execute_with_fallback(
            "email",
            || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, VendorError>("sent")
            },
            || async { "skipped" },
        )
        .await;

    assert!(result.unwrap_err().is_timeout());
}

/// 不同名称的熔断器互不影响
#[tokio::test]
async fn test_registry_breakers_are_isolated() {
    let registry = create_registry(&["payments", "storage"]);
    fail_times(&registry.breaker("payments"), 3).await;

    assert_eq!(registry.breaker("payments").state(), CircuitState::Open);
    assert_eq!(registry.breaker("storage").state(), CircuitState::Closed);

    let result = registry
        .execute("storage", || async { Ok::<_, VendorError>("etag") })
        .await;
    assert_eq!(result.unwrap(), "etag");
}

/// reset_all 与 clear
#[tokio::test]
async fn test_registry_admin_operations() {
    let registry = create_registry(&["payments", "banking"]);
    let payments = registry.breaker("payments");
    let banking = registry.breaker("banking");
    fail_times(&payments, 3).await;
    fail_times(&banking, 3).await;

    let open = registry
        .list_stats()
        .iter()
        .filter(|s| s.state == CircuitState::Open)
        .count();
    assert_eq!(open, 2);

    registry.reset_all();
    assert!(registry
        .list_stats()
        .iter()
        .all(|s| s.state == CircuitState::Closed && s.total_failures == 3));
    assert!(Arc::ptr_eq(&payments, &registry.breaker("payments")));

    registry.clear();
    assert!(registry.is_empty());
    let rebuilt = registry.breaker("payments");
    assert!(!Arc::ptr_eq(&payments, &rebuilt));
    assert_eq!(rebuilt.stats().total_requests, 0);
}

/// 注入的观察者作用于注册表创建的所有熔断器
#[tokio::test]
async fn test_registry_observer_injection() {
    let observer = RecordingObserver::new();
    let registry = create_registry(&["payments", "email"]).with_observer(observer.clone());

    fail_times(&registry.breaker("payments"), 3).await;
    fail_times(&registry.breaker("email"), 3).await;

    let opened: Vec<String> = observer
        .events()
        .into_iter()
        .filter(|(event, _)| *event == fuseguard::BreakerEvent::Opened)
        .map(|(_, name)| name)
        .collect();
    assert_eq!(opened, vec!["payments".to_string(), "email".to_string()]);
}
