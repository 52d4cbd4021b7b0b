//! 熔断器模块集成测试
//!
//! 通过公开API验证状态机、超时以及日志/事件注入

use crate::common::*;
use fuseguard::{BreakerError, BreakerEvent, CircuitBreaker, CircuitState, LogLevel};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// n-1 次失败后一次成功不会熔断
#[tokio::test]
async fn test_circuit_breaker_success_interrupts_failure_streak() {
    let breaker = create_breaker("payments");

    fail_times(&breaker, 2).await;
    assert_ok!(
        breaker
            .execute(|| async { Ok::<_, VendorError>("ok") })
            .await
    );
    fail_times(&breaker, 2).await;

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.stats().consecutive_failures, 2);
}

/// 熔断期间操作不会被执行
#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_open_spy() {
    let breaker = create_breaker("banking");
    fail_times(&breaker, 3).await;

    let spy = CallCounter::new();
    for _ in 0..10 {
        let counter = spy.clone();
        let result = breaker
            .execute(|| async move {
                counter.hit();
                Ok::<_, VendorError>(())
            })
            .await;
        assert!(assert_err!(result).is_open());
    }
    assert_eq!(spy.count(), 0);

    tokio::time::advance(Duration::from_millis(1000)).await;

    let counter = spy.clone();
    assert_ok!(
        breaker
            .execute(|| async move {
                counter.hit();
                Ok::<_, VendorError>(())
            })
            .await
    );
    assert_eq!(spy.count(), 1);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

/// 半开状态下，之前的成功不能抵消一次失败
#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_half_open_single_failure_reopens() {
    let config = scenario_config().success_threshold(5);
    let breaker = CircuitBreaker::new("shipping", config);
    fail_times(&breaker, 3).await;

    tokio::time::advance(Duration::from_millis(1000)).await;
    for expected in 1..=4 {
        assert_ok!(
            breaker
                .execute(|| async { Ok::<_, VendorError>(()) })
                .await
        );
        assert_eq!(breaker.stats().consecutive_successes, expected);
    }

    fail_times(&breaker, 1).await;
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.stats().consecutive_successes, 0);
}

/// 超时按失败处理，即使操作最终会成功
#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_timeout_recorded_as_failure() {
    let breaker = create_breaker("storage");
    let completed = CallCounter::new();

    for _ in 0..3 {
        let counter = completed.clone();
        let result = breaker
            .execute(|| async move {
                tokio::time::sleep(Duration::from_millis(800)).await;
                counter.hit();
                Ok::<_, VendorError>("uploaded")
            })
            .await;

        match result {
            Err(BreakerError::Timeout { name, timeout }) => {
                assert_eq!(name, "storage");
                assert_eq!(timeout, Duration::from_millis(500));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    // 超时的操作已被丢弃，不会在之后完成
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(completed.count(), 0);

    let stats = breaker.stats();
    assert_eq!(stats.state, CircuitState::Open);
    assert_eq!(stats.total_failures, 3);
    assert_eq!(stats.total_successes, 0);
}

/// 操作在超时前完成时正常返回
#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_slow_but_in_time() {
    let breaker = create_breaker("email");
    let result = breaker
        .execute(|| async {
            tokio::time::sleep(Duration::from_millis(499)).await;
            Ok::<_, VendorError>("queued")
        })
        .await;
    assert_eq!(assert_ok!(result), "queued");
}

/// 操作错误原样返回
#[tokio::test]
async fn test_circuit_breaker_operation_error_untouched() {
    let breaker = create_breaker("payments");
    let result = breaker
        .execute(|| async { Err::<(), _>(VendorError::new(402, "card declined")) })
        .await;

    let error = assert_err!(result);
    assert_eq!(error.to_string(), "vendor error 402: card declined");
    assert_eq!(
        error.into_operation_error(),
        Some(VendorError::new(402, "card declined"))
    );
}

/// 注入的日志接口收到状态变更与失败记录
#[tokio::test]
async fn test_circuit_breaker_logger_injection() {
    let logger = RecordingLogger::new();
    let breaker = CircuitBreaker::new("payments", scenario_config()).with_logger(logger.clone());

    fail_times(&breaker, 3).await;

    let entries = logger.entries();
    let state_changes: Vec<_> = entries
        .iter()
        .filter(|(_, message, _)| message == "熔断器状态变更")
        .collect();
    assert_eq!(state_changes.len(), 1);

    let (level, _, context) = state_changes[0];
    assert_eq!(*level, LogLevel::Warn);
    assert_eq!(context["breaker"], "payments");
    assert_eq!(context["from"], "CLOSED");
    assert_eq!(context["to"], "OPEN");
    assert_eq!(context["failures_before"], 3);

    let failures = entries
        .iter()
        .filter(|(_, message, _)| message == "记录失败")
        .count();
    assert_eq!(failures, 3);
}

/// 观察者收到状态变更事件
#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_observer_injection() {
    init_tracing();
    let observer = RecordingObserver::new();
    let breaker = create_breaker("email").with_observer(observer.clone());

    fail_times(&breaker, 3).await;
    tokio::time::advance(Duration::from_millis(1000)).await;
    for _ in 0..2 {
        assert_ok!(
            breaker
                .execute(|| async { Ok::<_, VendorError>(()) })
                .await
        );
    }

    let transitions: Vec<BreakerEvent> = observer
        .events()
        .into_iter()
        .map(|(event, _)| event)
        .filter(|event| event.is_state_change())
        .collect();
    assert_eq!(
        transitions,
        vec![
            BreakerEvent::Opened,
            BreakerEvent::HalfOpened,
            BreakerEvent::Closed
        ]
    );
    assert!(observer.events().iter().all(|(_, name)| name == "email"));
}

/// 统计信息可在共享引用下读取
#[tokio::test]
async fn test_circuit_breaker_stats_shared() {
    let breaker = Arc::new(create_breaker("banking"));
    let reader = breaker.clone();

    fail_times(&breaker, 1).await;
    let stats = reader.stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.total_failures, 1);
    assert!(reader.is_available());
}

/// 操作可以直接使用 anyhow 错误
#[tokio::test]
async fn test_circuit_breaker_with_anyhow_operation() {
    let breaker = create_breaker("storage");

    let result = breaker
        .execute(|| async { Err::<(), anyhow::Error>(anyhow::anyhow!("bucket not found")) })
        .await;

    let error = assert_err!(result);
    assert_eq!(error.to_string(), "bucket not found");
    assert_eq!(breaker.stats().total_failures, 1);
}
