//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 熔断器实现
//!
//! 为单个外部依赖提供熔断保护，支持三状态转换、调用超时和自动恢复。
//!
//! # 特性
//!
//! - **三状态**: Closed（关闭）、Open（打开）、HalfOpen（半开）
//! - **自动熔断**: 连续失败次数达到阈值自动熔断
//! - **自动恢复**: 打开状态超过 `reset_timeout` 后放行探测调用
//! - **调用超时**: 超过 `timeout` 的调用按失败处理
//! - **线程安全**: 状态与计数器由同一把互斥锁保护，状态判定与计数更新可线性化
//! - **统计信息**: 提供只读快照，供健康检查使用
//!
//! # 超时语义
//!
//! 超时由 `tokio::time::timeout` 实现：截止时间到达时，操作的 future 被丢弃，
//! 在其下一个挂起点被取消，熔断器立即返回 [`BreakerError::Timeout`]。
//! 操作内部通过 `tokio::spawn` 等方式派生出的任务不会被取消，
//! 因此传入的操作应当可以被安全地放弃。

use crate::config::{duration_to_millis, BreakerConfig};
use crate::constants::MAX_RESET_TIMEOUT_MS;
use crate::error::{BreakerError, BreakerStats, CircuitState};
use crate::observer::{
    BreakerEvent, BreakerLogger, BreakerObserver, LogContext, LogLevel, TracingLogger,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// 熔断器内部状态
///
/// 所有字段在同一把锁下读写。
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u64,
    consecutive_successes: u64,
    last_failure_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    /// 仅在打开状态下有值
    opened_until: Option<Instant>,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
    total_rejected: u64,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
            last_success_at: None,
            opened_until: None,
            total_requests: 0,
            total_failures: 0,
            total_successes: 0,
            total_rejected: 0,
        }
    }
}

/// 待发出的事件，锁释放后统一发出
struct Emission {
    event: BreakerEvent,
    level: LogLevel,
    message: &'static str,
    context: LogContext,
}

/// 熔断器
pub struct CircuitBreaker {
    /// 熔断器名称（即被保护的依赖名）
    name: String,
    /// 配置
    config: BreakerConfig,
    /// 状态与计数器
    inner: Mutex<BreakerInner>,
    /// 日志接口
    logger: Arc<dyn BreakerLogger>,
    /// 事件观察者
    observers: Vec<Arc<dyn BreakerObserver>>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl CircuitBreaker {
    /// 创建新的熔断器
    ///
    /// 配置不做校验；需要校验时先调用 [`BreakerConfig::validate`]，
    /// 或通过注册表创建。阈值为 0 时按 1 处理。
    ///
    /// # 示例
    /// ```rust
    /// use fuseguard::circuit_breaker::CircuitBreaker;
    /// use fuseguard::config::BreakerConfig;
    /// use std::time::Duration;
    ///
    /// let config = BreakerConfig::new(3, Duration::from_secs(1), 2, Duration::from_millis(500));
    /// let breaker = CircuitBreaker::new("payments", config);
    /// assert_eq!(breaker.name(), "payments");
    /// ```
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
            logger: Arc::new(TracingLogger),
            observers: Vec::new(),
        }
    }

    /// 替换日志接口
    pub fn with_logger(mut self, logger: Arc<dyn BreakerLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// 添加事件观察者
    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// 获取熔断器名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 获取配置
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// 执行操作，自动处理熔断逻辑
    ///
    /// # 返回
    /// - `Ok(T)`: 操作成功，结果原样返回
    /// - `Err(BreakerError::Open)`: 熔断器打开，操作未被执行
    /// - `Err(BreakerError::Timeout)`: 操作未在 `timeout` 内完成
    /// - `Err(BreakerError::Operation)`: 操作自身返回的错误
    ///
    /// # 示例
    /// ```rust
    /// use fuseguard::circuit_breaker::CircuitBreaker;
    /// use fuseguard::config::BreakerConfig;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let breaker = CircuitBreaker::new("storage", BreakerConfig::default());
    ///
    /// let result = breaker
    ///     .execute(|| async { Ok::<_, std::io::Error>(42) })
    ///     .await;
    /// assert_eq!(result.unwrap(), 42);
    /// # }
    /// ```
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(state) = self.admit() {
            return Err(BreakerError::Open {
                name: self.name.clone(),
                state,
            });
        }

        match tokio::time::timeout(self.config.timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.record_failure(false);
                Err(BreakerError::Operation(e))
            }
            Err(_) => {
                self.record_failure(true);
                Err(BreakerError::Timeout {
                    name: self.name.clone(),
                    timeout: self.config.timeout,
                })
            }
        }
    }

    /// 判定是否放行本次调用
    ///
    /// 打开状态且未到期时返回 `Err(当前状态)`；到期则先切换到半开状态再放行。
    fn admit(&self) -> Result<(), CircuitState> {
        let mut emissions = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            inner.total_requests += 1;

            match (inner.state, inner.opened_until) {
                (CircuitState::Open, Some(until)) if Instant::now() < until => {
                    inner.total_rejected += 1;
                    emissions.push(Emission {
                        event: BreakerEvent::Rejected,
                        level: LogLevel::Debug,
                        message: "熔断器打开，拒绝请求",
                        context: self.context(&inner),
                    });
                    Err(CircuitState::Open)
                }
                (CircuitState::Open, _) => {
                    emissions.push(self.transition(&mut inner, CircuitState::HalfOpen));
                    Ok(())
                }
                _ => Ok(()),
            }
        };
        self.emit(emissions);
        result
    }

    /// 操作成功时的处理
    fn record_success(&self) {
        let mut emissions = Vec::new();
        {
            let mut inner = self.inner.lock();
            inner.total_successes += 1;
            inner.last_success_at = Some(Utc::now());

            match inner.state {
                CircuitState::Closed => {
                    // 单次成功即清零连续失败计数
                    inner.consecutive_failures = 0;
                }
                CircuitState::HalfOpen => {
                    inner.consecutive_successes += 1;
                    if inner.consecutive_successes >= self.config.success_threshold {
                        emissions.push(self.transition(&mut inner, CircuitState::Closed));
                    }
                }
                CircuitState::Open => {
                    // 放行后熔断器已被并发调用打开，仅计入统计
                }
            }
        }
        self.emit(emissions);
    }

    /// 操作失败（含超时）时的处理
    fn record_failure(&self, timed_out: bool) {
        let mut emissions = Vec::new();
        {
            let mut inner = self.inner.lock();
            inner.total_failures += 1;
            inner.consecutive_failures += 1;
            inner.last_failure_at = Some(Utc::now());

            let mut context = self.context(&inner);
            context.insert("timed_out".to_string(), json!(timed_out));
            emissions.push(Emission {
                event: BreakerEvent::FailureRecorded,
                level: LogLevel::Debug,
                message: "记录失败",
                context,
            });

            let trip = match inner.state {
                CircuitState::HalfOpen => true,
                CircuitState::Closed => {
                    inner.consecutive_failures >= self.config.failure_threshold
                }
                // 已处于打开状态，不重复熔断，也不延长打开时间
                CircuitState::Open => false,
            };
            if trip {
                emissions.push(self.transition(&mut inner, CircuitState::Open));
            }
        }
        self.emit(emissions);
    }

    /// 切换状态
    ///
    /// 必须在持有锁时调用；清零连续计数，并按新状态设置 `opened_until`。
    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) -> Emission {
        let from = inner.state;
        let failures = inner.consecutive_failures;
        let successes = inner.consecutive_successes;

        inner.state = to;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.opened_until = match to {
            CircuitState::Open => Some(self.open_deadline()),
            _ => None,
        };

        let mut context = self.context(inner);
        context.insert("from".to_string(), json!(from.as_str()));
        context.insert("to".to_string(), json!(to.as_str()));
        context.insert("failures_before".to_string(), json!(failures));
        context.insert("successes_before".to_string(), json!(successes));

        let (event, level) = match to {
            CircuitState::Open => {
                context.insert(
                    "reset_timeout_ms".to_string(),
                    json!(duration_to_millis(self.reset_timeout())),
                );
                (BreakerEvent::Opened, LogLevel::Warn)
            }
            CircuitState::HalfOpen => (BreakerEvent::HalfOpened, LogLevel::Info),
            CircuitState::Closed => (BreakerEvent::Closed, LogLevel::Info),
        };

        Emission {
            event,
            level,
            message: "熔断器状态变更",
            context,
        }
    }

    /// 打开状态的持续时间，超过上限时按上限处理
    fn reset_timeout(&self) -> Duration {
        self.config
            .reset_timeout
            .min(Duration::from_millis(MAX_RESET_TIMEOUT_MS))
    }

    /// 计算打开状态的截止时间
    fn open_deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.reset_timeout()).unwrap_or(now)
    }

    /// 构造日志上下文
    fn context(&self, inner: &BreakerInner) -> LogContext {
        let mut context = LogContext::new();
        context.insert("breaker".to_string(), json!(self.name));
        context.insert("state".to_string(), json!(inner.state.as_str()));
        context.insert(
            "consecutive_failures".to_string(),
            json!(inner.consecutive_failures),
        );
        context.insert(
            "consecutive_successes".to_string(),
            json!(inner.consecutive_successes),
        );
        context.insert("total_requests".to_string(), json!(inner.total_requests));
        context
    }

    /// 发出事件（锁已释放）
    fn emit(&self, emissions: Vec<Emission>) {
        for emission in emissions {
            self.logger
                .log(emission.level, emission.message, &emission.context);
            for observer in &self.observers {
                observer.notify(emission.event, &self.name, &emission.context);
            }
        }
    }

    /// 获取当前状态
    ///
    /// 不会触发打开到半开的切换；该切换只在下一次 `execute` 时发生。
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// 是否处于打开状态
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// 是否处于半开状态
    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// 是否处于关闭状态
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// 当前是否可以尝试调用（不修改状态）
    ///
    /// 关闭、半开状态返回 true；打开状态下仅当 `reset_timeout` 已过时返回 true。
    pub fn is_available(&self) -> bool {
        let inner = self.inner.lock();
        match (inner.state, inner.opened_until) {
            (CircuitState::Open, Some(until)) => Instant::now() >= until,
            _ => true,
        }
    }

    /// 重置熔断器到关闭状态
    ///
    /// 清零连续计数与 `opened_until`；累计计数保持单调，不被清零。
    pub fn reset(&self) {
        let emission = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.consecutive_successes = 0;
            inner.opened_until = None;

            let mut context = self.context(&inner);
            context.insert("from".to_string(), json!(from.as_str()));
            Emission {
                event: BreakerEvent::Reset,
                level: LogLevel::Info,
                message: "重置熔断器",
                context,
            }
        };
        self.emit(vec![emission]);
    }

    /// 获取统计信息
    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock();
        let opened_until = inner.opened_until.map(|until| {
            let remaining = until.saturating_duration_since(Instant::now());
            chrono::Duration::from_std(remaining)
                .ok()
                .and_then(|duration| Utc::now().checked_add_signed(duration))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            last_failure_at: inner.last_failure_at,
            last_success_at: inner.last_success_at,
            opened_until,
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            total_rejected: inner.total_rejected,
        }
    }
}
