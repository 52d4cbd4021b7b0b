//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 日志与事件通知
//!
//! 熔断器不依赖任何具体的日志或指标后端，而是通过两个注入点上报：
//!
//! - [`BreakerLogger`]: 结构化日志（消息 + 键值上下文）
//! - [`BreakerObserver`]: 状态变更等事件通知
//!
//! 事件总是在熔断器内部锁释放之后发出。

use crate::constants::DEFAULT_EVENT_CHANNEL_CAPACITY;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// 日志上下文（键值对）
pub type LogContext = serde_json::Map<String, serde_json::Value>;

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
}

/// 结构化日志接口
pub trait BreakerLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext);
}

/// 转发到 `tracing` 的默认日志实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl BreakerLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        let breaker = context
            .get("breaker")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let context = serde_json::Value::Object(context.clone());
        match level {
            LogLevel::Trace => trace!(breaker, %context, "{}", message),
            LogLevel::Debug => debug!(breaker, %context, "{}", message),
            LogLevel::Info => info!(breaker, %context, "{}", message),
            LogLevel::Warn => warn!(breaker, %context, "{}", message),
        }
    }
}

/// 丢弃所有日志
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl BreakerLogger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str, _context: &LogContext) {}
}

/// 熔断器事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerEvent {
    /// 进入打开状态
    Opened,
    /// 进入半开状态
    HalfOpened,
    /// 恢复到关闭状态
    Closed,
    /// 被手动重置
    Reset,
    /// 记录了一次失败（含超时）
    FailureRecorded,
    /// 调用因熔断被拒绝
    Rejected,
}

impl BreakerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerEvent::Opened => "opened",
            BreakerEvent::HalfOpened => "half_opened",
            BreakerEvent::Closed => "closed",
            BreakerEvent::Reset => "reset",
            BreakerEvent::FailureRecorded => "failure_recorded",
            BreakerEvent::Rejected => "rejected",
        }
    }

    /// 是否为状态变更事件
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            BreakerEvent::Opened | BreakerEvent::HalfOpened | BreakerEvent::Closed
        )
    }
}

impl fmt::Display for BreakerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 事件观察者
pub trait BreakerObserver: Send + Sync {
    fn notify(&self, event: BreakerEvent, breaker: &str, context: &LogContext);
}

/// 事件通知（经由 [`EventChannel`] 发布）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerNotification {
    pub event: BreakerEvent,
    pub breaker: String,
    pub context: LogContext,
    pub at: DateTime<Utc>,
}

/// 基于 broadcast 通道的观察者
///
/// 没有订阅者时通知被直接丢弃；订阅者落后超过通道容量时会丢失最旧的通知。
#[derive(Debug, Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<BreakerNotification>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerNotification> {
        self.sender.subscribe()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerObserver for EventChannel {
    fn notify(&self, event: BreakerEvent, breaker: &str, context: &LogContext) {
        let notification = BreakerNotification {
            event,
            breaker: breaker.to_string(),
            context: context.clone(),
            at: Utc::now(),
        };
        // 无订阅者时 send 返回错误，忽略即可
        let _ = self.sender.send(notification);
    }
}
