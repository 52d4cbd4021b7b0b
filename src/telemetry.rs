//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 监控模块
//!
//! 以观察者的形式把熔断器事件导出为Prometheus指标。
//!
//! # 示例
//!
//! ```rust
//! use fuseguard::registry::BreakerRegistry;
//! use fuseguard::telemetry::BreakerMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(BreakerMetrics::new().unwrap());
//! let registry = BreakerRegistry::default().with_observer(metrics.clone());
//! registry.breaker("payments");
//! let text = metrics.gather();
//! # let _ = text;
//! ```

use crate::observer::{BreakerEvent, BreakerObserver, LogContext};
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

/// 状态指标取值
const STATE_CLOSED: i64 = 0;
const STATE_HALF_OPEN: i64 = 1;
const STATE_OPEN: i64 = 2;

/// 熔断器监控指标
#[derive(Clone)]
pub struct BreakerMetrics {
    /// 按熔断器与事件类型计数
    pub events_total: IntCounterVec,
    /// 当前状态（0 = closed, 1 = half-open, 2 = open）
    pub state: IntGaugeVec,
    /// 指标注册表
    registry: Registry,
}

impl BreakerMetrics {
    /// 创建新的监控指标
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new(
                "fuseguard_breaker_events_total",
                "Total number of circuit breaker events",
            ),
            &["breaker", "event"],
        )?;

        let state = IntGaugeVec::new(
            Opts::new(
                "fuseguard_breaker_state",
                "Current circuit breaker state (0 = closed, 1 = half-open, 2 = open)",
            ),
            &["breaker"],
        )?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(state.clone()))?;

        Ok(Self {
            events_total,
            state,
            registry,
        })
    }

    /// 获取注册表
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 导出文本格式的指标
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("指标编码失败: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl BreakerObserver for BreakerMetrics {
    fn notify(&self, event: BreakerEvent, breaker: &str, _context: &LogContext) {
        self.events_total
            .with_label_values(&[breaker, event.as_str()])
            .inc();

        let state = match event {
            BreakerEvent::Opened => STATE_OPEN,
            BreakerEvent::HalfOpened => STATE_HALF_OPEN,
            BreakerEvent::Closed | BreakerEvent::Reset => STATE_CLOSED,
            BreakerEvent::FailureRecorded | BreakerEvent::Rejected => return,
        };
        self.state.with_label_values(&[breaker]).set(state);
    }
}
