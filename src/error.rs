//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。
//!
//! - [`BreakerError`]: 一次受保护调用的失败结果（熔断拒绝、超时或操作自身错误）
//! - [`FuseGuardError`]: 配置加载与校验等非调用路径上的错误

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 受保护调用的错误
///
/// `E` 为被保护操作自身的错误类型，`Operation` 变体原样携带它，
/// 熔断器不会对其做任何包装或改写。
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// 熔断器打开，调用未被执行
    #[error("熔断器打开，请求被拒绝: breaker={name}, state={state}")]
    Open {
        /// 熔断器名称
        name: String,
        /// 拒绝时的状态
        state: CircuitState,
    },

    /// 调用超时（按失败计数）
    #[error("调用超时: breaker={name}, timeout={timeout:?}")]
    Timeout {
        /// 熔断器名称
        name: String,
        /// 配置的超时时间
        timeout: Duration,
    },

    /// 被保护操作返回的原始错误
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// 是否因熔断器打开而被拒绝
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// 是否为超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// 是否为操作自身的错误
    pub fn is_operation(&self) -> bool {
        matches!(self, BreakerError::Operation(_))
    }

    /// 熔断器名称（操作错误不携带名称）
    pub fn breaker_name(&self) -> Option<&str> {
        match self {
            BreakerError::Open { name, .. } | BreakerError::Timeout { name, .. } => Some(name),
            BreakerError::Operation(_) => None,
        }
    }

    /// 借用操作自身的错误
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// 取出操作自身的错误
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// FuseGuard 错误类型
#[derive(Error, Debug)]
pub enum FuseGuardError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 验证错误
    #[error("验证错误: {0}")]
    ValidationError(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// YAML解析错误
    #[error("YAML解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML解析错误
    #[error("TOML解析错误: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// 关闭状态（正常）
    Closed,
    /// 打开状态（熔断）
    Open,
    /// 半开状态（探测）
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 熔断器统计信息（只读快照）
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BreakerStats {
    /// 熔断器名称
    pub name: String,
    /// 当前状态
    pub state: CircuitState,
    /// 连续失败次数
    pub consecutive_failures: u64,
    /// 半开状态下的连续成功次数
    pub consecutive_successes: u64,
    /// 最后失败时间
    pub last_failure_at: Option<chrono::DateTime<chrono::Utc>>,
    /// 最后成功时间
    pub last_success_at: Option<chrono::DateTime<chrono::Utc>>,
    /// 打开状态的截止时间（仅打开状态下有值）
    pub opened_until: Option<chrono::DateTime<chrono::Utc>>,
    /// 总请求数（含被拒绝的请求）
    pub total_requests: u64,
    /// 总失败数（含超时）
    pub total_failures: u64,
    /// 总成功数
    pub total_successes: u64,
    /// 因熔断被拒绝的请求数
    pub total_rejected: u64,
}
