//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 熔断器注册表
//!
//! 按依赖名管理熔断器实例：首次查找时按配置创建，之后始终返回同一实例。
//! 注册表由调用方显式创建并持有（通常在进程启动时创建一次，再以 `Arc` 共享给各服务），
//! 不存在隐式的全局单例。

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{BreakerConfig, BreakerConfigOverride, RegistryConfig};
use crate::error::{BreakerError, BreakerStats, FuseGuardError};
use crate::observer::{BreakerLogger, BreakerObserver, TracingLogger};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// 熔断器注册表
pub struct BreakerRegistry {
    /// 按名称索引的熔断器
    breakers: DashMap<String, Arc<CircuitBreaker>, RandomState>,
    /// 配置（构造时已校验）
    config: RegistryConfig,
    /// 注入到每个熔断器的日志接口
    logger: Arc<dyn BreakerLogger>,
    /// 注入到每个熔断器的观察者
    observers: Vec<Arc<dyn BreakerObserver>>,
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.names())
            .field("config", &self.config)
            .finish()
    }
}

impl BreakerRegistry {
    /// 创建新的注册表
    ///
    /// 所有可解析的配置（默认、内置预设、配置文件中的服务）在此校验，
    /// 因此不带覆盖的查找不会失败。
    ///
    /// # 示例
    /// ```rust
    /// use fuseguard::config::RegistryConfig;
    /// use fuseguard::registry::BreakerRegistry;
    /// use std::sync::Arc;
    ///
    /// let registry = Arc::new(BreakerRegistry::new(RegistryConfig::default()).unwrap());
    /// let breaker = registry.breaker("payments");
    /// assert!(Arc::ptr_eq(&breaker, &registry.breaker("payments")));
    /// ```
    pub fn new(config: RegistryConfig) -> Result<Self, FuseGuardError> {
        config.validate()?;
        info!(
            "创建熔断器注册表: builtin_services={}, services={}",
            config.builtin_services,
            config.services.len()
        );

        Ok(Self {
            breakers: DashMap::with_hasher(RandomState::new()),
            config,
            logger: Arc::new(TracingLogger),
            observers: Vec::new(),
        })
    }

    /// 设置注入到新建熔断器的日志接口
    pub fn with_logger(mut self, logger: Arc<dyn BreakerLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// 添加注入到新建熔断器的观察者
    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// 获取配置
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// 获取或创建熔断器
    ///
    /// 名称已存在时直接返回已有实例，`overrides` 被忽略：配置在首次创建时确定。
    ///
    /// # 返回
    /// - `Ok(Arc<CircuitBreaker>)`: 熔断器实例
    /// - `Err(FuseGuardError::ConfigError)`: 首次创建时合并后的配置无效
    pub fn get_or_create(
        &self,
        name: &str,
        overrides: Option<&BreakerConfigOverride>,
    ) -> Result<Arc<CircuitBreaker>, FuseGuardError> {
        if let Some(existing) = self.breakers.get(name) {
            if overrides.is_some_and(|o| !o.is_empty()) {
                debug!("熔断器已存在，忽略覆盖配置: name={}", name);
            }
            return Ok(existing.value().clone());
        }

        // entry 持有分片写锁，保证同名熔断器只被构造一次
        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let config = self.config.resolve(name, overrides)?;
                let breaker = Arc::new(self.build(name, config));
                entry.insert(breaker.clone());
                Ok(breaker)
            }
        }
    }

    /// 获取或创建熔断器（不带覆盖配置）
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                // 构造时已校验，未知名称回落到基础配置
                let config = self
                    .config
                    .resolve(name, None)
                    .unwrap_or_else(|_| self.config.base_config());
                Arc::new(self.build(name, config))
            })
            .value()
            .clone()
    }

    fn build(&self, name: &str, config: BreakerConfig) -> CircuitBreaker {
        info!(
            "创建熔断器: name={}, failure_threshold={}, success_threshold={}, reset_timeout={:?}, timeout={:?}",
            name,
            config.failure_threshold,
            config.success_threshold,
            config.reset_timeout,
            config.timeout
        );

        self.observers.iter().fold(
            CircuitBreaker::new(name, config).with_logger(self.logger.clone()),
            |breaker, observer| breaker.with_observer(observer.clone()),
        )
    }

    /// 查找已存在的熔断器（不创建）
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// 已注册的熔断器名称（按名称排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// 已创建的熔断器数量
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// 是否尚未创建任何熔断器
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// 所有熔断器的统计信息（按名称排序）
    pub fn list_stats(&self) -> Vec<BreakerStats> {
        // 先复制出实例，避免持有分片锁时再加熔断器锁
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();
        let mut stats: Vec<BreakerStats> = breakers.iter().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// 组合健康状态文档
    ///
    /// ```json
    /// { "healthy": false, "open": ["payments"], "breakers": [ ... ] }
    /// ```
    pub fn stats_json(&self) -> Result<serde_json::Value, FuseGuardError> {
        let stats = self.list_stats();
        let open: Vec<&str> = stats
            .iter()
            .filter(|s| s.state == crate::error::CircuitState::Open)
            .map(|s| s.name.as_str())
            .collect();

        Ok(serde_json::json!({
            "healthy": open.is_empty(),
            "open": open,
            "breakers": serde_json::to_value(&stats)?,
        }))
    }

    /// 重置所有熔断器（保留实例）
    pub fn reset_all(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();
        info!("重置所有熔断器: count={}", breakers.len());
        for breaker in breakers {
            breaker.reset();
        }
    }

    /// 移除所有熔断器，下次查找时重新创建
    pub fn clear(&self) {
        info!("清除所有熔断器: count={}", self.breakers.len());
        self.breakers.clear();
    }

    /// 通过指定名称的熔断器执行操作
    pub async fn execute<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breaker(name).execute(operation).await
    }

    /// 执行操作，熔断器打开时改用降级结果
    ///
    /// 仅当调用因熔断器打开被拒绝时才执行 `fallback`；
    /// 超时和操作自身的错误照常返回，不会被降级结果掩盖。
    ///
    /// # 示例
    /// ```rust
    /// use fuseguard::registry::BreakerRegistry;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let registry = BreakerRegistry::default();
    /// let rate = registry
    ///     .execute_with_fallback(
    ///         "shipping",
    ///         || async { Ok::<_, std::io::Error>(1299u64) },
    ///         || async { 999u64 },
    ///     )
    ///     .await
    ///     .unwrap();
    /// assert_eq!(rate, 1299);
    /// # }
    /// ```
    pub async fn execute_with_fallback<F, Fut, T, E, FB, FbFut>(
        &self,
        name: &str,
        operation: F,
        fallback: FB,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> FbFut,
        FbFut: Future<Output = T>,
    {
        match self.execute(name, operation).await {
            Err(BreakerError::Open { name, state }) => {
                debug!("熔断器打开，使用降级结果: name={}, state={}", name, state);
                Ok(fallback().await)
            }
            other => other,
        }
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self {
            breakers: DashMap::with_hasher(RandomState::new()),
            config: RegistryConfig::default(),
            logger: Arc::new(TracingLogger),
            observers: Vec::new(),
        }
    }
}
