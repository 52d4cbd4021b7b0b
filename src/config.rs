//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 配置模块
//!
//! 定义熔断器配置、可反序列化的局部覆盖配置，以及注册表的配置文件格式。
//!
//! 注册表为名为 `n` 的熔断器解析配置时按以下顺序逐层覆盖：
//!
//! 1. 内置默认值（[`BreakerConfig::default`]）
//! 2. 配置文件中的 `defaults`
//! 3. 内置服务预设（`builtin_services` 为 true 时）
//! 4. 配置文件中的 `services[n]`
//! 5. 调用方传入的覆盖配置

use crate::constants::{
    BUILTIN_SERVICE_PRESETS, DEFAULT_CALL_TIMEOUT_MS, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_RESET_TIMEOUT_MS, DEFAULT_SUCCESS_THRESHOLD, MAX_CALL_TIMEOUT_MS,
    MAX_RESET_TIMEOUT_MS,
};
use crate::error::FuseGuardError;
use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 熔断器配置（构造后不可变）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// 失败阈值（关闭状态下连续失败达到此值时熔断）
    pub failure_threshold: u64,
    /// 成功阈值（半开状态下连续成功达到此值时恢复）
    pub success_threshold: u64,
    /// 打开状态持续时间（之后允许探测调用）
    pub reset_timeout: Duration,
    /// 单次调用的超时时间
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            reset_timeout: Duration::from_millis(DEFAULT_RESET_TIMEOUT_MS),
            timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
        }
    }
}

impl BreakerConfig {
    /// 创建新的熔断器配置
    pub fn new(
        failure_threshold: u64,
        reset_timeout: Duration,
        success_threshold: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            reset_timeout,
            timeout,
        }
    }

    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u64) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), FuseGuardError> {
        if self.failure_threshold == 0 {
            return Err(FuseGuardError::ValidationError(
                "failure_threshold 必须大于 0".to_string(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(FuseGuardError::ValidationError(
                "success_threshold 必须大于 0".to_string(),
            ));
        }
        if self.reset_timeout.is_zero() {
            return Err(FuseGuardError::ValidationError(
                "reset_timeout 必须大于 0".to_string(),
            ));
        }
        if self.reset_timeout > Duration::from_millis(MAX_RESET_TIMEOUT_MS) {
            return Err(FuseGuardError::ValidationError(format!(
                "reset_timeout 不能超过 {}ms",
                MAX_RESET_TIMEOUT_MS
            )));
        }
        if self.timeout.is_zero() {
            return Err(FuseGuardError::ValidationError(
                "timeout 必须大于 0".to_string(),
            ));
        }
        if self.timeout > Duration::from_millis(MAX_CALL_TIMEOUT_MS) {
            return Err(FuseGuardError::ValidationError(format!(
                "timeout 不能超过 {}ms",
                MAX_CALL_TIMEOUT_MS
            )));
        }
        Ok(())
    }
}

/// 局部覆盖配置
///
/// 所有字段可选，未设置的字段沿用下层配置。时长以毫秒表示，便于写入配置文件。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerConfigOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl BreakerConfigOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    pub fn success_threshold(mut self, threshold: u64) -> Self {
        self.success_threshold = Some(threshold);
        self
    }

    pub fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout_ms = Some(duration_to_millis(reset_timeout));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(duration_to_millis(timeout));
        self
    }

    /// 是否未设置任何字段
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// 在 `base` 之上应用覆盖，返回合并后的配置（不做校验）
    pub fn apply_to(&self, base: &BreakerConfig) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            success_threshold: self.success_threshold.unwrap_or(base.success_threshold),
            reset_timeout: self
                .reset_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.reset_timeout),
            timeout: self
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.timeout),
        }
    }
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// 内置服务预设
pub fn builtin_service_override(name: &str) -> Option<BreakerConfigOverride> {
    BUILTIN_SERVICE_PRESETS
        .iter()
        .find(|(service, ..)| *service == name)
        .map(
            |(_, failure, success, reset_ms, timeout_ms)| BreakerConfigOverride {
                failure_threshold: Some(*failure),
                success_threshold: Some(*success),
                reset_timeout_ms: Some(*reset_ms),
                timeout_ms: Some(*timeout_ms),
            },
        )
}

fn default_builtin_services() -> bool {
    true
}

/// 注册表配置
///
/// ```yaml
/// defaults:
///   failure_threshold: 5
///   timeout_ms: 10000
/// services:
///   payments:
///     timeout_ms: 20000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// 应用于所有熔断器的默认覆盖
    #[serde(default)]
    pub defaults: BreakerConfigOverride,
    /// 按服务名的覆盖
    #[serde(default)]
    pub services: HashMap<String, BreakerConfigOverride>,
    /// 是否启用内置服务预设
    #[serde(default = "default_builtin_services")]
    pub builtin_services: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            defaults: BreakerConfigOverride::default(),
            services: HashMap::new(),
            builtin_services: default_builtin_services(),
        }
    }
}

impl RegistryConfig {
    /// 从YAML字符串加载
    pub fn from_yaml_str(content: &str) -> Result<Self, FuseGuardError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// 从TOML字符串加载
    pub fn from_toml_str(content: &str) -> Result<Self, FuseGuardError> {
        Ok(toml::from_str(content)?)
    }

    /// 从文件加载，根据扩展名选择格式
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FuseGuardError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(FuseGuardError::ConfigError(format!(
                "不支持的配置文件格式: {}",
                path.display()
            ))),
        }
    }

    /// 设置某个服务的覆盖
    pub fn service(mut self, name: impl Into<String>, overrides: BreakerConfigOverride) -> Self {
        self.services.insert(name.into(), overrides);
        self
    }

    /// 设置默认覆盖
    pub fn defaults(mut self, overrides: BreakerConfigOverride) -> Self {
        self.defaults = overrides;
        self
    }

    /// 启用或禁用内置服务预设
    pub fn builtin_services(mut self, enabled: bool) -> Self {
        self.builtin_services = enabled;
        self
    }

    /// 未知服务名使用的基础配置
    pub fn base_config(&self) -> BreakerConfig {
        self.defaults.apply_to(&BreakerConfig::default())
    }

    /// 解析某个服务的配置（不含调用方覆盖，不做校验）
    pub fn service_config(&self, name: &str) -> BreakerConfig {
        let mut config = self.base_config();
        if self.builtin_services {
            if let Some(preset) = builtin_service_override(name) {
                config = preset.apply_to(&config);
            }
        }
        if let Some(overrides) = self.services.get(name) {
            config = overrides.apply_to(&config);
        }
        config
    }

    /// 解析某个服务的最终配置并校验
    pub fn resolve(
        &self,
        name: &str,
        overrides: Option<&BreakerConfigOverride>,
    ) -> Result<BreakerConfig, FuseGuardError> {
        let mut config = self.service_config(name);
        if let Some(overrides) = overrides {
            config = overrides.apply_to(&config);
        }
        config
            .validate()
            .map_err(|e| FuseGuardError::ConfigError(format!("熔断器[{}]配置无效: {}", name, e)))?;
        Ok(config)
    }

    /// 校验所有可解析的配置
    pub fn validate(&self) -> Result<(), FuseGuardError> {
        self.resolve("", None)?;
        if self.builtin_services {
            for (name, ..) in BUILTIN_SERVICE_PRESETS {
                self.resolve(name, None)?;
            }
        }
        for name in self.services.keys() {
            self.resolve(name, None)?;
        }
        Ok(())
    }
}
