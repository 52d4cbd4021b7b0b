//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! FuseGuard - Failure isolation for calls to unreliable external dependencies
//!
//! Every call to a payment processor, banking API, carrier API, object storage
//! backend or email provider goes through a named circuit breaker, which decides
//! whether the call is attempted at all given the recent failure history of
//! that dependency.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use fuseguard::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`CircuitBreaker`] - Per-dependency state machine with call timeout
//! - [`BreakerRegistry`] - Named breakers, created lazily with per-service defaults
//! - [`BreakerConfig`] / [`RegistryConfig`] - Configuration (YAML / TOML loadable)
//! - [`BreakerError`] / [`FuseGuardError`] - Error types
//!
//! ## Observability
//!
//! - [`BreakerLogger`] - Structured log sink, defaults to `tracing`
//! - [`BreakerObserver`] / [`EventChannel`] - State change notifications
//! - Prometheus metrics (requires `monitoring` feature)
//!
//! # Examples
//!
//! ```rust
//! use fuseguard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = BreakerRegistry::default();
//!
//!     let result = registry
//!         .execute("payments", || async { Ok::<_, std::io::Error>("charge_123") })
//!         .await;
//!
//!     match result {
//!         Ok(charge) => assert_eq!(charge, "charge_123"),
//!         Err(e) if e.is_open() => { /* 服务暂不可用，稍后重试 */ }
//!         Err(e) => panic!("{}", e),
//!     }
//! }
//! ```

pub mod prelude;

pub mod circuit_breaker;
pub mod config;
pub mod constants;
pub mod error;
pub mod observer;
pub mod registry;
#[cfg(feature = "monitoring")]
pub mod telemetry;

// 重新导出常用类型
pub use circuit_breaker::CircuitBreaker;
pub use config::{BreakerConfig, BreakerConfigOverride, RegistryConfig};
pub use error::{BreakerError, BreakerStats, CircuitState, FuseGuardError};
pub use observer::{
    BreakerEvent, BreakerLogger, BreakerNotification, BreakerObserver, EventChannel, LogContext,
    LogLevel, NoopLogger, TracingLogger,
};
pub use registry::BreakerRegistry;
#[cfg(feature = "monitoring")]
pub use telemetry::BreakerMetrics;
