//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from FuseGuard,
//! allowing users to import them with a single `use fuseguard::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::circuit_breaker::CircuitBreaker;
pub use crate::config::{BreakerConfig, BreakerConfigOverride, RegistryConfig};
pub use crate::error::{BreakerError, CircuitState, FuseGuardError};
pub use crate::registry::BreakerRegistry;

// Observability seams
pub use crate::observer::{BreakerEvent, BreakerLogger, BreakerObserver, EventChannel};

// Feature-gated exports
#[cfg(feature = "monitoring")]
pub use crate::telemetry::BreakerMetrics;
