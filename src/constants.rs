//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for FuseGuard.
//!
//! Every default threshold and duration used by breakers and the registry
//! is defined here, together with the built-in per-service presets.

// ============================================================================
// Circuit Breaker Constants
// ============================================================================

/// Default failure threshold for circuit breaker.
///
/// The circuit breaker transitions to open state after this many consecutive failures.
pub const DEFAULT_FAILURE_THRESHOLD: u64 = 5;

/// Default success threshold for circuit breaker half-open state.
///
/// The circuit breaker transitions to closed state after this many consecutive
/// successes in half-open state.
pub const DEFAULT_SUCCESS_THRESHOLD: u64 = 2;

/// Default reset timeout (30 seconds).
///
/// How long the circuit breaker remains open before admitting a probe call.
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 30_000;

/// Default per-call timeout (10 seconds).
///
/// A protected call running longer than this is abandoned and counted as a failure.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;

/// Upper bound for the reset timeout (24 hours).
///
/// Larger values are rejected by validation and clamped by breakers built directly.
pub const MAX_RESET_TIMEOUT_MS: u64 = 86_400_000;

/// Upper bound for the per-call timeout (1 hour).
pub const MAX_CALL_TIMEOUT_MS: u64 = 3_600_000;

// ============================================================================
// Event Channel Constants
// ============================================================================

/// Default capacity of the broadcast channel used by `EventChannel`.
///
/// Lagging subscribers lose the oldest notifications once this many are buffered.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Built-in Service Presets
// ============================================================================

/// Payment processor.
pub const SERVICE_PAYMENTS: &str = "payments";

/// Banking / account aggregation API.
pub const SERVICE_BANKING: &str = "banking";

/// Shipping carrier API.
pub const SERVICE_SHIPPING: &str = "shipping";

/// Object storage backend.
pub const SERVICE_STORAGE: &str = "storage";

/// Transactional email provider.
pub const SERVICE_EMAIL: &str = "email";

/// A built-in preset row.
///
/// Fields: name, failure_threshold, success_threshold, reset_timeout_ms, timeout_ms.
pub type ServicePreset = (&'static str, u64, u64, u64, u64);

/// Built-in per-service defaults applied on top of the crate defaults.
pub const BUILTIN_SERVICE_PRESETS: &[ServicePreset] = &[
    (SERVICE_PAYMENTS, 3, 2, 60_000, 15_000),
    (SERVICE_BANKING, 3, 2, 60_000, 20_000),
    (SERVICE_SHIPPING, 5, 2, 30_000, 10_000),
    (SERVICE_STORAGE, 5, 3, 30_000, 8_000),
    (SERVICE_EMAIL, 5, 2, 60_000, 10_000),
];
