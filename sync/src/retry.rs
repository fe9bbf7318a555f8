//! Error classifier & retry policy (§4.3) — pure, dependency-free
//! mapping from a dispatch outcome to `{category, retryable, delay}`.
//!
//! Nothing in this module touches the store or the network: it is the
//! one part of the sync stack that is safe to property-test in
//! isolation (see `proptests` below).

use std::time::Duration;

use rand::Rng;

use errors::DispatchError;

/// §4.3 categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Network,
    Timeout,
    Server5xx,
    Client4xx,
    Auth,
    RateLimit,
    Conflict,
    Validation,
    Unknown,
}

impl ErrorCategory {
    /// Retryable: `Network`, `Timeout`, `Server5xx`, `RateLimit`.
    /// `Unknown` is retryable up to a conservative cap (§4.3). Not
    /// retryable: `Client4xx` (except `RateLimit`), `Auth`,
    /// `Validation`, `Conflict` (delegated to §4.4).
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Server5xx | Self::RateLimit | Self::Unknown)
    }
}

/// Classifies a dispatch outcome into its §4.3 category, plus the
/// server-suggested `Retry-After` delay when the error carries one.
#[must_use]
pub fn classify(error: &DispatchError) -> (ErrorCategory, Option<Duration>) {
    match error {
        DispatchError::Network { .. } => (ErrorCategory::Network, None),
        DispatchError::Timeout { .. } => (ErrorCategory::Timeout, None),
        DispatchError::Server5xx { .. } => (ErrorCategory::Server5xx, None),
        DispatchError::Client4xx { .. } => (ErrorCategory::Client4xx, None),
        DispatchError::Auth { .. } => (ErrorCategory::Auth, None),
        DispatchError::RateLimit { retry_after_secs } => {
            (ErrorCategory::RateLimit, retry_after_secs.map(Duration::from_secs))
        }
        DispatchError::Conflict { .. } => (ErrorCategory::Conflict, None),
        DispatchError::Validation { .. } => (ErrorCategory::Validation, None),
        DispatchError::PermanentMonetaryRejection { .. } => (ErrorCategory::Client4xx, None),
        DispatchError::Unknown { .. } => (ErrorCategory::Unknown, None),
    }
}

/// One of the three named backoff presets (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    /// `base=1s, cap=60s, max_retries=5`.
    pub const DEFAULT: Self = Self { base: Duration::from_secs(1), cap: Duration::from_secs(60), max_retries: 5 };
    /// `base=500ms, cap=300s, max_retries=10` — monetary operations.
    pub const CRITICAL: Self =
        Self { base: Duration::from_millis(500), cap: Duration::from_secs(300), max_retries: 10 };
    /// `base=5s, cap=600s, max_retries=3` — catalogue refresh.
    pub const CONSERVATIVE: Self = Self { base: Duration::from_secs(5), cap: Duration::from_secs(600), max_retries: 3 };

    /// §4.3: `pending_transaction` (and other monetary entity types) use
    /// the critical policy; read-mostly catalogue entities use the
    /// conservative one; everything else uses the default.
    #[must_use]
    pub fn for_entity_type(entity_type: &str) -> Self {
        match entity_type {
            core::types::ENTITY_TYPE_PENDING_TRANSACTION => Self::CRITICAL,
            "cached_product" | "cached_stand" => Self::CONSERVATIVE,
            _ => Self::DEFAULT,
        }
    }
}

/// The pre-jitter delay: `min(cap, base · 2^attempt)`. Exposed
/// separately from [`next_delay`] so backoff-monotonicity assertions
/// (Testable Property 4) don't have to fight jitter.
#[must_use]
pub fn base_delay(policy: RetryPolicy, attempt: u32) -> Duration {
    let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let scaled_nanos = policy.base.as_nanos().saturating_mul(u128::from(multiplier));
    let capped_nanos = scaled_nanos.min(policy.cap.as_nanos());
    Duration::from_nanos(u64::try_from(capped_nanos).unwrap_or(u64::MAX))
}

/// §4.3 full jitter: `delay = min(cap, base · 2^attempt) · rand(0.5, 1.5)`.
#[must_use]
pub fn next_delay(policy: RetryPolicy, attempt: u32) -> Duration {
    let capped = base_delay(policy, attempt);
    let jitter = rand::thread_rng().gen_range(0.5_f64..1.5_f64);
    Duration::from_secs_f64(capped.as_secs_f64() * jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_rate_limit_retry_after() {
        let err = DispatchError::RateLimit { retry_after_secs: Some(30) };
        let (category, retry_after) = classify(&err);
        assert_eq!(category, ErrorCategory::RateLimit);
        assert_eq!(retry_after, Some(Duration::from_secs(30)));
        assert!(category.is_retryable());
    }

    #[test]
    fn classify_auth_is_not_retryable() {
        let err = DispatchError::Auth { reason: "expired".to_string() };
        let (category, _) = classify(&err);
        assert!(!category.is_retryable());
    }

    #[test]
    fn base_delay_doubles_until_cap() {
        let policy = RetryPolicy::DEFAULT;
        assert_eq!(base_delay(policy, 0), Duration::from_secs(1));
        assert_eq!(base_delay(policy, 1), Duration::from_secs(2));
        assert_eq!(base_delay(policy, 2), Duration::from_secs(4));
        assert_eq!(base_delay(policy, 10), policy.cap, "large attempts saturate at the cap");
    }

    #[test]
    fn critical_policy_matches_monetary_entity_type() {
        let policy = RetryPolicy::for_entity_type(core::types::ENTITY_TYPE_PENDING_TRANSACTION);
        assert_eq!(policy, RetryPolicy::CRITICAL);
    }

    #[test]
    fn next_delay_stays_within_full_jitter_bounds() {
        let policy = RetryPolicy::DEFAULT;
        for attempt in 0..5 {
            let base = base_delay(policy, attempt).as_secs_f64();
            for _ in 0..50 {
                let delay = next_delay(policy, attempt).as_secs_f64();
                assert!(delay >= base * 0.5 - f64::EPSILON);
                assert!(delay <= base * 1.5 + f64::EPSILON);
            }
        }
    }
}
