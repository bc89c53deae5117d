//! Sliding-window admission control over the shared counter store.
//!
//! Windowing: fixed-window approximation. The counter key carries the bucket
//! index (`now / window`), so a new window starts a fresh key; the old key
//! expires at twice the window length and is never reset early. A burst of up
//! to 2x the ceiling is possible across a bucket boundary, which is the
//! documented trade-off of this scheme.
//!
//! The counter increment is atomic in the store; increment and compare happen
//! for every non-allowlisted request, and a decision is always returned even
//! when the counter store is unreachable (per the configured fail policy).

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{RateLimitConfig, RateLimitRule};
use crate::services::store::EphemeralStore;

/// Endpoint categories with independently configured ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCategory {
    General,
    Authentication,
    Registration,
    CredentialReset,
}

impl RateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::General => "general",
            RateCategory::Authentication => "authentication",
            RateCategory::Registration => "registration",
            RateCategory::CredentialReset => "credential-reset",
        }
    }
}

/// Admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Deny { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allow)
    }
}

#[derive(Clone)]
pub struct RateLimitService {
    counters: Arc<dyn EphemeralStore>,
    config: RateLimitConfig,
}

impl RateLimitService {
    pub fn new(counters: Arc<dyn EphemeralStore>, config: RateLimitConfig) -> Self {
        Self { counters, config }
    }

    fn rule(&self, category: RateCategory) -> &RateLimitRule {
        match category {
            RateCategory::General => &self.config.general,
            RateCategory::Authentication => &self.config.authentication,
            RateCategory::Registration => &self.config.registration,
            RateCategory::CredentialReset => &self.config.credential_reset,
        }
    }

    /// Admit or refuse a request from `identity` under `category`.
    pub async fn check(&self, identity: &str, category: RateCategory) -> RateDecision {
        self.check_at(identity, category, Utc::now()).await
    }

    /// Clock-explicit variant of [`check`](Self::check).
    pub async fn check_at(
        &self,
        identity: &str,
        category: RateCategory,
        now: DateTime<Utc>,
    ) -> RateDecision {
        if self.config.allowlist.iter().any(|entry| entry == identity) {
            return RateDecision::Allow;
        }

        let rule = self.rule(category);
        let window = rule.window_seconds as i64;
        let bucket = now.timestamp().div_euclid(window);
        let key = format!("rl:{}:{}:{}", category.as_str(), identity, bucket);
        let retry_after_secs = (window - now.timestamp().rem_euclid(window)) as u64;

        match self.counters.incr_with_expiry(&key, window * 2).await {
            Ok(count) if count <= rule.ceiling as i64 => RateDecision::Allow,
            Ok(count) => {
                tracing::debug!(
                    identity = %identity,
                    category = category.as_str(),
                    count,
                    ceiling = rule.ceiling,
                    "Rate limit exceeded"
                );
                RateDecision::Deny { retry_after_secs }
            }
            Err(e) => {
                if self.config.fail_open {
                    tracing::warn!(
                        identity = %identity,
                        category = category.as_str(),
                        error = %e,
                        "Rate counter store unreachable; admitting request (fail-open)"
                    );
                    RateDecision::Allow
                } else {
                    tracing::warn!(
                        identity = %identity,
                        category = category.as_str(),
                        error = %e,
                        "Rate counter store unreachable; refusing request (fail-closed)"
                    );
                    RateDecision::Deny {
                        retry_after_secs: rule.window_seconds,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_are_stable_key_components() {
        assert_eq!(RateCategory::Authentication.as_str(), "authentication");
        assert_eq!(RateCategory::CredentialReset.as_str(), "credential-reset");
    }

    #[test]
    fn deny_carries_a_bounded_retry_hint() {
        let decision = RateDecision::Deny {
            retry_after_secs: 42,
        };
        assert!(!decision.is_allowed());
    }
}
