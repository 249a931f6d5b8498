//! Outbound request cancellation policy.
//!
//! Providers may configure a per-request `timeout` in their options. The
//! policy composes that timeout with any caller-supplied cancellation token,
//! first to fire wins. Cancellation never invalidates cached clients, only
//! the in-flight request it guards.

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::types::OptionsMap;

/// Cancellation policy applied to a client's outbound requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestPolicy {
    /// Per-request timeout. `None` leaves caller cancellation untouched.
    pub timeout: Option<Duration>,
}

impl RequestPolicy {
    /// Read the policy from merged provider options.
    ///
    /// A numeric `timeout` is milliseconds; `false` disables the timeout
    /// explicitly; anything else leaves the policy empty.
    pub fn from_options(options: &OptionsMap) -> Self {
        let timeout = match options.get("timeout") {
            Some(Value::Number(ms)) => ms.as_u64().map(Duration::from_millis),
            _ => None,
        };
        Self { timeout }
    }

    /// Build the token an outbound request should observe.
    ///
    /// The returned token fires when the caller's token fires or when the
    /// configured timeout elapses, whichever happens first.
    pub fn guard(&self, caller: Option<&CancellationToken>) -> CancellationToken {
        let token = match caller {
            Some(caller) => caller.child_token(),
            None => CancellationToken::new(),
        };
        if let Some(timeout) = self.timeout {
            let timer = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => timer.cancel(),
                    _ = timer.cancelled() => {}
                }
            });
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> OptionsMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn policy_reads_numeric_timeout_as_millis() {
        let policy = RequestPolicy::from_options(&options(json!({ "timeout": 1500 })));
        assert_eq!(policy.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn policy_treats_false_as_disabled() {
        let policy = RequestPolicy::from_options(&options(json!({ "timeout": false })));
        assert_eq!(policy.timeout, None);
    }

    #[test]
    fn policy_defaults_to_no_timeout() {
        let policy = RequestPolicy::from_options(&OptionsMap::new());
        assert_eq!(policy.timeout, None);
    }

    #[tokio::test(start_paused = true)]
    async fn guard_fires_on_timeout() {
        let policy = RequestPolicy {
            timeout: Some(Duration::from_millis(100)),
        };
        let guard = policy.guard(None);
        assert!(!guard.is_cancelled());
        tokio::time::sleep(Duration::from_millis(150)).await;
        guard.cancelled().await;
    }

    #[tokio::test]
    async fn guard_fires_on_caller_cancellation_first() {
        let policy = RequestPolicy {
            timeout: Some(Duration::from_secs(3600)),
        };
        let caller = CancellationToken::new();
        let guard = policy.guard(Some(&caller));
        caller.cancel();
        guard.cancelled().await;
    }

    #[tokio::test]
    async fn guard_without_timeout_follows_caller_only() {
        let policy = RequestPolicy::default();
        let caller = CancellationToken::new();
        let guard = policy.guard(Some(&caller));
        assert!(!guard.is_cancelled());
        caller.cancel();
        guard.cancelled().await;
    }
}
