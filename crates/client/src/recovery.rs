//! Recovery policy for unauthorized responses
//!
//! A 401 is handled in exactly one of three ways, decided up front from
//! the request path and whether the request has already been retried.
//! Making the decision a value keeps the gateway's reactive path a
//! straight-line match and keeps retry-at-most-once structural.

/// Default refresh endpoint path.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Paths excluded from automatic recovery by default. KYC submissions
/// surface their own 401 semantics to the caller.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["/client/kyc"];

/// Which endpoints opt out of automatic refresh, retry, and logout.
///
/// Matching is by substring, so a fragment like `/client/kyc` covers the
/// whole endpoint family beneath it.
#[derive(Clone, Debug)]
pub struct RecoveryPolicy {
    refresh_path: String,
    exclusions: Vec<String>,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl RecoveryPolicy {
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Add a path fragment to the exclusion list.
    pub fn exclude(&mut self, fragment: impl Into<String>) {
        self.exclusions.push(fragment.into());
    }

    /// Decide how to handle an unauthorized response for `path`.
    pub fn on_unauthorized(&self, path: &str, already_retried: bool) -> RecoveryDecision {
        // The refresh endpoint failing is terminal; routing it back
        // through refresh would loop.
        if path.contains(self.refresh_path.as_str()) {
            return RecoveryDecision::Logout(LogoutReason::RefreshRejected);
        }
        if already_retried {
            return RecoveryDecision::Logout(LogoutReason::RetryExhausted);
        }
        if self
            .exclusions
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
        {
            return RecoveryDecision::Passthrough;
        }
        RecoveryDecision::RefreshAndRetry
    }
}

/// What the gateway does with an unauthorized response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Surface the 401 unmodified; no refresh, no retry, no logout.
    Passthrough,
    /// Refresh the session and resend the request once.
    RefreshAndRetry,
    /// Clear the session and notify the host.
    Logout(LogoutReason),
}

/// Why a 401 ended the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogoutReason {
    /// The refresh endpoint itself rejected the credential.
    RefreshRejected,
    /// The request was rejected again after a refresh and retry.
    RetryExhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_refreshes_and_retries() {
        let policy = RecoveryPolicy::default();
        assert_eq!(
            policy.on_unauthorized("/marketplace/bookings", false),
            RecoveryDecision::RefreshAndRetry
        );
    }

    #[test]
    fn refresh_endpoint_failure_is_terminal() {
        let policy = RecoveryPolicy::default();
        assert_eq!(
            policy.on_unauthorized("/auth/refresh", false),
            RecoveryDecision::Logout(LogoutReason::RefreshRejected)
        );
        // Terminal even if the request had somehow been retried.
        assert_eq!(
            policy.on_unauthorized("/auth/refresh", true),
            RecoveryDecision::Logout(LogoutReason::RefreshRejected)
        );
    }

    #[test]
    fn second_failure_logs_out() {
        let policy = RecoveryPolicy::default();
        assert_eq!(
            policy.on_unauthorized("/marketplace/bookings", true),
            RecoveryDecision::Logout(LogoutReason::RetryExhausted)
        );
    }

    #[test]
    fn excluded_paths_pass_through() {
        let policy = RecoveryPolicy::default();
        assert_eq!(
            policy.on_unauthorized("/client/kyc/submit", false),
            RecoveryDecision::Passthrough
        );
    }

    #[test]
    fn custom_exclusions_pass_through() {
        let mut policy = RecoveryPolicy::default();
        policy.exclude("/payments/webhook");
        assert_eq!(
            policy.on_unauthorized("/payments/webhook/mpesa", false),
            RecoveryDecision::Passthrough
        );
    }

    #[test]
    fn matching_is_by_substring() {
        let policy = RecoveryPolicy::default();
        assert_eq!(
            policy.on_unauthorized("/api/v2/auth/refresh", false),
            RecoveryDecision::Logout(LogoutReason::RefreshRejected)
        );
    }
}
