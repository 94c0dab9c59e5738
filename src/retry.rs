//! Retry policy
//!
//! A cycle probes up to `retry_count` times with a fixed delay between
//! attempts and stops at the first attempt that satisfies the target's
//! rules. The outcome of the last attempt is the outcome of the cycle.

use std::time::Duration;

use regex::Regex;
use tracing::{debug, instrument, trace};

use crate::check::CheckOutcome;
use crate::clock::Clock;
use crate::config::ResolvedTarget;
use crate::probe::{ProbeRequest, ProbeResponse, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn for_target(target: &ResolvedTarget) -> Self {
        Self {
            attempts: target.retry_count.max(1),
            delay: target.retry_delay,
        }
    }
}

/// What a response has to satisfy to count as a successful attempt
#[derive(Debug, Clone)]
pub struct CheckRules {
    expected_status: Option<Vec<u16>>,
    expected_content: Option<String>,
    body_pattern: Option<Regex>,
    max_response_time: Option<u64>,
}

impl CheckRules {
    pub fn new(target: &ResolvedTarget) -> Result<Self, regex::Error> {
        let body_pattern = target.body_pattern.as_deref().map(Regex::new).transpose()?;

        Ok(Self {
            expected_status: target.expected_status.clone(),
            expected_content: target.expected_content.clone(),
            body_pattern,
            max_response_time: target.max_response_time,
        })
    }

    /// Check a response against the rules, returning the first violation
    pub fn evaluate(&self, response: &ProbeResponse) -> Result<(), String> {
        let status = response.status_code;
        let status_ok = match &self.expected_status {
            Some(expected) => expected.contains(&status),
            // any 2xx
            None => (200..300).contains(&status),
        };
        if !status_ok {
            return Err(format!("unexpected status code {status}"));
        }

        if let Some(content) = &self.expected_content
            && !response.body.contains(content.as_str())
        {
            return Err(format!("expected content `{content}` not found"));
        }

        if let Some(pattern) = &self.body_pattern
            && !pattern.is_match(&response.body)
        {
            return Err(format!("body does not match pattern `{pattern}`"));
        }

        let elapsed_ms = response.response_time.as_millis() as u64;
        if let Some(max) = self.max_response_time
            && elapsed_ms > max
        {
            return Err(format!("response time {elapsed_ms}ms exceeds {max}ms"));
        }

        Ok(())
    }
}

/// Run one retry-gated check cycle
///
/// Never fails: transport errors and rule violations become a failed
/// outcome carrying the error text.
#[instrument(skip_all, fields(service = %target.name))]
pub async fn run_check(
    transport: &dyn Transport,
    target: &ResolvedTarget,
    clock: &dyn Clock,
) -> CheckOutcome {
    let rules = match CheckRules::new(target) {
        Ok(rules) => rules,
        Err(e) => return CheckOutcome::failure(clock.now(), format!("invalid body pattern: {e}")),
    };
    let policy = RetryPolicy::for_target(target);
    let request = ProbeRequest::from(target);

    let mut attempt = 1;
    loop {
        let outcome = attempt_once(transport, &request, &rules, clock).await;
        if outcome.success || attempt >= policy.attempts {
            trace!(attempt, success = outcome.success, "cycle finished");
            return outcome;
        }

        debug!(
            attempt,
            attempts = policy.attempts,
            "attempt failed ({}), retrying in {:?}",
            outcome.error_text(),
            policy.delay
        );
        tokio::time::sleep(policy.delay).await;
        attempt += 1;
    }
}

async fn attempt_once(
    transport: &dyn Transport,
    request: &ProbeRequest,
    rules: &CheckRules,
    clock: &dyn Clock,
) -> CheckOutcome {
    match transport.probe(request).await {
        Ok(response) => {
            let verdict = rules.evaluate(&response);
            CheckOutcome {
                timestamp: clock.now(),
                success: verdict.is_ok(),
                status_code: Some(response.status_code),
                response_time_ms: Some(response.response_time.as_millis() as u64),
                error: verdict.err(),
                ssl: response.ssl,
            }
        }
        Err(e) => CheckOutcome::failure(clock.now(), e.to_string()),
    }
}
