//! Circuit Breaker (C7): a ring-buffer sliding window per named breaker,
//! with CLOSED / OPEN / HALF_OPEN states (§4.8).
//!
//! Grounded on the teacher's `services::circuit_breaker` for the overall
//! shape (a registry keyed by breaker name, shared across routes that name
//! the same breaker) but replaces its consecutive-failure counter with a
//! fixed-size ring buffer of the last `window_size` call outcomes, because
//! §4.8 defines OPEN as a *rate* over a window ("at least `minimum_samples`
//! calls and failure rate exceeds `failure_rate_threshold`"), not a streak.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use tokio::sync::{Mutex, RwLock};

use crate::models::route::CircuitBreakerPolicy;
use crate::services::telemetry::{CircuitBreakerEvent, TelemetryEmitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallOutcome {
    failed: bool,
    slow: bool,
}

struct Breaker {
    name: String,
    policy: CircuitBreakerPolicy,
    state: BreakerState,
    ring: Vec<CallOutcome>,
    next_slot: usize,
    filled: usize,
    opened_at: Option<Instant>,
    half_open_probes_issued: u32,
}

impl Breaker {
    fn new(name: String, policy: CircuitBreakerPolicy) -> Self {
        let window_size = policy.window_size.max(1);
        Self {
            name,
            policy,
            state: BreakerState::Closed,
            ring: Vec::with_capacity(window_size),
            next_slot: 0,
            filled: 0,
            opened_at: None,
            half_open_probes_issued: 0,
        }
    }

    fn record(&mut self, failed: bool, slow: bool) -> CallOutcome {
        let outcome = CallOutcome { failed, slow };
        let window_size = self.policy.window_size.max(1);
        if self.ring.len() < window_size {
            self.ring.push(outcome);
        } else {
            self.ring[self.next_slot] = outcome;
        }
        self.next_slot = (self.next_slot + 1) % window_size;
        self.filled = (self.filled + 1).min(window_size);
        outcome
    }

    fn failure_rate(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        let failures = self.ring[..self.filled].iter().filter(|o| o.failed).count();
        failures as f64 / self.filled as f64
    }

    fn slow_call_rate(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        let slow = self.ring[..self.filled].iter().filter(|o| o.slow).count();
        slow as f64 / self.filled as f64
    }

    fn counts(&self) -> (usize, usize, usize) {
        let failures = self.ring[..self.filled].iter().filter(|o| o.failed).count();
        let slow = self.ring[..self.filled].iter().filter(|o| o.slow).count();
        let successes = self.filled - failures;
        (failures, slow, successes)
    }
}

/// Outcome of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitDecision {
    /// Call may proceed normally.
    Allowed,
    /// Call may proceed as a HALF_OPEN probe; the breaker is testing recovery.
    AllowedAsProbe,
    /// Breaker is OPEN and still within its wait duration; reject immediately.
    Rejected,
}

/// Process-wide map of named breakers. Routes sharing a `circuit_breaker`
/// name in config share the same breaker instance.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<Mutex<Breaker>>>>,
    default_policy: CircuitBreakerPolicy,
    telemetry: TelemetryEmitter,
}

impl CircuitBreakerRegistry {
    pub fn new(default_policy: CircuitBreakerPolicy, telemetry: TelemetryEmitter) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_policy,
            telemetry,
        }
    }

    async fn get_or_create(&self, name: &str, policy: Option<CircuitBreakerPolicy>) -> Arc<Mutex<Breaker>> {
        if let Some(existing) = self.breakers.read().await.get(name) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Breaker::new(
                    name.to_string(),
                    policy.unwrap_or(self.default_policy),
                )))
            })
            .clone()
    }

    /// Asks whether a call against `name` may proceed, transitioning
    /// OPEN -> HALF_OPEN once `wait_duration_secs` has elapsed.
    pub async fn permit(&self, name: &str, policy: Option<CircuitBreakerPolicy>) -> PermitDecision {
        let handle = self.get_or_create(name, policy).await;
        let mut breaker = handle.lock().await;

        match breaker.state {
            BreakerState::Closed => PermitDecision::Allowed,
            BreakerState::Open => {
                let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= Duration::from_secs(breaker.policy.wait_duration_secs) {
                    self.transition(&mut breaker, BreakerState::HalfOpen).await;
                    breaker.half_open_probes_issued = 1;
                    PermitDecision::AllowedAsProbe
                } else {
                    PermitDecision::Rejected
                }
            }
            BreakerState::HalfOpen => {
                if breaker.half_open_probes_issued < breaker.policy.half_open_probe_count {
                    breaker.half_open_probes_issued += 1;
                    PermitDecision::AllowedAsProbe
                } else {
                    PermitDecision::Rejected
                }
            }
        }
    }

    /// Records a completed call's outcome and evaluates state transitions.
    pub async fn record_outcome(&self, name: &str, failed: bool, duration: Duration) {
        let handle = self.get_or_create(name, None).await;
        let mut breaker = handle.lock().await;
        let slow = duration >= Duration::from_millis(breaker.policy.slow_call_duration_ms);
        breaker.record(failed, slow);

        match breaker.state {
            BreakerState::HalfOpen => {
                if failed {
                    self.transition(&mut breaker, BreakerState::Open).await;
                } else if breaker.half_open_probes_issued >= breaker.policy.half_open_probe_count {
                    self.transition(&mut breaker, BreakerState::Closed).await;
                }
            }
            BreakerState::Closed => {
                if breaker.filled >= breaker.policy.minimum_samples
                    && (breaker.failure_rate() >= breaker.policy.failure_rate_threshold
                        || breaker.slow_call_rate() >= breaker.policy.slow_call_rate_threshold)
                {
                    self.transition(&mut breaker, BreakerState::Open).await;
                }
            }
            BreakerState::Open => {}
        }
    }

    async fn transition(&self, breaker: &mut Breaker, to: BreakerState) {
        if breaker.state == to {
            return;
        }
        let from = breaker.state;
        breaker.state = to;
        if to == BreakerState::Open {
            breaker.opened_at = Some(Instant::now());
        }
        if to == BreakerState::Closed {
            breaker.ring.clear();
            breaker.filled = 0;
            breaker.next_slot = 0;
        }
        if to == BreakerState::HalfOpen {
            breaker.half_open_probes_issued = 0;
        }

        info!("circuit breaker '{}': {} -> {}", breaker.name, from.as_str(), to.as_str());
        let (failures, slow, successes) = breaker.counts();
        self.telemetry
            .emit(
                "events.circuitbreaker",
                CircuitBreakerEvent {
                    breaker: breaker.name.clone(),
                    from: from.as_str(),
                    to: to.as_str(),
                    failures,
                    slow_calls: slow,
                    successes,
                },
            )
            .await;
    }

    /// Current state of a named breaker, if it has seen any traffic yet.
    pub async fn state_of(&self, name: &str) -> Option<BreakerState> {
        let handle = self.breakers.read().await.get(name).cloned()?;
        let breaker = handle.lock().await;
        Some(breaker.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> CircuitBreakerPolicy {
        CircuitBreakerPolicy {
            window_size: 10,
            minimum_samples: 4,
            failure_rate_threshold: 0.5,
            slow_call_rate_threshold: 0.5,
            slow_call_duration_ms: 200,
            wait_duration_secs: 0,
            half_open_probe_count: 2,
        }
    }

    #[tokio::test]
    async fn opens_after_failure_rate_exceeds_threshold() {
        let registry = CircuitBreakerRegistry::new(test_policy(), TelemetryEmitter::start(None, 100));
        for _ in 0..3 {
            registry.record_outcome("svc", true, Duration::from_millis(1)).await;
        }
        registry.record_outcome("svc", false, Duration::from_millis(1)).await;

        assert_eq!(registry.permit("svc", None).await, PermitDecision::Rejected);
    }

    #[tokio::test]
    async fn half_open_after_wait_duration_then_closes_on_success() {
        let mut policy = test_policy();
        policy.wait_duration_secs = 0;
        let registry = CircuitBreakerRegistry::new(policy, TelemetryEmitter::start(None, 100));
        for _ in 0..4 {
            registry.record_outcome("svc", true, Duration::from_millis(1)).await;
        }
        assert_eq!(registry.permit("svc", None).await, PermitDecision::Rejected);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(registry.permit("svc", None).await, PermitDecision::AllowedAsProbe);
        registry.record_outcome("svc", false, Duration::from_millis(1)).await;
        assert_eq!(registry.permit("svc", None).await, PermitDecision::AllowedAsProbe);
        registry.record_outcome("svc", false, Duration::from_millis(1)).await;

        assert_eq!(registry.permit("svc", None).await, PermitDecision::Allowed);
    }

    #[tokio::test]
    async fn closed_allows_calls_below_minimum_samples() {
        let registry = CircuitBreakerRegistry::new(test_policy(), TelemetryEmitter::start(None, 100));
        registry.record_outcome("svc", true, Duration::from_millis(1)).await;
        registry.record_outcome("svc", true, Duration::from_millis(1)).await;
        assert_eq!(registry.permit("svc", None).await, PermitDecision::Allowed);
    }
}
