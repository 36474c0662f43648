//! Replica health state machine.
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= failure_threshold
//! Unhealthy → Healthy: consecutive successes >= recovery_threshold
//! ```
//!
//! A success resets the failure streak and vice versa.

use std::time::Instant;

/// Outcome of recording an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    BecameHealthy,
    BecameUnhealthy,
}

/// Mutable health of one replica. Owned by the cluster, behind its lock.
#[derive(Debug, Clone)]
pub struct ReplicaHealth {
    healthy: bool,
    last_check: Option<Instant>,
    /// Consecutive failures since the last success.
    failure_count: u32,
    /// Consecutive successes since the last failure.
    success_count: u32,
}

impl Default for ReplicaHealth {
    /// Replicas start healthy: they answered a ping when the pool was opened.
    fn default() -> Self {
        Self {
            healthy: true,
            last_check: None,
            failure_count: 0,
            success_count: 0,
        }
    }
}

impl ReplicaHealth {
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_check(&self) -> Option<Instant> {
        self.last_check
    }

    /// Record a failed probe.
    pub fn record_failure(&mut self, threshold: u32) -> Transition {
        self.last_check = Some(Instant::now());
        self.success_count = 0;
        self.failure_count = self.failure_count.saturating_add(1);

        if self.healthy && self.failure_count >= threshold.max(1) {
            self.healthy = false;
            Transition::BecameUnhealthy
        } else {
            Transition::Unchanged
        }
    }

    /// Record a successful probe.
    pub fn record_success(&mut self, threshold: u32) -> Transition {
        self.last_check = Some(Instant::now());
        self.failure_count = 0;

        if self.healthy {
            self.success_count = 0;
            return Transition::Unchanged;
        }

        self.success_count = self.success_count.saturating_add(1);
        if self.success_count >= threshold.max(1) {
            self.healthy = true;
            self.success_count = 0;
            Transition::BecameHealthy
        } else {
            Transition::Unchanged
        }
    }

    /// Mark unhealthy immediately, bumping the failure counter.
    pub fn mark_unhealthy(&mut self) -> Transition {
        self.failure_count = self.failure_count.saturating_add(1);
        self.success_count = 0;
        if self.healthy {
            self.healthy = false;
            Transition::BecameUnhealthy
        } else {
            Transition::Unchanged
        }
    }

    /// Mark healthy immediately, resetting the failure counter.
    pub fn mark_healthy(&mut self) -> Transition {
        self.failure_count = 0;
        self.success_count = 0;
        if self.healthy {
            Transition::Unchanged
        } else {
            self.healthy = true;
            Transition::BecameHealthy
        }
    }
}
