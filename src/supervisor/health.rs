// src/supervisor/health.rs
// Per-server liveness bookkeeping (§3 "healthy server has now − lastHeartbeat ≤ 60s").
//
// Grounded on backend/src/mcp/health.rs's ServerHealth/HealthMonitor,
// trimmed to the single staleness threshold §3 actually specifies.

use chrono::{DateTime, Utc};

pub const HEARTBEAT_STALE_AFTER_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct ServerHealth {
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_failures: u64,
}

impl Default for ServerHealth {
    fn default() -> Self {
        Self {
            last_heartbeat: None,
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
        }
    }
}

impl ServerHealth {
    pub fn record_heartbeat(&mut self) {
        self.last_heartbeat = Some(Utc::now());
        self.consecutive_failures = 0;
    }

    pub fn record_success(&mut self) {
        self.total_requests += 1;
        self.record_heartbeat();
    }

    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
    }

    pub fn is_stale(&self) -> bool {
        match self.last_heartbeat {
            None => true,
            Some(last) => (Utc::now() - last).num_seconds() > HEARTBEAT_STALE_AFTER_SECS,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            (self.total_requests - self.total_failures) as f64 / self.total_requests as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_health_has_no_heartbeat_and_is_stale() {
        let health = ServerHealth::default();
        assert!(health.is_stale());
        assert_eq!(health.success_rate(), 1.0);
    }

    #[test]
    fn record_success_clears_failure_streak() {
        let mut health = ServerHealth::default();
        health.record_failure();
        health.record_failure();
        assert_eq!(health.consecutive_failures, 2);
        health.record_success();
        assert_eq!(health.consecutive_failures, 0);
        assert!(!health.is_stale());
    }

    #[test]
    fn success_rate_accounts_for_failures() {
        let mut health = ServerHealth::default();
        health.record_success();
        health.record_success();
        health.record_failure();
        assert!((health.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }
}
