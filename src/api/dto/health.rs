//! Health check DTOs for API responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Health check response structure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "healthy",
    "version": "0.1.0",
    "timestamp": "2025-01-01T12:00:00Z",
    "checks": {
        "database": {
            "status": "healthy",
            "message": "Connected",
            "response_time_ms": 5
        },
        "scheduler": {
            "status": "healthy",
            "message": "5 jobs registered"
        }
    }
}))]
pub struct HealthResponse {
    /// Worst status across all checks
    #[schema(example = "healthy")]
    pub status: HealthStatus,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Time of the check (RFC 3339)
    #[schema(value_type = String, format = DateTime, example = "2025-01-01T12:00:00Z")]
    pub timestamp: String,
    pub checks: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Builds a response whose overall status is the worst component status.
    pub fn from_checks(version: &str, checks: BTreeMap<String, ComponentHealth>) -> Self {
        let status = checks
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            status,
            version: version.to_string(),
            timestamp: jiff::Timestamp::now().to_string(),
            checks,
        }
    }
}

/// Health status, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Serving, but something non-critical is off
    Degraded,
    Unhealthy,
}

/// Individual component health information.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    #[schema(example = "healthy")]
    pub status: HealthStatus,
    #[schema(example = "Connected")]
    pub message: Option<String>,
    /// Response time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 5)]
    pub response_time_ms: Option<u64>,
}

impl ComponentHealth {
    pub fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            response_time_ms: None,
        }
    }

    pub fn timed(mut self, elapsed: std::time::Duration) -> Self {
        self.response_time_ms = Some(elapsed.as_millis() as u64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() {
        let json = serde_json::to_string(&HealthStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }

    #[test]
    fn test_overall_status_is_the_worst_check() {
        let mut checks = BTreeMap::new();
        checks.insert(
            "database".to_string(),
            ComponentHealth::new(HealthStatus::Healthy, "Connected")
                .timed(std::time::Duration::from_millis(4)),
        );
        checks.insert(
            "scheduler".to_string(),
            ComponentHealth::new(HealthStatus::Degraded, "Scheduler not started"),
        );

        let response = HealthResponse::from_checks("0.1.0", checks);

        assert_eq!(response.status, HealthStatus::Degraded);
        assert_eq!(response.checks["database"].response_time_ms, Some(4));
        assert!(response.timestamp.parse::<jiff::Timestamp>().is_ok());
    }

    #[test]
    fn test_no_checks_is_healthy() {
        let response = HealthResponse::from_checks("0.1.0", BTreeMap::new());
        assert_eq!(response.status, HealthStatus::Healthy);
    }
}
