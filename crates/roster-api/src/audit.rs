//! Security audit logging
//!
//! Authentication and authorization events are emitted at INFO level on the
//! `audit` tracing target, so they can be filtered and routed separately
//! from application logs (`RUST_LOG=audit=info`). Each record carries the
//! serialized event plus the request id when one is in scope.
//!
//! Author: hephaex@gmail.com

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::middleware::request_id::RequestId;

/// Security audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: i64,
        email: String,
        ip_address: Option<String>,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
    },

    LoginSuccess {
        user_id: i64,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    TokenRefresh {
        ip_address: Option<String>,
        success: bool,
    },

    /// Missing, malformed, expired or forged bearer token
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Authenticated caller lacks the role or ownership required
    AccessDenied {
        user_id: i64,
        email: String,
        resource: String,
        required_role: Option<String>,
        ip_address: Option<String>,
    },

    UserUpdated {
        user_id: i64,
        actor_id: i64,
        role_changed: bool,
    },

    UserDeleted {
        user_id: i64,
        actor_id: i64,
    },
}

impl AuditEvent {
    /// Stable name used as the `event_type` field
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "registration_success",
            AuditEvent::RegistrationFailure { .. } => "registration_failure",
            AuditEvent::LoginSuccess { .. } => "login_success",
            AuditEvent::LoginFailure { .. } => "login_failure",
            AuditEvent::TokenRefresh { .. } => "token_refresh",
            AuditEvent::InvalidToken { .. } => "invalid_token",
            AuditEvent::AccessDenied { .. } => "access_denied",
            AuditEvent::UserUpdated { .. } => "user_updated",
            AuditEvent::UserDeleted { .. } => "user_deleted",
        }
    }
}

/// Emit an audit record on the `audit` target
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let request_id = RequestId::current().map(RequestId::into_inner);

    info!(
        target: "audit",
        event_type = event.event_type(),
        request_id = ?request_id,
        event = %event_json,
        "Audit event"
    );
}

/// Client IP from proxy headers, first hop wins
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_event_serialization_tagged() {
        let event = AuditEvent::LoginFailure {
            email: "a@example.com".to_string(),
            reason: "invalid email or password".to_string(),
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "login_failure");
        assert_eq!(json["email"], "a@example.com");
        assert_eq!(json["event_type"], event.event_type());
    }

    #[test]
    fn test_event_type_matches_serde_tag() {
        let events = vec![
            AuditEvent::UserDeleted {
                user_id: 1,
                actor_id: 2,
            },
            AuditEvent::TokenRefresh {
                ip_address: None,
                success: false,
            },
            AuditEvent::AccessDenied {
                user_id: 1,
                email: "a@example.com".to_string(),
                resource: "POST /api/v1/users".to_string(),
                required_role: Some("admin".to_string()),
                ip_address: None,
            },
        ];

        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event_type"], event.event_type());
            audit_log(&event);
        }
    }

    #[test]
    fn test_extract_ip_address() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_ip_address(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.9"));
        assert_eq!(extract_ip_address(&headers).as_deref(), Some("192.168.1.9"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        assert_eq!(extract_ip_address(&headers).as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn test_extract_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        assert_eq!(extract_user_agent(&headers).as_deref(), Some("curl/8.0"));
    }
}
