//! OCSF (Open Cybersecurity Schema Framework) authentication events.
//!
//! Emitted as structured JSON on the `ocsf` tracing target. Never panics
//! and never fails the request that triggered it.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

pub const CLASS_AUTHENTICATION: u32 = 3001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Logon,
    Logoff,
    /// Authorization code exchange.
    AuthTicket,
    /// Session refresh.
    ServiceTicket,
}

impl Activity {
    fn id(self) -> u32 {
        match self {
            Activity::Logon => 1,
            Activity::Logoff => 2,
            Activity::AuthTicket => 3,
            Activity::ServiceTicket => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Activity::Logon => "Logon",
            Activity::Logoff => "Logoff",
            Activity::AuthTicket => "Authentication Ticket",
            Activity::ServiceTicket => "Service Ticket",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    OAuth2,
    EmailOtp,
    Unknown,
}

impl Protocol {
    fn id(self) -> u32 {
        match self {
            Protocol::OAuth2 => 10,
            Protocol::EmailOtp => 99,
            Protocol::Unknown => 0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Protocol::OAuth2 => "OAuth 2.0/OIDC",
            Protocol::EmailOtp => "Email OTP",
            Protocol::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Failure with OCSF severity 2..=4.
    Failure(u32),
}

pub const SEVERITY_LOW: u32 = 2;
pub const SEVERITY_MEDIUM: u32 = 3;
pub const SEVERITY_HIGH: u32 = 4;

fn severity_name(id: u32) -> &'static str {
    match id {
        1 => "Informational",
        SEVERITY_LOW => "Low",
        SEVERITY_MEDIUM => "Medium",
        SEVERITY_HIGH => "High",
        _ => "Unknown",
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Build an OCSF Authentication (3001) event.
pub fn authentication_event_json(
    activity: Activity,
    outcome: Outcome,
    user_email: Option<&str>,
    protocol: Protocol,
    message: &str,
) -> serde_json::Value {
    let (status_id, status, severity_id) = match outcome {
        Outcome::Success => (1, "Success", 1),
        Outcome::Failure(severity) => (2, "Failure", severity),
    };

    let mut event = json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": activity.id(),
        "activity_name": activity.name(),
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status,
        "time": now_millis(),
        "metadata": {
            "product": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        },
        "auth_protocol_id": protocol.id(),
        "auth_protocol": protocol.name(),
        "message": message,
    });

    if let Some(email) = user_email {
        event["actor"] = json!({
            "user": {
                "email_addr": email,
                "type_id": 1,
                "type": "User"
            }
        });
    }

    event
}

/// Emit an OCSF Authentication (3001) event.
pub fn authentication_event(
    activity: Activity,
    outcome: Outcome,
    user_email: Option<&str>,
    protocol: Protocol,
    message: &str,
) {
    let event = authentication_event_json(activity, outcome, user_email, protocol, message);
    if let Ok(json) = serde_json::to_string(&event) {
        tracing::info!(target: "ocsf", "{}", json);
    }
}
