// ── Store error types ──
//
// Everything a `Store` operation can fail with. Transport failures are
// normalized here before any caller sees them, and every variant is
// `Clone` because one failed request is reported to every coalesced waiter.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::model::Entity;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    // ── Coordination errors ──────────────────────────────────────────
    #[error("{operation}: a type is required")]
    MissingType { operation: &'static str },

    #[error("Unable to find schema for \"{type_name}\"")]
    SchemaUnresolved {
        type_name: String,
        #[source]
        source: Option<Arc<StoreError>>,
    },

    #[error("Serialization aborted at depth {depth}: cycle or nesting too deep")]
    CycleOrDepthExceeded { depth: usize },

    // ── Transport errors ─────────────────────────────────────────────
    /// `timeout` is `None` when the transport gave up without a configured limit.
    #[error("API request timeout{}", timeout_suffix(.timeout.as_ref()))]
    Timeout {
        timeout: Option<Duration>,
        method: String,
        url: String,
    },

    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The server answered with an error body, typeified into `error`.
    #[error("Server error (HTTP {status}): {}", error_summary(.error))]
    Server { status: u16, error: Entity },

    // ── Record errors ────────────────────────────────────────────────
    #[error("Unknown link: {name}")]
    UnknownLink { name: String },

    #[error("Unknown action: {name}")]
    UnknownAction { name: String },

    #[error("Record has no self link")]
    MissingSelfLink,
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

fn timeout_suffix(timeout: Option<&Duration>) -> String {
    timeout.map_or_else(String::new, |t| format!(" ({} sec)", t.as_secs()))
}

fn error_summary(error: &Entity) -> String {
    match (error.get_str("code"), error.get_str("message")) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (None, Some(message)) => message,
        (Some(code), None) => code,
        (None, None) => "no details".into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeout_message_carries_seconds() {
        let err = StoreError::Timeout {
            timeout: Some(Duration::from_secs(30)),
            method: "GET".into(),
            url: "/v1/widgets".into(),
        };
        assert_eq!(err.to_string(), "API request timeout (30 sec)");
        assert!(err.is_timeout());
    }

    #[test]
    fn server_error_summarizes_entity() {
        let serde_json::Value::Object(map) =
            json!({"type": "error", "code": "NotFound", "message": "no widget"})
        else {
            unreachable!()
        };
        let err = StoreError::Server {
            status: 404,
            error: Entity::from_json(map),
        };
        assert_eq!(err.to_string(), "Server error (HTTP 404): NotFound: no widget");
        assert!(err.is_not_found());
    }

    #[test]
    fn schema_unresolved_exposes_source() {
        use std::error::Error as _;
        let err = StoreError::SchemaUnresolved {
            type_name: "widget".into(),
            source: Some(Arc::new(StoreError::Transport {
                status: None,
                message: "refused".into(),
            })),
        };
        assert!(err.source().is_some());
        assert_eq!(err.status(), None);
    }
}
