//! Wire protocol: JSON messages with a `type` discriminator.
//!
//! Inbound: `login`, `logout`, `query`. Outbound: `login_response`,
//! `logout_response`, `query_response` (streamed; the final one carries
//! `done=true`), `stats`, and `error` for messages that don't parse at
//! all.

use serde::{Deserialize, Serialize};

/// Messages the client sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Login {
        username: String,
        password: String,
    },
    Logout {
        #[serde(default)]
        session_id: Option<String>,
    },
    Query {
        #[serde(default)]
        query: String,
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        user_id: String,
    },
}

/// Messages the server sends.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    LoginResponse {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    LogoutResponse {
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    QueryResponse {
        content: String,
        done: bool,
    },
    Stats {
        chunk_count: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        ttfb: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        generation: Option<f64>,
    },
    Error {
        error: String,
    },
}

impl ServerMessage {
    /// Successful login response.
    pub fn login_ok(session_id: String, user_id: String) -> Self {
        ServerMessage::LoginResponse {
            session_id: Some(session_id),
            user_id: Some(user_id),
            message: Some("Login successful".to_string()),
            error: None,
        }
    }

    /// Uniform login rejection; never reveals which check failed.
    pub fn login_failed() -> Self {
        ServerMessage::LoginResponse {
            session_id: None,
            user_id: None,
            message: None,
            error: Some("Invalid username or password".to_string()),
        }
    }

    /// One streamed answer fragment.
    pub fn fragment(content: impl Into<String>, done: bool) -> Self {
        ServerMessage::QueryResponse {
            content: content.into(),
            done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_message_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"login","username":"ada","password":"pw"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Login { username, .. } if username == "ada"));
    }

    #[test]
    fn query_defaults_apply() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"query"}"#).unwrap();
        match msg {
            ClientMessage::Query {
                query,
                session_id,
                user_id,
            } => {
                assert!(query.is_empty());
                assert!(session_id.is_empty());
                assert!(user_id.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn fragment_serializes_with_done_flag() {
        let json = serde_json::to_string(&ServerMessage::fragment("hi", false)).unwrap();
        assert!(json.contains(r#""type":"query_response""#));
        assert!(json.contains(r#""done":false"#));

        let done = serde_json::to_string(&ServerMessage::fragment("", true)).unwrap();
        assert!(done.contains(r#""done":true"#));
    }

    #[test]
    fn login_failure_hides_cause() {
        let json = serde_json::to_string(&ServerMessage::login_failed()).unwrap();
        assert!(json.contains("Invalid username or password"));
        assert!(!json.contains("session_id"));
    }
}
