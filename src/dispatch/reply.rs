//! JSON status replies.
//!
//! Terminal responses the engine asks the host to send, e.g. the 403 for
//! a method mismatch. The body is always `{"status": ..., "message": ...}`;
//! the HTTP status rides alongside and is not serialized into the body.

use serde::Serialize;

/// A status label plus human-readable message, sent as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReply {
    status: String,
    message: String,
    #[serde(skip)]
    http_status: u16,
}

impl StatusReply {
    /// A `success` reply, HTTP 200 unless overridden.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_owned(),
            message: message.into(),
            http_status: 200,
        }
    }

    /// An `error` reply, HTTP 405 unless overridden.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_owned(),
            message: message.into(),
            http_status: 405,
        }
    }

    /// A custom status label. Labels other than `success` take the error
    /// default of HTTP 405.
    pub fn with_label(label: impl Into<String>, message: impl Into<String>) -> Self {
        let status = label.into();
        let http_status = if status == "success" { 200 } else { 405 };
        Self {
            status,
            message: message.into(),
            http_status,
        }
    }

    /// Override the HTTP status the host should send with this body.
    pub fn with_status(mut self, http_status: u16) -> Self {
        self.http_status = http_status;
        self
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_serializes_without_http_status() {
        let reply = StatusReply::error("Invalid request method").with_status(403);
        assert_eq!(reply.http_status(), 403);
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"status":"error","message":"Invalid request method"}"#
        );
    }

    #[test]
    fn default_statuses_follow_the_label() {
        assert_eq!(StatusReply::success("ok").http_status(), 200);
        assert_eq!(StatusReply::error("nope").http_status(), 405);
        assert_eq!(StatusReply::with_label("success", "ok").http_status(), 200);
        assert_eq!(StatusReply::with_label("partial", "hm").http_status(), 405);
    }
}
