//! Uniform response envelope
//!
//! Every response body, success or failure, has the shape
//! `{code, message, data?, error?, timestamp, request_id?}` with exactly
//! one of `data` / `error` present.
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::messages::MessageKey;
use crate::middleware::request_id::RequestId;

/// Wire form of every response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// HTTP status code, repeated for clients that only see the body
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: Some(data),
            error: None,
            timestamp: Utc::now().timestamp(),
            request_id: RequestId::current().map(RequestId::into_inner),
        }
    }
}

impl Envelope<()> {
    pub fn failure(
        status: StatusCode,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: None,
            error: Some(error.into()),
            timestamp: Utc::now().timestamp(),
            request_id: RequestId::current().map(RequestId::into_inner),
        }
    }
}

/// Successful handler result rendered inside an [`Envelope`]
///
/// The message is a catalogue key, localized when the response is rendered.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: MessageKey,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with the default message
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, MessageKey::Retrieved, data)
    }

    /// 201 Created
    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, MessageKey::Created, data)
    }

    pub fn with_status(status: StatusCode, message: MessageKey, data: T) -> Self {
        Self {
            status,
            message,
            data,
        }
    }

    pub fn message(mut self, message: MessageKey) -> Self {
        self.message = message;
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let envelope = Envelope::success(self.status, self.message.localized(), self.data);
        (self.status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::with_language;
    use roster_core::Language;
    use serde_json::json;

    #[test]
    fn test_success_envelope_shape() {
        let envelope = Envelope::success(StatusCode::OK, "success", json!({"id": 1}));
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["code"], 200);
        assert_eq!(value["data"]["id"], 1);
        assert!(value.get("error").is_none());
        assert!(value.get("request_id").is_none());
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_failure_envelope_shape() {
        let envelope = Envelope::failure(StatusCode::NOT_FOUND, "user not found", "user not found");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["code"], 404);
        assert_eq!(value["error"], "user not found");
        assert!(value.get("data").is_none());
    }

    #[tokio::test]
    async fn test_envelope_picks_up_scoped_request_id() {
        let envelope = RequestId::scope(RequestId::new("req-1"), async {
            Envelope::success(StatusCode::OK, "success", 1)
        })
        .await;
        assert_eq!(envelope.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_api_response_status() {
        let response = ApiResponse::created(json!({"id": 3})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_api_response_message_is_localized() {
        let response = with_language(Language::Zh, async {
            ApiResponse::ok(json!({"id": 3}))
                .message(MessageKey::Updated)
                .into_response()
        })
        .await;

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["message"], "更新成功");
        assert_eq!(value["data"]["id"], 3);
    }
}
