use crate::utils::error::{Result, StoreError};
use serde::Serialize;
use serde_json::{json, Value};

/// fetch 風格的回應，所有後端共用同一形狀
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    body: Value,
}

impl Response {
    pub fn success<T: Serialize>(body: &T, status: u16) -> Result<Self> {
        Ok(Self {
            ok: true,
            status,
            status_text: status_text(status).to_string(),
            body: serde_json::to_value(body)?,
        })
    }

    pub fn no_content() -> Self {
        Self {
            ok: true,
            status: 204,
            status_text: status_text(204).to_string(),
            body: Value::Null,
        }
    }

    pub fn error(status: u16, error: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            status_text: status_text(status).to_string(),
            body: json!({ "error": error, "message": message.into() }),
        }
    }

    pub fn from_error(err: &StoreError) -> Self {
        let status = err.status_code();
        let error = match status {
            404 => "not found",
            400 => "bad request",
            _ => "backend error",
        };
        Self::error(status, error, err.to_string())
    }

    pub async fn json(&self) -> Result<Value> {
        Ok(self.body.clone())
    }

    pub async fn text(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.body)?)
    }
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_envelope() {
        let response = Response::from_error(&StoreError::not_found("students", "missing"));

        assert!(!response.ok);
        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");

        let body = response.json().await.unwrap();
        assert_eq!(body["error"], "not found");
        assert!(body["message"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_no_content_text_is_null() {
        let response = Response::no_content();
        assert!(response.ok);
        assert_eq!(response.text().await.unwrap(), "null");
    }

    #[tokio::test]
    async fn test_success_round_trips_body() {
        let response = Response::success(&json!({"id": "s1"}), 201).unwrap();
        assert_eq!(response.status_text, "Created");
        assert_eq!(response.text().await.unwrap(), r#"{"id":"s1"}"#);
    }
}
