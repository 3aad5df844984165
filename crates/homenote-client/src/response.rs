//! Response decoding
//!
//! Successful bodies are decoded only when the server says they are JSON.
//! Error bodies are recognised in this order:
//! 1. `{code, message}` standard shape
//! 2. `{errors: [...]}` validation array, joined with ", "
//! 3. the status reason phrase

use crate::error::{ApiError, ClientError};
use crate::transport::HttpResponse;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard `{code, message, data}` response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Decode a 2xx response body into `T`
///
/// Non-JSON and empty bodies decode `T` from an empty object.
pub fn decode_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ClientError> {
    let body_is_blank = response.body.iter().all(u8::is_ascii_whitespace);

    if !response.is_json() || body_is_blank {
        return serde_json::from_value(Value::Object(Map::new())).map_err(|e| {
            ClientError::Decode(format!(
                "expected JSON body from HTTP {}: {e}",
                response.status
            ))
        });
    }

    serde_json::from_slice(&response.body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Build an [`ApiError`] from a non-2xx response
#[must_use]
pub fn api_error_from_response(response: &HttpResponse) -> ApiError {
    let fallback = || {
        let message = if response.status_text.is_empty() {
            format!("HTTP {}", response.status)
        } else {
            response.status_text.clone()
        };
        ApiError::new(response.status, message)
    };

    let Ok(Value::Object(body)) = serde_json::from_slice::<Value>(&response.body) else {
        return fallback();
    };

    if let Some(message) = body.get("message").and_then(Value::as_str) {
        let mut error = ApiError::new(response.status, message);
        if let Some(code) = body.get("code").and_then(Value::as_str) {
            error = error.with_code(code);
        }
        if let Some(data) = body.get("data").filter(|d| !d.is_null()) {
            error = error.with_data(data.clone());
        }
        return error;
    }

    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        let messages: Vec<String> = errors.iter().filter_map(validation_message).collect();
        if !messages.is_empty() {
            let mut error = ApiError::new(response.status, messages.join(", "))
                .with_data(Value::Array(errors.clone()));
            if let Some(code) = body.get("code").and_then(Value::as_str) {
                error = error.with_code(code);
            }
            return error;
        }
    }

    fallback()
}

/// Backend error code from a response body, if present
#[must_use]
pub fn error_code(response: &HttpResponse) -> Option<String> {
    let body: Value = serde_json::from_slice(&response.body).ok()?;
    body.get("code").and_then(Value::as_str).map(str::to_string)
}

fn validation_message(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => ["message", "reason", "defaultMessage"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_response(status: u16, body: Value) -> HttpResponse {
        HttpResponse::new(status, serde_json::to_vec(&body).unwrap())
            .with_header("content-type", "application/json")
    }

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Loose {
        #[serde(default)]
        name: Option<String>,
    }

    #[test]
    fn decodes_json_body() {
        let resp = json_response(200, json!({"name": "flat"}));
        let decoded: Loose = decode_body(&resp).unwrap();
        assert_eq!(decoded.name.as_deref(), Some("flat"));
    }

    #[test]
    fn non_json_body_decodes_as_empty_object() {
        let resp = HttpResponse::new(200, b"OK".to_vec()).with_header("content-type", "text/plain");
        let decoded: Loose = decode_body(&resp).unwrap();
        assert_eq!(decoded, Loose::default());

        let decoded: Value = decode_body(&HttpResponse::new(204, Vec::new())).unwrap();
        assert_eq!(decoded, json!({}));
    }

    #[test]
    fn envelope_tolerates_missing_data() {
        let resp = json_response(200, json!({"code": "OK", "message": "done"}));
        let env: ApiEnvelope<u64> = decode_body(&resp).unwrap();
        assert_eq!(env.data, None);
        assert_eq!(env.message.as_deref(), Some("done"));
    }

    #[test]
    fn standard_error_shape() {
        let resp = json_response(
            404,
            json!({"code": "POST_NOT_FOUND", "message": "Listing not found", "data": {"id": 3}}),
        );
        let err = api_error_from_response(&resp);
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "Listing not found");
        assert_eq!(err.code.as_deref(), Some("POST_NOT_FOUND"));
        assert_eq!(err.data, Some(json!({"id": 3})));
    }

    #[test]
    fn validation_error_array_is_joined() {
        let resp = json_response(
            400,
            json!({"errors": [
                {"field": "title", "reason": "must not be blank"},
                {"field": "price", "message": "must be positive"},
                "address is required"
            ]}),
        );
        let err = api_error_from_response(&resp);
        assert_eq!(
            err.message,
            "must not be blank, must be positive, address is required"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn falls_back_to_status_text() {
        let resp = HttpResponse::new(502, b"<html>bad gateway</html>".to_vec());
        let err = api_error_from_response(&resp);
        assert_eq!(err.message, "Bad Gateway");
        assert_eq!(err.code, None);

        let resp = HttpResponse::new(599, Vec::new());
        assert_eq!(api_error_from_response(&resp).message, "HTTP 599");
    }

    #[test]
    fn error_code_extraction() {
        let resp = json_response(401, json!({"code": "TOKEN_REUSE_DETECTED"}));
        assert_eq!(error_code(&resp).as_deref(), Some("TOKEN_REUSE_DETECTED"));
        assert_eq!(error_code(&HttpResponse::new(401, Vec::new())), None);
    }
}
