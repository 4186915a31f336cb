use axum::http::StatusCode;
use serde::Serialize;

/// Envelope carried by every JSON response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            success: status.is_success(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            success: false,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_shape() {
        let body = ApiResponse::new(StatusCode::CREATED, "created", json!({ "id": 1 }));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({ "statusCode": 201, "message": "created", "success": true, "data": { "id": 1 } })
        );
    }

    #[test]
    fn failure_envelope_has_null_data() {
        let value =
            serde_json::to_value(ApiResponse::failure(StatusCode::CONFLICT, "taken")).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["statusCode"], json!(409));
        assert!(value["data"].is_null());
    }
}
