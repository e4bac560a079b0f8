use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope: `{ "status": 200, "message": "Success", "result": ... }`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub result: Option<T>,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(result: T) -> Self {
        Self {
            result: Some(result),
            status_code: StatusCode::OK,
        }
    }
}

impl ApiResponse<()> {
    /// Envelope without a `result` key.
    pub fn acknowledged() -> Self {
        Self {
            result: None,
            status_code: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let mut envelope = json!({
            "status": self.status_code.as_u16(),
            "message": "Success",
        });

        if let Some(result) = self.result {
            match serde_json::to_value(&result) {
                Ok(value) => envelope["result"] = value,
                Err(e) => {
                    tracing::error!("Failed to serialize response data: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({
                            "code": "InternalServerError",
                            "message": "Failed to serialize response data"
                        })),
                    )
                        .into_response();
                }
            }
        }

        (self.status_code, Json(envelope)).into_response()
    }
}

pub type ApiResult<T = Value> = Result<ApiResponse<T>, crate::error::WarpError>;
