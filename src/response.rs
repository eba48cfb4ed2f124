use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Uniform `{success, data, message}` wrapper for every API response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: String::new(),
        }
    }
}

impl Envelope<()> {
    pub fn fail(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            message: message.to_owned(),
        }
    }
}

pub enum ApiResponse<T> {
    Ok(T),
    Created(T),
    NoContent,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Ok(v) => (StatusCode::OK, Json(Envelope::ok(v))).into_response(),
            ApiResponse::Created(v) => {
                (StatusCode::CREATED, Json(Envelope::ok(v))).into_response()
            }
            ApiResponse::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}
