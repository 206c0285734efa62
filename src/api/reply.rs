//! Handler result shape
//!
//! JSON endpoints return an [`ApiReply`]; the variant decides how the
//! response is rendered. Errors travel separately as [`AppError`](crate::error::AppError).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

#[derive(Debug)]
pub enum ApiReply {
    /// 200 with an empty body
    NoBody,
    /// 200 with a JSON body
    Json(Value),
    /// Handler built the full response itself (redirects, cookies)
    PreHandled(Response),
}

impl ApiReply {
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, crate::error::AppError> {
        let value = serde_json::to_value(value).map_err(|e| crate::error::AppError::Internal(e.into()))?;
        Ok(ApiReply::Json(value))
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        match self {
            ApiReply::NoBody => StatusCode::OK.into_response(),
            ApiReply::Json(value) => (StatusCode::OK, Json(value)).into_response(),
            ApiReply::PreHandled(response) => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{CONTENT_TYPE, LOCATION};
    use axum::response::Redirect;

    #[test]
    fn no_body_is_empty_ok() {
        let response = ApiReply::NoBody.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn json_sets_content_type() {
        let response = ApiReply::Json(Value::Bool(true)).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn pre_handled_passes_through() {
        let response =
            ApiReply::PreHandled(Redirect::temporary("http://localhost:3000/").into_response())
                .into_response();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[LOCATION], "http://localhost:3000/");
    }
}
