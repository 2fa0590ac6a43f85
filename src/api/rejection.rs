use std::convert::Infallible;

use log::{debug, error};
use serde_json::json;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge,
        UnsupportedMediaType,
    },
    reply::Response,
    Rejection,
};

use super::filters::json;
use crate::error::ApiError;

/// Turns every rejection into a JSON error response.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(error) = err.find::<ApiError>() {
        if error.status().is_server_error() {
            error!("{error}");
        } else {
            debug!("Rejected request: {error}");
        }
        return Ok(json(&error.body(), error.status()));
    }

    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Not found."))
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("{e}"))
    } else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("{e}"))
    } else if let Some(e) = err.find::<InvalidHeader>() {
        (StatusCode::BAD_REQUEST, format!("{e}"))
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, String::from("Request body is too large."))
    } else if err.find::<LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, String::from("Content-Length is required."))
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            String::from("Unsupported media type."),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, String::from("Method not allowed."))
    } else {
        error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    debug!("Rejected request with {status}: {detail}");
    Ok(json(&json!({ "detail": detail }), status))
}
