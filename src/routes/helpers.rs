use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use std::{collections::BTreeMap, str::FromStr};

pub(super) fn parse_object_id(value: &str) -> Result<ObjectId, Response> {
    ObjectId::from_str(value).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "invalid id" })),
        )
            .into_response()
    })
}

pub(super) fn ok_message(message: &str) -> Response {
    Json(json!({ "ok": true, "message": message })).into_response()
}

pub(super) fn validation_errors(errors: &BTreeMap<String, String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "ok": false, "errors": errors })),
    )
        .into_response()
}

pub(super) fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "ok": false, "error": message })),
    )
        .into_response()
}

pub(super) fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "ok": false, "error": message })),
    )
        .into_response()
}

pub(super) fn conflict(message: &str) -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({ "ok": false, "error": message })),
    )
        .into_response()
}

pub(super) fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "error": "internal error" })),
    )
        .into_response()
}
