//! Extractors whose rejections use the `{"error": ...}` body of `ApiError`.

use axum::extract::{FromRequest, FromRequestParts, Query};
use axum::Json;

use crate::core::errors::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);
