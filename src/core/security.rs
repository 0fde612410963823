use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Shared secret for protected endpoints. When no key is configured every
/// request is let through.
#[derive(Debug, Clone, Default)]
pub struct ApiKey {
    value: Option<String>,
}

impl ApiKey {
    pub fn new(value: Option<String>) -> Self {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self { value }
    }

    pub fn is_configured(&self) -> bool {
        self.value.is_some()
    }
}

pub fn require_api_key(headers: &HeaderMap, expected: &ApiKey) -> Result<(), ApiError> {
    let Some(expected_value) = expected.value.as_deref() else {
        return Ok(());
    };

    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    let matches: bool = header_value
        .as_bytes()
        .ct_eq(expected_value.as_bytes())
        .into();
    if !matches {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
