use super::settings::MAX_TOP_K;
use crate::core::errors::ApiError;
use serde_json::{Map, Value};

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_optional_string_field(server, "server.api_key", "api_key")?;
        validate_bool_field(server, "server.require_key_for_rag", "require_key_for_rag")?;
        validate_bool_field(server, "server.trust_proxy_headers", "trust_proxy_headers")?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.chat_model", "chat_model")?;
        validate_optional_string_field(llm, "llm.embed_model", "embed_model")?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(vector) = expect_optional_object(root, "vector")? {
        validate_optional_string_field(vector, "vector.api_key", "api_key")?;
        validate_optional_string_field(vector, "vector.index", "index")?;
        validate_optional_string_field(vector, "vector.host", "host")?;
        validate_optional_string_field(vector, "vector.namespace", "namespace")?;
        validate_optional_string_field(vector, "vector.control_plane_url", "control_plane_url")?;
        validate_u64_field(vector, "vector.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.top_k", "top_k", 1, MAX_TOP_K as u64)?;
        validate_u64_field(rag, "rag.fetch_k", "fetch_k", 1, 1_000)?;
        validate_u64_field(
            rag,
            "rag.max_snippet_chars",
            "max_snippet_chars",
            1,
            100_000,
        )?;
        validate_u64_field(
            rag,
            "rag.max_document_chars",
            "max_document_chars",
            1,
            1_000_000,
        )?;
        validate_f64_field(rag, "rag.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(rag, "rag.max_tokens", "max_tokens", 1, 128_000)?;
        validate_optional_string_field(rag, "rag.system_prompt", "system_prompt")?;
    }

    if let Some(rate_limit) = expect_optional_object(root, "rate_limit")? {
        validate_u64_field(
            rate_limit,
            "rate_limit.requests_per_minute",
            "requests_per_minute",
            0,
            100_000,
        )?;
        validate_u64_field(rate_limit, "rate_limit.burst", "burst", 1, 100_000)?;
    }

    if let Some(history) = expect_optional_object(root, "history")? {
        validate_bool_field(history, "history.enabled", "enabled")?;
        validate_u64_field(history, "history.default_limit", "default_limit", 1, 1_000)?;
    }

    if let Some(uploads) = expect_optional_object(root, "uploads")? {
        validate_u64_field(uploads, "uploads.max_bytes", "max_bytes", 1, 100_000_000)?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if !(min..=max).contains(&number) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
