use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;

/// Client for OpenAI-compatible `/chat/completions` and `/embeddings`.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embed_model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(settings: &LlmSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            chat_model: settings.chat_model.clone(),
            embed_model: settings.embed_model.clone(),
            client,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.post(url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError> {
        let body = chat_body(&self.chat_model, &request);

        let res = self
            .post("chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "chat completion failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        parse_chat_content(&payload)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.embed_model,
            "input": inputs,
        });

        let res = self
            .post("embeddings")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "embedding failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        parse_embeddings(&payload, inputs.len())
    }
}

fn chat_body(model: &str, request: &ChatRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": request.messages,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            obj.insert("max_tokens".to_string(), json!(t));
        }
    }

    body
}

fn parse_chat_content(payload: &Value) -> Result<String, ApiError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ApiError::Upstream("chat completion returned no content".to_string()))
}

fn parse_embeddings(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, ApiError> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| ApiError::Upstream("embedding response has no data".to_string()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = data
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
            let values = item["embedding"].as_array()?;
            let vector = values
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            Some((index, vector))
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);

    if indexed.len() != expected {
        return Err(ApiError::Upstream(format!(
            "expected {} embeddings, got {}",
            expected,
            indexed.len()
        )));
    }

    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;

    #[test]
    fn chat_body_includes_optional_parameters() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")])
            .with_temperature(0.2)
            .with_max_tokens(64);

        let body = chat_body("gpt-4o-mini", &request);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["max_tokens"], 64);

        let bare = chat_body("m", &ChatRequest::new(vec![]));
        assert!(bare.get("temperature").is_none());
    }

    #[test]
    fn chat_content_is_extracted_or_rejected() {
        let ok = json!({"choices": [{"message": {"content": "  Answer.  "}}]});
        assert_eq!(parse_chat_content(&ok).unwrap(), "Answer.");

        let empty = json!({"choices": []});
        assert!(matches!(
            parse_chat_content(&empty),
            Err(ApiError::Upstream(_))
        ));
    }

    #[test]
    fn embeddings_are_returned_in_index_order() {
        let payload = json!({"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]});

        let vectors = parse_embeddings(&payload, 2).unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn embedding_count_mismatch_is_an_upstream_error() {
        let payload = json!({"data": [{"index": 0, "embedding": [1.0]}]});
        assert!(matches!(
            parse_embeddings(&payload, 2),
            Err(ApiError::Upstream(_))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn live_openai_round_trip() {
        let settings = crate::core::config::Settings::resolve(&json!({}), |key| {
            std::env::var(key).ok()
        });
        let provider = OpenAiProvider::new(&settings.llm).expect("client");

        let vectors = provider
            .embed(&["What is a fiduciary duty?".to_string()])
            .await
            .expect("embed");
        println!("embedding dims: {}", vectors[0].len());

        let reply = provider
            .chat(ChatRequest::new(vec![ChatMessage::user("Say hello")]).with_max_tokens(10))
            .await
            .expect("chat");
        println!("chat reply: {}", reply);
    }
}
