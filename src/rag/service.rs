use std::sync::Arc;

use serde::Serialize;

use super::prompt::{build_messages, AttachedDocument, PromptInput};
use super::render::answer_html;
use crate::core::config::{RagSettings, MAX_TOP_K};
use crate::core::errors::ApiError;
use crate::documents::truncate_chars;
use crate::llm::{ChatRequest, LlmProvider};
use crate::ranking::{dedup_and_rank, extract_snippet, titles_only, RankedSource};
use crate::vector::VectorIndex;

#[derive(Debug, Clone)]
pub struct RagQuery {
    pub question: String,
    pub top_k: Option<usize>,
    pub document: Option<AttachedDocument>,
}

impl RagQuery {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
            document: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub html: String,
    pub sources: Vec<RankedSource>,
    pub citations: Vec<String>,
}

/// Question answering over the vector index: embed, retrieve, rank, generate.
#[derive(Clone)]
pub struct RagService {
    llm: Arc<dyn LlmProvider>,
    index: Arc<dyn VectorIndex>,
    settings: RagSettings,
}

impl RagService {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
        settings: RagSettings,
    ) -> Self {
        Self {
            llm,
            index,
            settings,
        }
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    pub fn llm_name(&self) -> &str {
        self.llm.name()
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub async fn answer(&self, query: RagQuery) -> Result<RagAnswer, ApiError> {
        let question = query.question.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("Question must not be empty".to_string()));
        }

        let top_k = query.top_k.unwrap_or(self.settings.top_k);
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(ApiError::BadRequest(format!(
                "top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }
        let fetch_k = self.settings.fetch_k.max(top_k);

        let query_vector = self
            .llm
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Upstream("embedding response was empty".to_string()))?;

        let matches = self.index.query(&query_vector, fetch_k).await?;
        let sources = dedup_and_rank(&matches, top_k);
        let snippets: Vec<String> = sources
            .iter()
            .map(|source| {
                let snippet = extract_snippet(&source.source_metadata);
                truncate_chars(&snippet, self.settings.max_snippet_chars).to_string()
            })
            .collect();
        let citations = titles_only(&sources);

        tracing::debug!(
            "Retrieved {} matches from {}, kept {} sources",
            matches.len(),
            self.index.name(),
            sources.len()
        );

        let input = PromptInput {
            question,
            sources: &sources,
            snippets: &snippets,
            citations: &citations,
            document: query.document.as_ref(),
        };
        let messages = build_messages(
            self.settings.system_prompt.as_deref(),
            &input,
            self.settings.max_document_chars,
        );
        let request = ChatRequest::new(messages)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let answer = self.llm.chat(request).await?;
        let html = answer_html(&answer, &citations);

        tracing::info!(
            "Answered question ({} chars) with {} sources",
            question.chars().count(),
            sources.len()
        );

        Ok(RagAnswer {
            answer,
            html,
            sources,
            citations,
        })
    }
}
