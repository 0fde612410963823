//! Typed settings resolved from the merged YAML config and the environment.
//!
//! Environment variables win over file values so a container platform can
//! inject credentials without touching `config.yml`.

use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_PINECONE_CONTROL_PLANE: &str = "https://api.pinecone.io";

/// Upper bound for sources returned per answer.
pub const MAX_TOP_K: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub vector: VectorSettings,
    pub rag: RagSettings,
    pub rate_limit: RateLimitSettings,
    pub history: HistorySettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub require_key_for_rag: bool,
    pub trust_proxy_headers: bool,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmSettings {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embed_model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorSettings {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub index: Option<String>,
    pub host: Option<String>,
    pub namespace: Option<String>,
    pub control_plane_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagSettings {
    pub top_k: usize,
    pub fetch_k: usize,
    pub max_snippet_chars: usize,
    pub max_document_chars: usize,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSettings {
    pub requests_per_minute: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySettings {
    pub enabled: bool,
    pub default_limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSettings {
    pub max_bytes: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: 6,
            fetch_k: 12,
            max_snippet_chars: 1200,
            max_document_chars: 12_000,
            temperature: 0.2,
            max_tokens: 800,
            system_prompt: None,
        }
    }
}

impl Settings {
    /// Resolves settings from a validated config value. `env` looks up an
    /// environment variable; blank values count as unset.
    pub fn resolve<F>(config: &Value, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let rag_defaults = RagSettings::default();

        let server = ServerSettings {
            host: string_at(config, "server", "host").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env("PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .or_else(|| u64_at(config, "server", "port").map(|v| v as u16))
                .unwrap_or(8000),
            api_key: env("RAG_API_KEY").or_else(|| string_at(config, "server", "api_key")),
            require_key_for_rag: bool_at(config, "server", "require_key_for_rag").unwrap_or(false),
            trust_proxy_headers: bool_at(config, "server", "trust_proxy_headers").unwrap_or(false),
            cors_allowed_origins: string_list_at(config, "server", "cors_allowed_origins")
                .unwrap_or_else(|| vec!["*".to_string()]),
        };

        let llm = LlmSettings {
            api_key: env("OPENAI_API_KEY").or_else(|| string_at(config, "llm", "api_key")),
            base_url: env("OPENAI_BASE_URL")
                .or_else(|| string_at(config, "llm", "base_url"))
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            chat_model: env("OPENAI_CHAT_MODEL")
                .or_else(|| string_at(config, "llm", "chat_model"))
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            embed_model: env("OPENAI_EMBED_MODEL")
                .or_else(|| string_at(config, "llm", "embed_model"))
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            timeout_secs: u64_at(config, "llm", "timeout_secs").unwrap_or(60),
        };

        let vector = VectorSettings {
            api_key: env("PINECONE_API_KEY").or_else(|| string_at(config, "vector", "api_key")),
            index: env("PINECONE_INDEX").or_else(|| string_at(config, "vector", "index")),
            host: env("PINECONE_HOST").or_else(|| string_at(config, "vector", "host")),
            namespace: env("PINECONE_NAMESPACE")
                .or_else(|| string_at(config, "vector", "namespace")),
            control_plane_url: string_at(config, "vector", "control_plane_url")
                .unwrap_or_else(|| DEFAULT_PINECONE_CONTROL_PLANE.to_string()),
            timeout_secs: u64_at(config, "vector", "timeout_secs").unwrap_or(30),
        };

        let rag = RagSettings {
            top_k: env("RAG_TOP_K")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| (1..=MAX_TOP_K).contains(v))
                .or_else(|| u64_at(config, "rag", "top_k").map(|v| v as usize))
                .filter(|v| (1..=MAX_TOP_K).contains(v))
                .unwrap_or(rag_defaults.top_k),
            fetch_k: u64_at(config, "rag", "fetch_k")
                .map(|v| v as usize)
                .unwrap_or(rag_defaults.fetch_k),
            max_snippet_chars: u64_at(config, "rag", "max_snippet_chars")
                .map(|v| v as usize)
                .unwrap_or(rag_defaults.max_snippet_chars),
            max_document_chars: u64_at(config, "rag", "max_document_chars")
                .map(|v| v as usize)
                .unwrap_or(rag_defaults.max_document_chars),
            temperature: f64_at(config, "rag", "temperature").unwrap_or(rag_defaults.temperature),
            max_tokens: u64_at(config, "rag", "max_tokens")
                .map(|v| v as u32)
                .unwrap_or(rag_defaults.max_tokens),
            system_prompt: string_at(config, "rag", "system_prompt"),
        };

        let rate_limit = RateLimitSettings {
            requests_per_minute: u64_at(config, "rate_limit", "requests_per_minute")
                .map(|v| v as u32)
                .unwrap_or(30),
            burst: u64_at(config, "rate_limit", "burst")
                .map(|v| v as u32)
                .unwrap_or(10),
        };

        let history = HistorySettings {
            enabled: bool_at(config, "history", "enabled").unwrap_or(true),
            default_limit: u64_at(config, "history", "default_limit")
                .map(|v| v as i64)
                .unwrap_or(100),
        };

        let uploads = UploadSettings {
            max_bytes: u64_at(config, "uploads", "max_bytes")
                .map(|v| v as usize)
                .unwrap_or(10 * 1024 * 1024),
        };

        Settings {
            server,
            llm,
            vector,
            rag,
            rate_limit,
            history,
            uploads,
        }
    }
}

fn field<'a>(config: &'a Value, section: &str, key: &str) -> Option<&'a Value> {
    config.get(section).and_then(|s| s.get(key))
}

fn string_at(config: &Value, section: &str, key: &str) -> Option<String> {
    field(config, section, key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn string_list_at(config: &Value, section: &str, key: &str) -> Option<Vec<String>> {
    let list: Vec<String> = field(config, section, key)?
        .as_array()?
        .iter()
        .filter_map(|item| item.as_str())
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    (!list.is_empty()).then_some(list)
}

fn u64_at(config: &Value, section: &str, key: &str) -> Option<u64> {
    field(config, section, key).and_then(|v| v.as_u64())
}

fn f64_at(config: &Value, section: &str, key: &str) -> Option<f64> {
    field(config, section, key).and_then(|v| v.as_f64())
}

fn bool_at(config: &Value, section: &str, key: &str) -> Option<bool> {
    field(config, section, key).and_then(|v| v.as_bool())
}
