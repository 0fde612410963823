pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{
    HistorySettings, LlmSettings, RagSettings, RateLimitSettings, ServerSettings, Settings,
    UploadSettings, VectorSettings, MAX_TOP_K,
};
