//! Retrieval-augmented answering.
//!
//! - `service`: the embed → query → rank → generate pipeline (`RagService`)
//! - `prompt`: system/user prompt assembly from ranked sources
//! - `render`: HTML fragment for the browser widget

mod prompt;
mod render;
mod service;

pub use prompt::{source_label, AttachedDocument, DEFAULT_SYSTEM_PROMPT};
pub use render::{answer_html, escape_html};
pub use service::{RagAnswer, RagQuery, RagService};

#[cfg(test)]
pub(crate) use service::tests::{trust_matches, FakeIndex, FakeLlm};
