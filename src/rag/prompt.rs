use crate::documents::truncate_chars;
use crate::llm::ChatMessage;
use crate::ranking::RankedSource;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a private trust and fiduciary advisor. \
Answer the user's question using only the numbered sources provided. \
Sources are ranked by authority: Level L1 is the most authoritative and L5 the least; \
when sources disagree, follow the higher-authority source and say so. \
Cite sources by their bracketed number and title. \
If the sources do not answer the question, say that the knowledge base does not cover it \
instead of guessing. This is general information, not legal advice.";

const NO_SOURCES_NOTE: &str = "No matching sources were found in the knowledge base.";

/// A user-supplied document attached to a question.
#[derive(Debug, Clone)]
pub struct AttachedDocument {
    pub name: String,
    pub text: String,
}

/// Everything the prompt is assembled from.
pub struct PromptInput<'a> {
    pub question: &'a str,
    pub sources: &'a [RankedSource],
    pub snippets: &'a [String],
    pub citations: &'a [String],
    pub document: Option<&'a AttachedDocument>,
}

/// `Uniform Trust Code (Level L1, p. 12, v2010)`
pub fn source_label(source: &RankedSource) -> String {
    let mut label = format!(
        "{} (Level {}, p. {}",
        source.title, source.level, source.page
    );
    if !source.version.is_empty() {
        label.push_str(&format!(", v{}", source.version));
    }
    label.push(')');
    label
}

pub fn build_messages(
    system_prompt: Option<&str>,
    input: &PromptInput<'_>,
    max_document_chars: usize,
) -> Vec<ChatMessage> {
    let system = system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT);
    vec![
        ChatMessage::system(system),
        ChatMessage::user(user_prompt(input, max_document_chars)),
    ]
}

fn user_prompt(input: &PromptInput<'_>, max_document_chars: usize) -> String {
    let mut prompt = format!("Question: {}\n\n", input.question.trim());

    if input.sources.is_empty() {
        prompt.push_str(NO_SOURCES_NOTE);
        prompt.push_str("\n\n");
    } else {
        prompt.push_str("Sources:\n");
        for (i, source) in input.sources.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n", i + 1, source_label(source)));
            match input.snippets.get(i).map(|s| s.as_str()) {
                Some(snippet) if !snippet.is_empty() => {
                    prompt.push_str(snippet);
                    prompt.push('\n');
                }
                _ => prompt.push_str("(no excerpt available)\n"),
            }
            prompt.push('\n');
        }
    }

    if let Some(document) = input.document {
        prompt.push_str(&format!("Attached document \"{}\":\n", document.name));
        prompt.push_str(truncate_chars(&document.text, max_document_chars));
        prompt.push_str("\n\n");
    }

    if !input.citations.is_empty() {
        prompt.push_str("Citations available: ");
        prompt.push_str(&input.citations.join("; "));
        prompt.push('\n');
    }

    prompt
}
