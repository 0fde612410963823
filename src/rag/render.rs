//! HTML fragment for the chat widget.

/// Renders the model answer as escaped paragraphs followed by the source list.
pub fn answer_html(answer: &str, citations: &[String]) -> String {
    let mut html = String::new();

    let normalized = answer.replace("\r\n", "\n");
    for paragraph in normalized.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let lines: Vec<String> = paragraph.lines().map(escape_html).collect();
        html.push_str("<p>");
        html.push_str(&lines.join("<br>"));
        html.push_str("</p>");
    }

    if !citations.is_empty() {
        html.push_str("<div class=\"sources\"><h4>Sources</h4><ol>");
        for title in citations {
            html.push_str("<li>");
            html.push_str(&escape_html(title));
            html.push_str("</li>");
        }
        html.push_str("</ol></div>");
    }

    html
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
