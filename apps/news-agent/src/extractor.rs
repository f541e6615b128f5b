use llm_client::{LlmError, TextCompletion};
use tracing::instrument;

/// How many recent articles the model is asked for.
pub const MAX_ARTICLES: usize = 20;

/// Fixed-shape instruction sent with every extraction. The HTML snippet is
/// appended verbatim; all link resolution is delegated to the model.
pub fn build_prompt(html_snippet: &str, base_url: &str) -> String {
    format!(
        "Analyze the following HTML content. Extract the {MAX_ARTICLES} most recent articles.\n\
         Your response MUST be a single, valid JSON object.\n\
         The JSON object must have one key: \"articles\", a list of objects, each with keys: \
         \"title\", \"summary\", \"source_url\".\n\
         The summary should describe the article as briefly as possible while capturing the main idea.\n\
         Resolve all URLs to be absolute, using '{base_url}' as the base.\n\
         HTML: {html_snippet}"
    )
}

/// Ask the model for structured article data. Returns the raw model text;
/// JSON validation is the validator's job, not this component's.
#[instrument(skip(model, html_snippet), fields(snippet_len = html_snippet.len()))]
pub async fn extract_articles(
    model: &dyn TextCompletion,
    html_snippet: &str,
    base_url: &str,
) -> Result<String, LlmError> {
    model.complete(&build_prompt(html_snippet, base_url)).await
}
