use llm_client::extract_domain;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("'{selector}' is not a valid CSS selector")]
    BadSelector { selector: String },

    #[error("no element matched selector '{selector}'")]
    SelectorNotFound { selector: String },
}

/// Fetch `target_url` and return the first element matching `selector`,
/// serialized back to HTML. Failures are terminal for the source's pass:
/// no retries, no timeout beyond library defaults.
#[instrument(skip(client, selector), fields(domain = %extract_domain(target_url)))]
pub async fn fetch_content(
    client: &reqwest::Client,
    target_url: &str,
    selector: &str,
) -> Result<String, FetchError> {
    let response = client.get(target_url).send().await?.error_for_status()?;
    let body = response.text().await?;
    debug!(bytes = body.len(), "Fetched page body");

    let parsed_selector =
        Selector::parse(selector).map_err(|_| FetchError::BadSelector {
            selector: selector.to_string(),
        })?;

    let document = Html::parse_document(&body);
    let element = document
        .select(&parsed_selector)
        .next()
        .ok_or_else(|| FetchError::SelectorNotFound {
            selector: selector.to_string(),
        })?;

    Ok(tidy_html(&element.html()))
}

/// Collapse whitespace runs. The output only feeds a prompt, so exact
/// formatting is not load-bearing; this just keeps the snippet compact.
fn tidy_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_whitespace = false;
    for c in html.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
            }
            in_whitespace = true;
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tidy_html_collapses_whitespace_runs() {
        let html = "<div>\n    <a href=\"/a\">A</a>\n\n\t<a href=\"/b\">B</a>\n</div>";
        assert_eq!(
            tidy_html(html),
            "<div> <a href=\"/a\">A</a> <a href=\"/b\">B</a> </div>"
        );
    }

    #[test]
    fn tidy_html_trims_edges() {
        assert_eq!(tidy_html("  <p>x</p>  "), "<p>x</p>");
    }
}
