use serde_json::Value;
use thiserror::Error;
use url::Url;

/// One validated article, alive only for the duration of a source's pass.
/// `source_url` is held parsed so normalization to absolute form happens
/// exactly once, here.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCandidate {
    pub title: String,
    pub summary: String,
    pub source_url: Url,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJsonFound,

    #[error("model output is not valid JSON: {0}")]
    MalformedJson(serde_json::Error),

    #[error("model output does not match the article schema: {detail}")]
    SchemaInvalid { detail: String },
}

/// Locate and parse the JSON object in the model's raw output, then validate
/// it against the article schema. Candidates come back in emission order.
pub fn parse_articles(raw_text: &str) -> Result<Vec<ArticleCandidate>, ParseError> {
    let value = locate_json(raw_text)?;
    validate_schema(&value)
}

/// Models often wrap the JSON in prose. Try a strict parse of the whole
/// (trimmed) output first; failing that, scan for the first balanced `{...}`
/// span with string-aware depth counting, skipping spans that balance but do
/// not parse (stray braces in prose).
fn locate_json(raw_text: &str) -> Result<Value, ParseError> {
    let trimmed = raw_text.trim();
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Ok(value);
        }
    }

    let mut first_failure: Option<serde_json::Error> = None;
    for (start, _) in raw_text.char_indices().filter(|&(_, c)| c == '{') {
        let Some(len) = balanced_object_len(&raw_text[start..]) else {
            continue;
        };
        match serde_json::from_str(&raw_text[start..start + len]) {
            Ok(value) => return Ok(value),
            Err(e) => {
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
    }

    match first_failure {
        Some(e) => Err(ParseError::MalformedJson(e)),
        None => Err(ParseError::NoJsonFound),
    }
}

/// Byte length of the balanced `{...}` span at the start of `s`, if the
/// braces ever balance. Braces inside JSON strings (and escaped quotes) do
/// not count toward the depth.
fn balanced_object_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Schema: `{"articles": [{"title", "summary", "source_url"}, ...]}` with
/// non-empty strings and an absolute http(s) `source_url`. Missing keys are a
/// schema violation, not a parse error.
fn validate_schema(value: &Value) -> Result<Vec<ArticleCandidate>, ParseError> {
    let root = value.as_object().ok_or_else(|| ParseError::SchemaInvalid {
        detail: "top-level value is not an object".to_string(),
    })?;

    let articles = root
        .get("articles")
        .ok_or_else(|| ParseError::SchemaInvalid {
            detail: "missing key 'articles'".to_string(),
        })?
        .as_array()
        .ok_or_else(|| ParseError::SchemaInvalid {
            detail: "'articles' is not a list".to_string(),
        })?;

    let mut candidates = Vec::with_capacity(articles.len());
    for (index, item) in articles.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| ParseError::SchemaInvalid {
            detail: format!("article {index} is not an object"),
        })?;

        let title = non_empty_string(obj, "title");
        let summary = non_empty_string(obj, "summary");
        let source_url = obj
            .get("source_url")
            .and_then(Value::as_str)
            .and_then(|s| Url::parse(s).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https") && u.has_host());

        let mut bad_fields = Vec::new();
        if title.is_none() {
            bad_fields.push("title");
        }
        if summary.is_none() {
            bad_fields.push("summary");
        }
        if source_url.is_none() {
            bad_fields.push("source_url");
        }
        match (title, summary, source_url) {
            (Some(title), Some(summary), Some(source_url)) => {
                candidates.push(ArticleCandidate {
                    title,
                    summary,
                    source_url,
                });
            }
            _ => {
                return Err(ParseError::SchemaInvalid {
                    detail: format!(
                        "article {index}: missing or invalid {}",
                        bad_fields.join(", ")
                    ),
                });
            }
        }
    }

    Ok(candidates)
}

fn non_empty_string(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str =
        r#"{"articles":[{"title":"T1","summary":"S1","source_url":"http://x/a"}]}"#;

    #[test]
    fn parses_bare_json_object() {
        let articles = parse_articles(GOOD).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "T1");
        assert_eq!(articles[0].summary, "S1");
        assert_eq!(articles[0].source_url.as_str(), "http://x/a");
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let raw = format!("Here you go:\n```json\n{GOOD}\n```\nanything else?");
        let articles = parse_articles(&raw).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "T1");
    }

    #[test]
    fn skips_stray_braces_in_leading_prose() {
        let raw = format!("{{not json}} but then {GOOD} trailing");
        let articles = parse_articles(&raw).unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn braces_inside_strings_do_not_break_the_scan() {
        let raw = r#"noise {"articles":[{"title":"a } b","summary":"S","source_url":"http://x/a"}]} tail"#;
        let articles = parse_articles(raw).unwrap();
        assert_eq!(articles[0].title, "a } b");
    }

    #[test]
    fn no_braces_is_no_json_found() {
        assert!(matches!(
            parse_articles("not json at all"),
            Err(ParseError::NoJsonFound)
        ));
    }

    #[test]
    fn unclosed_object_is_no_json_found() {
        assert!(matches!(
            parse_articles(r#"prefix {"articles": ["#),
            Err(ParseError::NoJsonFound)
        ));
    }

    #[test]
    fn balanced_but_invalid_json_is_malformed() {
        assert!(matches!(
            parse_articles("{definitely not json}"),
            Err(ParseError::MalformedJson(_))
        ));
    }

    #[test]
    fn missing_articles_key_is_schema_invalid() {
        assert!(matches!(
            parse_articles(r#"{"items": []}"#),
            Err(ParseError::SchemaInvalid { .. })
        ));
    }

    #[test]
    fn missing_title_names_the_field() {
        let raw = r#"{"articles":[{"summary":"S","source_url":"http://x/a"}]}"#;
        match parse_articles(raw) {
            Err(ParseError::SchemaInvalid { detail }) => {
                assert!(detail.contains("title"), "detail was: {detail}");
                assert!(detail.contains("article 0"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn empty_summary_is_rejected() {
        let raw = r#"{"articles":[{"title":"T","summary":"  ","source_url":"http://x/a"}]}"#;
        match parse_articles(raw) {
            Err(ParseError::SchemaInvalid { detail }) => {
                assert!(detail.contains("summary"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn relative_source_url_is_rejected() {
        let raw = r#"{"articles":[{"title":"T","summary":"S","source_url":"/a"}]}"#;
        match parse_articles(raw) {
            Err(ParseError::SchemaInvalid { detail }) => {
                assert!(detail.contains("source_url"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let raw = r#"{"articles":[{"title":"T","summary":"S","source_url":"ftp://x/a"}]}"#;
        assert!(matches!(
            parse_articles(raw),
            Err(ParseError::SchemaInvalid { .. })
        ));
    }

    #[test]
    fn preserves_model_emission_order() {
        let raw = r#"{"articles":[
            {"title":"first","summary":"S","source_url":"http://x/1"},
            {"title":"second","summary":"S","source_url":"http://x/2"}
        ]}"#;
        let articles = parse_articles(raw).unwrap();
        assert_eq!(articles[0].title, "first");
        assert_eq!(articles[1].title, "second");
    }

    #[test]
    fn empty_article_list_is_valid() {
        assert!(parse_articles(r#"{"articles": []}"#).unwrap().is_empty());
    }
}
