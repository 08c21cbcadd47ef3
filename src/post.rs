use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use chrono::NaiveDateTime;
use markdown::Options;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::ParseError;
use crate::text_utils::{content_hash, parse_date_time, slugify};

pub const DEFAULT_MORE_MARKER: &str = "<!--more-->";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub hash: String,
    pub title: String,
    pub slug: String,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
    pub excerpt: String,
    pub body: String,
    /// Original file bytes. Only the raw collection of the store keeps them.
    #[serde(skip)]
    pub raw: Vec<u8>,
    /// File the post was read from, for local posts only.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "slug={}, hash={}, date={}", self.slug, self.hash, self.created_at)?;
        if let Some(updated) = self.updated_at {
            write!(f, ", updated={}", updated)?;
        }
        write!(f, "\ntitle={}", self.title)
    }
}

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub more_marker: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            more_marker: DEFAULT_MORE_MARKER.to_string(),
        }
    }
}

/// Example of post
/// ```text
/// title: Hello World
/// date: 2024-01-01 10:00:00
/// updated: 2024-01-03
///
/// This is the excerpt
///
/// <!--more-->
///
/// And this is the rest of the post
/// ```
impl Post {
    pub fn parse(raw: Vec<u8>, source: Option<PathBuf>, config: &ParserConfig) -> Result<Post, ParseError> {
        let text = match std::str::from_utf8(&raw) {
            Ok(text) => text,
            Err(e) => return Err(ParseError::Encoding(e.to_string())),
        };

        let (front_matter, body) = split_front_matter(text);
        let meta = parse_front_matter(front_matter)?;

        let title = meta.get("title").ok_or(ParseError::MissingField("title"))?.clone();
        let slug = slugify(&title);
        if slug.is_empty() {
            return Err(ParseError::EmptySlug);
        }

        let date = meta.get("date").ok_or(ParseError::MissingField("date"))?;
        let created_at = parse_date_time(date)
            .map_err(|reason| ParseError::InvalidDate { field: "date", reason })?;
        let updated_at = match meta.get("updated") {
            Some(updated) => Some(parse_date_time(updated)
                .map_err(|reason| ParseError::InvalidDate { field: "updated", reason })?),
            None => None,
        };

        let marker = config.more_marker.as_str();
        let excerpt_src = body.split(marker).next().unwrap_or_default();
        let excerpt = render_markdown(excerpt_src)?;
        let body = render_markdown(&body.replace(marker, ""))?;

        let hash = content_hash(&raw);

        Ok(Post {
            hash,
            title,
            slug,
            created_at,
            updated_at,
            excerpt,
            body,
            raw,
            source,
        })
    }
}

/// Front-matter ends at the first blank line. A file without one is all front-matter.
fn split_front_matter(text: &str) -> (&str, &str) {
    match text.find("\n\n") {
        Some(idx) => (&text[..idx], &text[idx + 2..]),
        None => (text, ""),
    }
}

fn parse_front_matter(block: &str) -> Result<HashMap<String, String>, ParseError> {
    let mut meta = HashMap::new();
    if block.trim().is_empty() {
        return Ok(meta);
    }

    let value: Value = serde_yaml::from_str(block)
        .map_err(|e| ParseError::MalformedFrontMatter(e.to_string()))?;
    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(meta),
        _ => return Err(ParseError::MalformedFrontMatter("expected key: value lines".to_string())),
    };

    for (key, val) in mapping {
        let key = match scalar_to_string(key) {
            Some(key) => key,
            None => return Err(ParseError::MalformedFrontMatter("keys must be plain values".to_string())),
        };
        if val.is_null() {
            continue;
        }
        match scalar_to_string(val) {
            Some(val) => meta.insert(key, val),
            None => return Err(ParseError::MalformedFrontMatter(format!("value of {} is not a plain value", key))),
        };
    }

    Ok(meta)
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Raw HTML is escaped. Only the more marker is removed before rendering, other
/// comments are left to the renderer so code spans and blocks keep them.
fn render_markdown(md_text: &str) -> Result<String, ParseError> {
    markdown::to_html_with_options(md_text, &Options::gfm())
        .map_err(|e| ParseError::Render(e.reason))
}
