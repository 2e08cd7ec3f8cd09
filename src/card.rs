//! Card mapping
//!
//! A card is the display summary of one article block. It is rebuilt on every
//! read from the fetched content object, or from the block payload alone when
//! no gateway answered. Mapping never fails: a missing or oddly shaped field
//! becomes `None` (or an empty excerpt).

use crate::blockchain::Block;
use crate::config::ResolverConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default payload key holding the content identifier.
pub const CONTENT_ID_KEY: &str = "metadata_hash";
/// Payload key holding the preferred gateway URL for the content.
pub const CONTENT_URL_KEY: &str = "ipfs_url";

pub const EXCERPT_WORDS: usize = 20;
pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Uploader identifier.
    pub id: Option<String>,
    pub title: Option<String>,
    pub excerpt: String,
    /// Content identifier of the thumbnail image.
    pub thumbnail: Option<String>,
    pub reliability: Option<f64>,
    pub category: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(rename = "blockHash")]
    pub block_hash: Option<String>,
    pub metadata_hash: Option<String>,
}

/// First [`EXCERPT_WORDS`] whitespace-delimited words, with [`ELLIPSIS`]
/// appended when anything was cut.
pub fn excerpt(text: &str) -> String {
    let mut words = text.split_whitespace();
    let mut out = words
        .by_ref()
        .take(EXCERPT_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    if words.next().is_some() {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Maps content objects and blocks into cards.
#[derive(Debug, Clone)]
pub struct CardMapper {
    content_keys: Vec<String>,
}

impl Default for CardMapper {
    fn default() -> Self {
        Self::new(vec![CONTENT_ID_KEY.to_string()])
    }
}

impl CardMapper {
    /// `content_keys` are the payload keys tried, in order, for a content identifier.
    pub fn new(content_keys: Vec<String>) -> Self {
        Self { content_keys }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.content_keys.clone())
    }

    /// Content identifier of a block: the first non-blank content key, else
    /// the last path segment of an embedded gateway URL.
    pub fn content_id(&self, block: &Block) -> Option<String> {
        let explicit = self
            .content_keys
            .iter()
            .filter_map(|key| block.data.get(key).and_then(text))
            .find(|cid| !cid.trim().is_empty());
        if explicit.is_some() {
            return explicit;
        }
        block
            .data_str(CONTENT_URL_KEY)
            .filter(|url| url.contains("/ipfs/"))
            .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
            .filter(|tail| !tail.is_empty())
            .map(str::to_string)
    }

    /// Builds a card from a fetched content object. `fallback` supplies the
    /// publication time and block hash when the content does not carry them.
    pub fn from_content(&self, content: &Value, fallback: Option<&Block>) -> Card {
        let title = field_text(content, "title");
        let description = field_text(content, "description").unwrap_or_default();

        let id = content
            .get("uploaded_by")
            .and_then(|u| u.get("userID"))
            .and_then(text);

        let reliability = content
            .get("verification")
            .and_then(|v| v.get("score"))
            .and_then(number);

        let published_at = field_text(content, "published_at")
            .or_else(|| fallback.and_then(|b| format_timestamp(b.timestamp)));
        let block_hash =
            field_text(content, "block_hash").or_else(|| fallback.map(|b| b.hash.clone()));

        Card {
            id,
            thumbnail: thumbnail(content, title.as_deref()),
            excerpt: excerpt(&description),
            title,
            reliability,
            category: field_text(content, "category"),
            published_at,
            block_hash,
            metadata_hash: field_text(content, CONTENT_ID_KEY),
        }
    }

    /// Minimal card built from the block payload alone.
    pub fn from_block(&self, block: &Block) -> Card {
        let title = block.data.get("title").and_then(text);
        let cid = self.content_id(block);

        let description = block
            .data
            .get("description")
            .and_then(text)
            .filter(|d| !d.is_empty())
            .or_else(|| title.clone())
            .unwrap_or_default();

        let published_at = block
            .data
            .get("timestamp")
            .and_then(text)
            .or_else(|| format_timestamp(block.timestamp));

        Card {
            id: None,
            title,
            excerpt: excerpt(&description),
            thumbnail: cid.clone(),
            reliability: None,
            category: block.data.get("category").and_then(text),
            published_at,
            block_hash: Some(block.hash.clone()),
            metadata_hash: cid,
        }
    }
}

/// Picks the file pinned as `"<title> - image 1"`, else the first listed file.
fn thumbnail(content: &Value, title: Option<&str>) -> Option<String> {
    let files = content.get("files").and_then(Value::as_array)?;
    let expected = format!("{} - image 1", title.unwrap_or("").trim());

    files
        .iter()
        .find(|f| f.get("pin_name").and_then(Value::as_str) == Some(expected.as_str()))
        .and_then(file_hash)
        .or_else(|| files.first().and_then(file_hash))
}

fn file_hash(file: &Value) -> Option<String> {
    file.get("ipfsHash").and_then(text).filter(|h| !h.is_empty())
}

fn field_text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(text)
}

/// Strings as-is, numbers in decimal; anything else is absent.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn format_timestamp(secs: f64) -> Option<String> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round() as i64;
    chrono::DateTime::from_timestamp_micros(micros).map(|dt| dt.to_rfc3339())
}
