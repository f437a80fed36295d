//! Clipboard history types
//!
//! Core data structures for clipboard entries and their on-disk record form.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{collapse_whitespace, truncate_chars};

/// Maximum preview length in characters before `...` is appended
pub const PREVIEW_MAX_CHARS: usize = 80;

/// Content type tag for clipboard entries.
///
/// Unknown tags read from disk are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentKind {
    #[default]
    Text,
    Image,
    Html,
    Uri,
    Other(String),
}

impl ContentKind {
    pub fn as_str(&self) -> &str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Html => "html",
            ContentKind::Uri => "uri",
            ContentKind::Other(tag) => tag,
        }
    }

    /// Title-cased tag used in non-text previews, e.g. `Image`, `X-Custom`.
    /// Every alphabetic run starts upper case, the rest is lower case.
    fn label(&self) -> String {
        let mut label = String::with_capacity(self.as_str().len());
        let mut word_start = true;
        for c in self.as_str().chars() {
            if word_start {
                label.extend(c.to_uppercase());
            } else {
                label.extend(c.to_lowercase());
            }
            word_start = !c.is_alphabetic();
        }
        label
    }
}

impl From<String> for ContentKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => ContentKind::Text,
            "image" => ContentKind::Image,
            "html" => ContentKind::Html,
            "uri" => ContentKind::Uri,
            _ => ContentKind::Other(tag),
        }
    }
}

impl From<&str> for ContentKind {
    fn from(tag: &str) -> Self {
        ContentKind::from(tag.to_string())
    }
}

impl From<ContentKind> for String {
    fn from(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded clipboard capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "EntryRecord", try_from = "EntryRecord")]
pub struct ClipboardEntry {
    pub content: String,
    pub content_kind: ContentKind,
    pub captured_at: DateTime<Utc>,
}

impl ClipboardEntry {
    /// New entry captured now.
    pub fn new(content: impl Into<String>, content_kind: ContentKind) -> Self {
        Self::with_timestamp(content, content_kind, Utc::now())
    }

    pub fn with_timestamp(
        content: impl Into<String>,
        content_kind: ContentKind,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            content_kind,
            captured_at,
        }
    }

    /// Short human-readable label, derived on every call.
    ///
    /// Text collapses whitespace and is capped at [`PREVIEW_MAX_CHARS`];
    /// other kinds render as `[Image - 14:03:07]` in local time.
    pub fn preview(&self) -> String {
        match self.content_kind {
            ContentKind::Text => {
                truncate_chars(&collapse_whitespace(&self.content), PREVIEW_MAX_CHARS)
            }
            _ => format!(
                "[{} - {}]",
                self.content_kind.label(),
                self.captured_at.with_timezone(&Local).format("%H:%M:%S")
            ),
        }
    }

    /// True when this entry holds exactly `content` of `kind`.
    pub fn matches(&self, content: &str, kind: &ContentKind) -> bool {
        self.content == content && &self.content_kind == kind
    }
}

/// On-disk form of an entry: `{content, content_type, timestamp, preview}`.
///
/// `preview` is written for human readers and ignored when reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub content: String,
    #[serde(default)]
    pub content_type: ContentKind,
    pub timestamp: String,
    #[serde(default, skip_deserializing)]
    pub preview: String,
}

impl From<ClipboardEntry> for EntryRecord {
    fn from(entry: ClipboardEntry) -> Self {
        let preview = entry.preview();
        EntryRecord {
            timestamp: entry.captured_at.to_rfc3339(),
            content: entry.content,
            content_type: entry.content_kind,
            preview,
        }
    }
}

impl TryFrom<EntryRecord> for ClipboardEntry {
    type Error = String;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        let captured_at = parse_timestamp(&record.timestamp)
            .ok_or_else(|| format!("invalid timestamp: {}", record.timestamp))?;
        Ok(ClipboardEntry {
            content: record.content,
            content_kind: record.content_type,
            captured_at,
        })
    }
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
