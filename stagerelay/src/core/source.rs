//! Discovered reference sources.

use serde::{Deserialize, Serialize};

/// A reference discovered during a run, keyed by its locator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Unique locator, normally a URL.
    #[serde(alias = "url")]
    pub locator: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Author, when the search tool reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Short excerpt of the page.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "text")]
    pub snippet: Option<String>,
    /// Publication date as reported by the search tool.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "publishedDate"
    )]
    pub published_date: Option<String>,
}

impl SourceRecord {
    /// Creates a new source with a locator and title.
    #[must_use]
    pub fn new(locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets the snippet.
    #[must_use]
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Returns the locator normalized for deduplication.
    #[must_use]
    pub fn dedup_key(&self) -> &str {
        self.locator.trim()
    }
}
