//! Message log entries and reference documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Role-specific fields of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Assistant {
        /// Produced in analysis mode with references selected; eligible for export.
        is_report: bool,
    },
    System,
}

/// An entry in the session log.
///
/// Messages are only created inside this crate. After creation the role and
/// timestamp never change; assistant content grows through [`Message::with_appended`],
/// which returns a new value instead of touching the published one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    #[serde(flatten)]
    kind: MessageKind,
    content: String,
    created_at: DateTime<Utc>,
}

impl Message {
    pub(crate) fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content.into())
    }

    pub(crate) fn assistant(content: impl Into<String>, is_report: bool) -> Self {
        Self::new(MessageKind::Assistant { is_report }, content.into())
    }

    /// Empty assistant message that streamed fragments are folded into.
    pub(crate) fn placeholder(is_report: bool) -> Self {
        Self::assistant(String::new(), is_report)
    }

    fn new(kind: MessageKind, content: String) -> Self {
        Self {
            kind,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn role(&self) -> Role {
        match self.kind {
            MessageKind::User => Role::User,
            MessageKind::Assistant { .. } => Role::Assistant,
            MessageKind::System => Role::System,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_report(&self) -> bool {
        matches!(self.kind, MessageKind::Assistant { is_report: true })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self.kind, MessageKind::Assistant { .. })
    }

    /// Returns a copy with `fragment` appended, keeping role, report flag and timestamp.
    pub(crate) fn with_appended(&self, fragment: &str) -> Self {
        let mut content = String::with_capacity(self.content.len() + fragment.len());
        content.push_str(&self.content);
        content.push_str(fragment);
        Self {
            kind: self.kind,
            content,
            created_at: self.created_at,
        }
    }
}

/// A news item returned by the search collaborator.
///
/// Identified by `link`; the session only references these, it never edits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub description: String,
    /// Crawled article body, when the crawler could fetch it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, rename = "pubDate", skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
}

impl ReferenceItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: String::new(),
            content: None,
            pub_date: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Title with search highlight markup (`<b>`) and common entities removed.
    pub fn display_title(&self) -> String {
        let mut out = String::with_capacity(self.title.len());
        let mut in_tag = false;
        for ch in self.title.chars() {
            match ch {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if !in_tag => out.push(ch),
                _ => {}
            }
        }
        out.replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&")
    }

    /// Body used when injecting this item into a request: crawled content,
    /// then the search snippet, then `None` when both are empty.
    pub fn body(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| Some(self.description.as_str()).filter(|d| !d.trim().is_empty()))
    }
}
