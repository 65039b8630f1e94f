use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::models::{MetricField, RegionMetrics};

/// Domain framing sent as the system turn. Static, never derived from the request.
pub const SYSTEM_PROMPT: &str = include_str!("prompts/geo_system.md");

pub const ANALYSIS_REQUEST: &str = "Please analyze and explain this data scientifically in detail.";

// ============================================================================
// Message structure (OpenAI-compatible chat format)
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::ImageUrl { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

/// Always exactly `[system, user]`; only [`compose`] builds one.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct MultimodalMessage {
    messages: Vec<ChatMessage>,
}

impl MultimodalMessage {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn system(&self) -> &ChatMessage {
        &self.messages[0]
    }

    pub fn user(&self) -> &ChatMessage {
        &self.messages[1]
    }

    pub fn has_image(&self) -> bool {
        self.user().content.iter().any(ContentBlock::is_image)
    }
}

// ============================================================================
// Composition
// ============================================================================

/// One line per metric, in fixed order, placeholder included.
pub fn region_summary(metrics: &RegionMetrics) -> String {
    MetricField::iter()
        .map(|field| match field.unit() {
            Some(unit) => format!("{}: {} {}", field.label(), metrics.display(field), unit),
            None => format!("{}: {}", field.label(), metrics.display(field)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn user_text(question: &str, metrics: &RegionMetrics) -> String {
    format!(
        r#"Region Data:
{}

Question:
{}

{}"#,
        region_summary(metrics),
        question,
        ANALYSIS_REQUEST
    )
}

pub fn compose(question: &str, metrics: &RegionMetrics, image_url: Option<&str>) -> MultimodalMessage {
    let system = ChatMessage {
        role: Role::System,
        content: vec![ContentBlock::text(SYSTEM_PROMPT.trim())],
    };

    let mut content = vec![ContentBlock::text(user_text(question, metrics))];
    if let Some(url) = image_url {
        content.push(ContentBlock::image_url(url));
    }
    let user = ChatMessage {
        role: Role::User,
        content,
    };

    MultimodalMessage {
        messages: vec![system, user],
    }
}
