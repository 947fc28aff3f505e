use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured payload of a memory.
///
/// `text` is serialized as `content` so a stored record reads
/// `{"content": {"content": "...", "action": "..."}}`. Any other fields
/// the caller attaches are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "content", default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// True when there is non-whitespace text to embed.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn has_action(&self) -> bool {
        self.action.as_deref().is_some_and(|a| !a.is_empty())
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

/// An embeddable text record scoped to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Uuid>,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Set by the backend on insert: false when a near-duplicate already existed.
    #[serde(default)]
    pub unique: bool,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    pub fn new(user_id: Uuid, content: impl Into<Content>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            agent_id: None,
            room_id: None,
            content: content.into(),
            embedding: None,
            unique: false,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_agent(mut self, agent_id: Uuid) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    #[must_use]
    pub fn with_room(mut self, room_id: Uuid) -> Self {
        self.room_id = Some(room_id);
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// A memory returned by a content-similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub memory: Memory,
    /// Score in the backend's convention (edit distance for content queries).
    pub similarity: f32,
    /// Threshold the query was issued with.
    pub threshold: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_serializes_text_as_content_field() {
        let content = Content::text("hello").with_action("CONTINUE");
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["content"], "hello");
        assert_eq!(value["action"], "CONTINUE");
    }

    #[test]
    fn test_content_preserves_extra_fields() {
        let json = r#"{"content": "hi", "source": "discord", "inReplyTo": "abc"}"#;
        let content: Content = serde_json::from_str(json).unwrap();
        assert_eq!(content.text, "hi");
        assert!(!content.has_action());
        assert_eq!(content.extra["source"], "discord");

        let back = serde_json::to_value(&content).unwrap();
        assert_eq!(back["inReplyTo"], "abc");
    }

    #[test]
    fn test_has_text_ignores_whitespace() {
        assert!(!Content::text("   \n").has_text());
        assert!(!Content::default().has_text());
        assert!(Content::text(" a ").has_text());
    }

    #[test]
    fn test_memory_builders() {
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        let memory = Memory::new(user, "text")
            .with_room(room)
            .with_embedding(vec![0.0; 4]);

        assert_eq!(memory.user_id, user);
        assert_eq!(memory.room_id, Some(room));
        assert!(memory.has_embedding());
        assert!(!memory.unique);
    }
}
