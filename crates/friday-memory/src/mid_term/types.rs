//! Mid Tier Type Definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::parse_timestamp;

/// A stored conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub friday_response: String,
    pub context: Option<Value>,
    pub metadata: Option<Value>,
}

impl Interaction {
    /// Text mirrored into the long tier: the user line, plus the reply when there is one
    pub fn transcript(&self) -> String {
        let mut text = format!("User: {}", self.user_input);
        if !self.friday_response.is_empty() {
            text.push_str("\nFriday: ");
            text.push_str(&self.friday_response);
        }
        text
    }
}

/// Speaker of a role/content message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Friday,
}

impl Role {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "friday" => Some(Self::Friday),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Friday => "friday",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interaction with explicit fields; id and timestamp are generated when absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplicitInteraction {
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub user_input: String,
    pub friday_response: Option<String>,
    pub context: Option<Value>,
    pub metadata: Option<Value>,
}

impl ExplicitInteraction {
    /// Create an exchange with a user line and a reply
    pub fn exchange(user_input: impl Into<String>, friday_response: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            friday_response: Some(friday_response.into()),
            ..Default::default()
        }
    }
}

/// Every shape `store_interaction` accepts
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionInput {
    /// A single message from one side of the conversation
    RoleContent {
        role: Role,
        content: String,
        context: Option<Value>,
        timestamp: Option<String>,
        conversation_id: Option<String>,
    },

    /// A full record
    ExplicitFields(ExplicitInteraction),

    /// Free text, stored as the user line
    RawText(String),
}

impl InteractionInput {
    /// Message from the user
    pub fn user(content: impl Into<String>) -> Self {
        Self::RoleContent {
            role: Role::User,
            content: content.into(),
            context: None,
            timestamp: None,
            conversation_id: None,
        }
    }

    /// Message from the assistant
    pub fn friday(content: impl Into<String>) -> Self {
        Self::RoleContent {
            role: Role::Friday,
            content: content.into(),
            context: None,
            timestamp: None,
            conversation_id: None,
        }
    }

    /// Attach a conversation id to a role/content message; other shapes are unchanged
    pub fn in_conversation(mut self, id: Option<String>) -> Self {
        if let Self::RoleContent { conversation_id, .. } = &mut self {
            *conversation_id = id;
        }
        self
    }

    /// Resolve a loosely-shaped JSON payload.
    ///
    /// - `{"role", "content"}` with role `user` or `friday` is a message
    /// - `{"user_input", ...}` is a full record
    /// - a string is free text
    /// - anything else is stored verbatim as its JSON text
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::RawText(text),
            Value::Object(fields) if fields.contains_key("role") && fields.contains_key("content") => {
                Self::from_role_content(fields)
            }
            Value::Object(fields) if fields.contains_key("user_input") => Self::from_explicit(fields),
            other => {
                tracing::error!(shape = %shape_name(&other), "Unrecognized interaction shape, storing as text");
                Self::RawText(other.to_string())
            }
        }
    }

    fn from_role_content(mut fields: Map<String, Value>) -> Self {
        let role = fields.get("role").and_then(Value::as_str).and_then(Role::from_str);
        let Some(role) = role else {
            tracing::error!(role = %fields.get("role").cloned().unwrap_or_default(), "Unknown interaction role, storing as text");
            return Self::RawText(Value::Object(fields).to_string());
        };

        Self::RoleContent {
            role,
            content: fields.get("content").map(text_of).unwrap_or_default(),
            context: fields.remove("context").filter(|v| !v.is_null()),
            timestamp: fields.get("timestamp").and_then(Value::as_str).map(str::to_string),
            conversation_id: fields
                .get("conversation_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    fn from_explicit(mut fields: Map<String, Value>) -> Self {
        let timestamp = match fields.get("timestamp").and_then(Value::as_str) {
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    tracing::error!(timestamp = %raw, "Unparseable interaction timestamp, using current time");
                }
                parsed
            }
            None => None,
        };

        Self::ExplicitFields(ExplicitInteraction {
            id: fields.get("id").and_then(Value::as_str).map(str::to_string),
            timestamp,
            user_input: fields.get("user_input").map(text_of).unwrap_or_default(),
            friday_response: fields.get("friday_response").map(text_of),
            context: fields.remove("context").filter(|v| !v.is_null()),
            metadata: fields.remove("metadata").filter(|v| !v.is_null()),
        })
    }

    /// Build the canonical record, filling in id, timestamp and empty strings
    pub fn into_interaction(self, now: DateTime<Utc>) -> Interaction {
        match self {
            Self::RoleContent {
                role,
                content,
                context,
                timestamp,
                conversation_id,
            } => {
                let mut metadata = Map::new();
                if let Some(ts) = timestamp {
                    metadata.insert("timestamp".into(), Value::String(ts));
                }
                if let Some(id) = conversation_id {
                    metadata.insert("conversation_id".into(), Value::String(id));
                }

                let (user_input, friday_response) = match role {
                    Role::User => (content, String::new()),
                    Role::Friday => (String::new(), content),
                };

                Interaction {
                    id: new_id(),
                    timestamp: now,
                    user_input,
                    friday_response,
                    context,
                    metadata: (!metadata.is_empty()).then_some(Value::Object(metadata)),
                }
            }
            Self::ExplicitFields(fields) => Interaction {
                id: fields.id.unwrap_or_else(new_id),
                timestamp: fields.timestamp.unwrap_or(now),
                user_input: fields.user_input,
                friday_response: fields.friday_response.unwrap_or_default(),
                context: fields.context,
                metadata: fields.metadata,
            },
            Self::RawText(text) => Interaction {
                id: new_id(),
                timestamp: now,
                user_input: text,
                friday_response: String::new(),
                context: None,
                metadata: None,
            },
        }
    }
}

impl From<Value> for InteractionInput {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<&str> for InteractionInput {
    fn from(text: &str) -> Self {
        Self::RawText(text.to_string())
    }
}

impl From<String> for InteractionInput {
    fn from(text: String) -> Self {
        Self::RawText(text)
    }
}

impl From<ExplicitInteraction> for InteractionInput {
    fn from(fields: ExplicitInteraction) -> Self {
        Self::ExplicitFields(fields)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A stored user preference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub key: String,
    pub value: Value,
    pub last_updated: DateTime<Utc>,
}

/// Summary of a finished (or running) session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub metadata: Option<Value>,
}

/// Input for recording a session summary
#[derive(Debug, Clone, PartialEq)]
pub struct NewSessionSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub metadata: Option<Value>,
}

impl NewSessionSummary {
    /// Summary for a session that started at `start_time`
    pub fn new(start_time: DateTime<Utc>, summary: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time: None,
            summary: Some(summary.into()),
            metadata: None,
        }
    }

    pub fn ended_at(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Tables owned by the mid tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidTermTable {
    Interactions,
    SessionSummaries,
    UserPreferences,
}

impl MidTermTable {
    pub const ALL: [Self; 3] = [Self::Interactions, Self::SessionSummaries, Self::UserPreferences];

    /// Table name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactions => "interactions",
            Self::SessionSummaries => "session_summaries",
            Self::UserPreferences => "user_preferences",
        }
    }
}

/// Row counts per mid tier table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidTermCounts {
    pub interactions: u64,
    pub sessions: u64,
    pub preferences: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_explicit_shape() {
        let input = InteractionInput::from_value(json!({
            "user_input": "hi",
            "friday_response": "hello",
            "context": { "topic": "greeting" }
        }));
        let record = input.into_interaction(now());

        assert!(!record.id.is_empty());
        assert_eq!(record.timestamp, now());
        assert_eq!(record.user_input, "hi");
        assert_eq!(record.friday_response, "hello");
        assert_eq!(record.context, Some(json!({ "topic": "greeting" })));
        assert_eq!(record.metadata, None);
    }

    #[test]
    fn test_explicit_shape_keeps_given_id_and_timestamp() {
        let input = InteractionInput::from_value(json!({
            "id": "abc",
            "timestamp": "2026-01-01T08:00:00+00:00",
            "user_input": "earlier"
        }));
        let record = input.into_interaction(now());

        assert_eq!(record.id, "abc");
        assert_eq!(record.timestamp, Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap());
        assert_eq!(record.friday_response, "");
    }

    #[test]
    fn test_explicit_null_fields_become_empty() {
        let record = InteractionInput::from_value(json!({ "user_input": null, "friday_response": null }))
            .into_interaction(now());
        assert_eq!(record.user_input, "");
        assert_eq!(record.friday_response, "");
    }

    #[test]
    fn test_role_content_shapes() {
        let user = InteractionInput::from_value(json!({ "role": "user", "content": "what time is it" }))
            .into_interaction(now());
        assert_eq!(user.user_input, "what time is it");
        assert_eq!(user.friday_response, "");
        assert_eq!(user.metadata, None);

        let friday = InteractionInput::from_value(json!({
            "role": "friday",
            "content": "It is noon.",
            "timestamp": "2026-05-04T12:00:00"
        }))
        .into_interaction(now());
        assert_eq!(friday.user_input, "");
        assert_eq!(friday.friday_response, "It is noon.");
        assert_eq!(friday.metadata, Some(json!({ "timestamp": "2026-05-04T12:00:00" })));
    }

    #[test]
    fn test_unknown_role_is_stored_as_text() {
        let payload = json!({ "role": "system", "content": "boot" });
        let record = InteractionInput::from_value(payload.clone()).into_interaction(now());

        assert_eq!(record.user_input, payload.to_string());
        assert_eq!(record.friday_response, "");
    }

    #[test]
    fn test_unrecognized_shapes_are_stored_as_text() {
        let record = InteractionInput::from_value(json!({ "note": "x" })).into_interaction(now());
        assert_eq!(record.user_input, r#"{"note":"x"}"#);

        let record = InteractionInput::from_value(json!(17)).into_interaction(now());
        assert_eq!(record.user_input, "17");

        let record = InteractionInput::from("just text").into_interaction(now());
        assert_eq!(record.user_input, "just text");
    }

    #[test]
    fn test_conversation_id_lands_in_metadata() {
        let record = InteractionInput::user("hello")
            .in_conversation(Some("conv-1".into()))
            .into_interaction(now());
        assert_eq!(record.metadata, Some(json!({ "conversation_id": "conv-1" })));
    }

    #[test]
    fn test_transcript() {
        let record = InteractionInput::from(ExplicitInteraction::exchange("hi", "hello")).into_interaction(now());
        assert_eq!(record.transcript(), "User: hi\nFriday: hello");

        let record = InteractionInput::user("only me").into_interaction(now());
        assert_eq!(record.transcript(), "User: only me");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = InteractionInput::from("x").into_interaction(now());
        let b = InteractionInput::from("x").into_interaction(now());
        assert_ne!(a.id, b.id);
    }
}
