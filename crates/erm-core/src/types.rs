use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Grouping key used when a record carries neither a user id nor a name.
pub const UNKNOWN_USER: &str = "Unknown";

/// What an activity was about. Tags outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Risk,
    Control,
    Report,
    User,
    Ai,
    Auth,
    Unrecognized(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Risk => "risk",
            Self::Control => "control",
            Self::Report => "report",
            Self::User => "user",
            Self::Ai => "ai",
            Self::Auth => "auth",
            Self::Unrecognized(other) => other,
        }
    }
}

impl Default for ActivityKind {
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl From<String> for ActivityKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "risk" => Self::Risk,
            "control" => Self::Control,
            "report" => Self::Report,
            "user" => Self::User,
            "ai" => Self::Ai,
            "auth" => Self::Auth,
            _ => Self::Unrecognized(tag),
        }
    }
}

impl From<&str> for ActivityKind {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Unrecognized(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was done. Tags outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    Exported,
    Login,
    AiCall,
    Unrecognized(String),
}

impl ActivityAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Exported => "exported",
            Self::Login => "login",
            Self::AiCall => "ai_call",
            Self::Unrecognized(other) => other,
        }
    }
}

impl Default for ActivityAction {
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl From<String> for ActivityAction {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "created" => Self::Created,
            "updated" => Self::Updated,
            "deleted" => Self::Deleted,
            "exported" => Self::Exported,
            "login" => Self::Login,
            "ai_call" => Self::AiCall,
            _ => Self::Unrecognized(tag),
        }
    }
}

impl From<&str> for ActivityAction {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<ActivityAction> for String {
    fn from(action: ActivityAction) -> Self {
        match action {
            ActivityAction::Unrecognized(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only activity log.
///
/// The display name (`user`, else `userName`) is the grouping key for sessions
/// and engagement unless the record also carries a `userId`. Two people
/// sharing a display name and no id are counted as one user.
///
/// Scalar fields are read leniently: numbers become their decimal text and
/// values of any other shape read as absent, so only the timestamp decides
/// whether a record takes part in analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Opaque identifier; may be a string or a number in stored logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "type", default, deserialize_with = "lenient_tag")]
    pub kind: ActivityKind,
    #[serde(default, deserialize_with = "lenient_tag")]
    pub action: ActivityAction,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Raw ISO-8601 instant as stored.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// Fields this crate does not interpret, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActivityRecord {
    pub fn new(
        kind: impl Into<ActivityKind>,
        action: impl Into<ActivityAction>,
        user: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(Value::String(Uuid::new_v4().to_string())),
            kind: kind.into(),
            action: action.into(),
            user: Some(user.into()),
            user_name: None,
            user_id: None,
            timestamp: Some(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            workspace_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The timestamp as an instant, or `None` when absent or unparseable.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_instant)
    }

    /// Key that groups records by person: the user id if present, else the name.
    pub fn identity(&self) -> &str {
        self.user_id
            .as_deref()
            .or_else(|| self.name())
            .unwrap_or(UNKNOWN_USER)
    }

    /// Name shown for the acting user.
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or(UNKNOWN_USER)
    }

    fn name(&self) -> Option<&str> {
        self.user.as_deref().or(self.user_name.as_deref())
    }
}

/// Strings as-is, numbers and booleans as text, anything else as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_tag<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    Ok(T::from(lenient_string(deserializer)?.unwrap_or_default()))
}

/// Parse an RFC 3339 instant; offset-less date-times are read as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_reads_source_field_names() {
        let record: ActivityRecord = serde_json::from_value(json!({
            "id": 1704099600000u64,
            "type": "risk",
            "action": "created",
            "userName": "Amy",
            "timestamp": "2024-01-01T09:00:00Z",
            "workspaceId": "ws-1",
            "details": "Added supplier risk"
        }))
        .unwrap();

        assert_eq!(record.kind, ActivityKind::Risk);
        assert_eq!(record.action, ActivityAction::Created);
        assert_eq!(record.user_name.as_deref(), Some("Amy"));
        assert_eq!(record.display_name(), "Amy");
        assert_eq!(record.workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(record.extra["details"], "Added supplier risk");
    }

    #[test]
    fn test_unrecognized_tags_are_preserved() {
        let record: ActivityRecord = serde_json::from_value(json!({
            "type": "incident",
            "action": "escalated",
            "user": "Amy",
            "timestamp": "2024-01-01T09:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.kind, ActivityKind::Unrecognized("incident".into()));
        assert_eq!(record.action, ActivityAction::Unrecognized("escalated".into()));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["type"], "incident");
        assert_eq!(back["action"], "escalated");
    }

    #[test]
    fn test_missing_fields_default() {
        let record: ActivityRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(record.kind, ActivityKind::default());
        assert!(record.parsed_timestamp().is_none());
        assert_eq!(record.identity(), UNKNOWN_USER);
    }

    #[test]
    fn test_user_and_user_name_together() {
        let record: ActivityRecord = serde_json::from_value(json!({
            "type": "risk",
            "user": "Amy",
            "userName": "Amy L.",
            "timestamp": "2024-01-01T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.display_name(), "Amy");
        assert_eq!(record.identity(), "Amy");

        let only_name: ActivityRecord =
            serde_json::from_value(json!({"userName": "Beth"})).unwrap();
        assert_eq!(only_name.display_name(), "Beth");
        assert_eq!(only_name.identity(), "Beth");
    }

    #[test]
    fn test_numeric_ids_read_as_text() {
        let record: ActivityRecord = serde_json::from_value(json!({
            "type": "control",
            "user": "Cal",
            "userId": 42,
            "workspaceId": 17,
            "timestamp": "2024-01-01T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.user_id.as_deref(), Some("42"));
        assert_eq!(record.workspace_id.as_deref(), Some("17"));
        assert_eq!(record.identity(), "42");
        assert_eq!(record.display_name(), "Cal");
    }

    #[test]
    fn test_odd_shaped_fields_read_as_absent() {
        let record: ActivityRecord = serde_json::from_value(json!({
            "type": 7,
            "action": null,
            "user": {"name": "Dee"},
            "workspaceId": ["ws-1"],
            "timestamp": "2024-01-01T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.kind, ActivityKind::Unrecognized("7".into()));
        assert_eq!(record.action, ActivityAction::default());
        assert_eq!(record.identity(), UNKNOWN_USER);
        assert!(record.workspace_id.is_none());
        assert!(record.parsed_timestamp().is_some());
    }

    #[test]
    fn test_identity_prefers_user_id() {
        let at = parse_instant("2024-01-01T09:00:00Z").unwrap();
        let record = ActivityRecord::new("risk", "created", "Amy", at).with_user_id("u-42");
        assert_eq!(record.identity(), "u-42");
        assert_eq!(record.display_name(), "Amy");
    }

    #[test]
    fn test_parse_instant_variants() {
        let utc = parse_instant("2024-03-09T23:59:59Z").unwrap();
        let offset = parse_instant("2024-03-10T01:59:59+02:00").unwrap();
        let naive = parse_instant("2024-03-09T23:59:59.000").unwrap();
        assert_eq!(utc, offset);
        assert_eq!(utc, naive);
        assert!(parse_instant("yesterday").is_none());
        assert!(parse_instant("").is_none());
    }

    #[test]
    fn test_new_record_timestamp_round_trips() {
        let at = parse_instant("2024-01-01T09:10:05Z").unwrap();
        let record = ActivityRecord::new("report", "exported", "Beth", at).with_workspace("ws-2");
        assert_eq!(record.parsed_timestamp(), Some(at));
        assert_eq!(record.workspace_id.as_deref(), Some("ws-2"));
    }
}
