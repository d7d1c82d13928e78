use crate::context_window::ContextLine;
use crate::model::Ordinal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

pub const DEFAULT_USER_TEXT: &str = "Explain this line to me";

pub const DEFAULT_FOLLOW_UP_OPTIONS: [&str; 3] = [
    "Connect this to the scene",
    "What is the subtext?",
    "How might an actor deliver it?",
];

/// Shown when a failed request carries no message of its own.
pub const FALLBACK_ERROR_MESSAGE: &str = "Unable to fetch explanation.";

pub fn default_follow_ups() -> Vec<String> {
    DEFAULT_FOLLOW_UP_OPTIONS
        .iter()
        .map(|option| option.to_string())
        .collect()
}

/// Session id for a line: `playId:act:scene:lineGlobalIndex`.
pub fn chat_identifier(
    play_id: &str,
    act: Ordinal,
    scene: Ordinal,
    line_global_index: Ordinal,
) -> String {
    format!("{play_id}:{act}:{scene}:{line_global_index}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExplainChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    #[ts(type = "number")]
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Collapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum SessionVisibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum ExplainSortMode {
    #[default]
    Updated,
    Created,
    Play,
}

impl ExplainSortMode {
    pub const ALL: [ExplainSortMode; 3] = [
        ExplainSortMode::Updated,
        ExplainSortMode::Created,
        ExplainSortMode::Play,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExplainSortMode::Updated => "updated",
            ExplainSortMode::Created => "created",
            ExplainSortMode::Play => "play",
        }
    }

    /// Parse a stored preference; anything unrecognized reads as `Updated`.
    pub fn from_preference(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value.trim())
            .unwrap_or_default()
    }
}

impl fmt::Display for ExplainSortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat transcript anchored to one line of one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExplainChatSession {
    pub id: String,
    pub play_id: String,
    pub play_name: String,
    #[ts(type = "number")]
    pub act: Ordinal,
    #[ts(type = "number")]
    pub scene: Ordinal,
    #[ts(type = "number")]
    pub line_global_index: Ordinal,
    #[ts(type = "number")]
    pub line_sentence: Ordinal,
    pub speaker: String,
    pub line_text: String,
    pub context: Vec<ContextLine>,
    pub messages: Vec<ExplainChatMessage>,
    pub pending: bool,
    pub error: Option<String>,
    pub follow_ups: Vec<String>,
    pub status: SessionStatus,
    pub visibility: SessionVisibility,
    #[ts(type = "number")]
    pub created_at: u64,
    #[ts(type = "number")]
    pub updated_at: u64,
    pub has_history: bool,
    pub default_user_text: String,
}

impl ExplainChatSession {
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == SessionVisibility::Visible
    }

    pub fn is_anchored_in(&self, play_id: &str, act: Ordinal, scene: Ordinal) -> bool {
        self.play_id == play_id && self.act == act && self.scene == scene
    }
}

/// Everything needed to open (or reopen) a session on a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionArgs {
    pub play_id: String,
    pub play_name: String,
    #[ts(type = "number")]
    pub act: Ordinal,
    #[ts(type = "number")]
    pub scene: Ordinal,
    #[ts(type = "number")]
    pub line_global_index: Ordinal,
    #[ts(type = "number")]
    pub line_sentence: Ordinal,
    pub speaker: String,
    pub line_text: String,
    pub context: Vec<ContextLine>,
}

impl OpenSessionArgs {
    pub fn id(&self) -> String {
        chat_identifier(&self.play_id, self.act, self.scene, self.line_global_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: u32) -> Ordinal {
        Ordinal::from(value)
    }

    #[test]
    fn identifier_joins_key_fields() {
        assert_eq!(chat_identifier("hamlet", n(3), n(1), n(1742)), "hamlet:3:1:1742");
        let half = Ordinal::new(2.5).expect("finite");
        assert_eq!(chat_identifier("hamlet", half, n(1), n(0)), "hamlet:2.5:1:0");
    }

    #[test]
    fn unknown_sort_preference_reads_as_updated() {
        assert_eq!(ExplainSortMode::from_preference("play"), ExplainSortMode::Play);
        assert_eq!(ExplainSortMode::from_preference(" created "), ExplainSortMode::Created);
        assert_eq!(ExplainSortMode::from_preference("alphabetical"), ExplainSortMode::Updated);
        assert_eq!(ExplainSortMode::from_preference(""), ExplainSortMode::Updated);
    }

    #[test]
    fn enums_serialize_lowercase() {
        let json = serde_json::to_string(&(ChatRole::Assistant, SessionStatus::Collapsed))
            .expect("serialize enums");
        assert_eq!(json, r#"["assistant","collapsed"]"#);
    }
}
