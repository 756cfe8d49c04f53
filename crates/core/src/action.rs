use serde::{Deserialize, Serialize};

/// Kind of user action captured on the master and replayed on followers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Input,
    Change,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Input => "input",
            ActionKind::Change => "change",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "click" => Some(ActionKind::Click),
            "input" => Some(ActionKind::Input),
            "change" => Some(ActionKind::Change),
            _ => None,
        }
    }

    /// `input` and `change` replay identically: write the value, then
    /// dispatch a bubbling synthetic event of the recorded kind.
    pub fn is_value_mutation(&self) -> bool {
        !matches!(self, ActionKind::Click)
    }
}

/// One captured action, addressed by a structural path into the document.
///
/// `targetPath` must resolve to exactly one element on the replaying client;
/// when it does not (DOM drift between master and follower) the record is
/// dropped, never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub tag_name: String,
    #[serde(rename = "action")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub target_path: String,
}

impl ActionRecord {
    pub fn click(tag_name: &str, target_path: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            kind: ActionKind::Click,
            value: None,
            target_path: target_path.to_string(),
        }
    }
}
