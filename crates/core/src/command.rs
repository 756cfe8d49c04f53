use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::action::ActionRecord;
use crate::error::Error;

/// Raw wire shape carried over the pub/sub channel: `{command, data}`.
///
/// Envelopes stay untyped until each client parses them, so one client's
/// malformed payload never takes down another client's subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Event name the master emits on for a module namespace.
pub fn master_event(module: &str) -> String {
    format!("{module}.master:command")
}

/// Event name every client of a module namespace subscribes to.
pub fn client_event(module: &str) -> String {
    format!("{module}:command")
}

/// The closed command set understood by every client.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Navigate the local page to a URL after a jittered delay.
    OpenPage { url: String },
    /// Reload the local page after a jittered delay.
    ReloadPage,
    /// Fill every text/password input and textarea on the page.
    GlobalControl { value: Option<String> },
    /// Click the first element matching a CSS selector.
    ButtonClick { selector: String },
    /// Replay a captured master action (followers only).
    ReplicateAction(ActionRecord),
    /// Update the session-wide replay delay bound, in milliseconds.
    SetMaxDelay { max_delay_ms: u64 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::OpenPage { .. } => "browser:openPage",
            Command::ReloadPage => "browser:reloadPage",
            Command::GlobalControl { .. } => "global:control",
            Command::ButtonClick { .. } => "button:click",
            Command::ReplicateAction(_) => "replicateAction",
            Command::SetMaxDelay { .. } => "setMaxDelay",
        }
    }

    pub fn into_envelope(self) -> CommandEnvelope {
        let command = self.name().to_string();
        let data = match self {
            Command::OpenPage { url } => json!({ "payload": url }),
            Command::ReloadPage => json!({}),
            Command::GlobalControl { value } => match value {
                Some(v) => Value::String(v),
                None => Value::Null,
            },
            Command::ButtonClick { selector } => Value::String(selector),
            Command::ReplicateAction(record) => {
                serde_json::to_value(record).unwrap_or(Value::Null)
            }
            Command::SetMaxDelay { max_delay_ms } => json!(max_delay_ms),
        };
        CommandEnvelope { command, data }
    }
}

impl TryFrom<CommandEnvelope> for Command {
    type Error = Error;

    fn try_from(env: CommandEnvelope) -> Result<Self, Error> {
        match env.command.as_str() {
            "browser:openPage" => {
                let url = env
                    .data
                    .get("payload")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::MalformedCommand("browser:openPage missing payload url".to_string())
                    })?;
                Ok(Command::OpenPage {
                    url: url.to_string(),
                })
            }
            "browser:reloadPage" => Ok(Command::ReloadPage),
            "global:control" => Ok(Command::GlobalControl {
                value: env.data.as_str().map(str::to_string),
            }),
            "button:click" => {
                let selector = env.data.as_str().ok_or_else(|| {
                    Error::MalformedCommand("button:click payload must be a selector".to_string())
                })?;
                Ok(Command::ButtonClick {
                    selector: selector.to_string(),
                })
            }
            "replicateAction" => {
                let record: ActionRecord = serde_json::from_value(env.data).map_err(|e| {
                    Error::MalformedCommand(format!("replicateAction payload invalid: {e}"))
                })?;
                Ok(Command::ReplicateAction(record))
            }
            "setMaxDelay" => {
                let ms = env.data.as_u64().filter(|ms| *ms > 0).ok_or_else(|| {
                    Error::MalformedCommand(
                        "setMaxDelay payload must be a positive integer".to_string(),
                    )
                })?;
                Ok(Command::SetMaxDelay { max_delay_ms: ms })
            }
            other => Err(Error::MalformedCommand(format!(
                "unknown command: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    #[test]
    fn test_envelope_round_trip() {
        let commands = vec![
            Command::OpenPage {
                url: "https://example.com/login".to_string(),
            },
            Command::ReloadPage,
            Command::GlobalControl {
                value: Some("demo".to_string()),
            },
            Command::GlobalControl { value: None },
            Command::ButtonClick {
                selector: "button.submit".to_string(),
            },
            Command::ReplicateAction(ActionRecord {
                tag_name: "INPUT".to_string(),
                kind: ActionKind::Change,
                value: Some("abc".to_string()),
                target_path: "/html/body/form/input".to_string(),
            }),
            Command::SetMaxDelay { max_delay_ms: 500 },
        ];
        for cmd in commands {
            let env = cmd.clone().into_envelope();
            let wire = serde_json::to_string(&env).unwrap();
            let back: CommandEnvelope = serde_json::from_str(&wire).unwrap();
            assert_eq!(Command::try_from(back).unwrap(), cmd);
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        let env = CommandEnvelope {
            command: "browser:closeTab".to_string(),
            data: Value::Null,
        };
        assert!(matches!(
            Command::try_from(env),
            Err(Error::MalformedCommand(_))
        ));
    }

    #[test]
    fn test_replicate_action_requires_payload() {
        let env = CommandEnvelope {
            command: "replicateAction".to_string(),
            data: Value::Null,
        };
        assert!(matches!(
            Command::try_from(env),
            Err(Error::MalformedCommand(_))
        ));
    }

    #[test]
    fn test_set_max_delay_must_be_positive() {
        for data in [json!(0), json!(-5), json!("fast")] {
            let env = CommandEnvelope {
                command: "setMaxDelay".to_string(),
                data,
            };
            assert!(Command::try_from(env).is_err());
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(master_event("TOOLS"), "TOOLS.master:command");
        assert_eq!(client_event("TOOLS"), "TOOLS:command");
    }
}
