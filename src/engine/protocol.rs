//! Wire format of the chat stream.
//!
//! The backend answers `POST /chat` with `text/event-stream` lines of the
//! form `data: {"type": "...", ...}`. Every other line (comments, blank
//! separators, `event:` fields) is ignored. One payload never spans lines.

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Marker every event line starts with.
pub const EVENT_PREFIX: &str = "data:";

/// One discrete unit of the streaming protocol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Backend capabilities invoked for this turn. Replaces any earlier list.
    Tools { tools: Vec<String> },
    Context {
        context_type: String,
        #[serde(default)]
        data: JsonValue,
    },
    Token { content: String },
    Action { action: ActionKind },
    Done,
    /// Any `type` this client does not know. Kept so newer backends do not
    /// break older clients.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ActionKind {
    ShowEscalateOption,
    ShowTicketForm,
    Other(String),
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "show_escalate_option" => ActionKind::ShowEscalateOption,
            "show_ticket_form" => ActionKind::ShowTicketForm,
            _ => ActionKind::Other(value),
        }
    }
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Tools { .. } => "tools",
            StreamEvent::Context { .. } => "context",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Action { .. } => "action",
            StreamEvent::Done => "done",
            StreamEvent::Unknown => "unknown",
        }
    }
}

/// Parse one complete line.
///
/// Returns `None` for lines that are not event lines, `Some(Err)` for event
/// lines whose payload does not decode.
pub fn parse_event_line(line: &str) -> Option<Result<StreamEvent, serde_json::Error>> {
    let payload = line.strip_prefix(EVENT_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    Some(serde_json::from_str(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(line: &str) -> StreamEvent {
        parse_event_line(line)
            .expect("event line")
            .expect("valid payload")
    }

    #[test]
    fn parses_every_event_type() {
        assert_eq!(
            parse(r#"data: {"type": "tools", "tools": ["search_tickets"]}"#),
            StreamEvent::Tools {
                tools: vec!["search_tickets".into()]
            }
        );
        assert_eq!(
            parse(r#"data: {"type": "context", "context_type": "stats", "data": {"total_open": 7}}"#),
            StreamEvent::Context {
                context_type: "stats".into(),
                data: json!({"total_open": 7}),
            }
        );
        assert_eq!(
            parse(r#"data: {"type": "token", "content": "Here "}"#),
            StreamEvent::Token {
                content: "Here ".into()
            }
        );
        assert_eq!(
            parse(r#"data: {"type": "action", "action": "show_ticket_form"}"#),
            StreamEvent::Action {
                action: ActionKind::ShowTicketForm
            }
        );
        assert_eq!(parse(r#"data: {"type": "done"}"#), StreamEvent::Done);
    }

    #[test]
    fn unknown_action_and_type_are_tolerated() {
        assert_eq!(
            parse(r#"data: {"type": "action", "action": "open_chat_widget"}"#),
            StreamEvent::Action {
                action: ActionKind::Other("open_chat_widget".into())
            }
        );
        assert_eq!(
            parse(r#"data: {"type": "usage", "tokens": 12}"#),
            StreamEvent::Unknown
        );
    }

    #[test]
    fn non_event_lines_are_ignored() {
        assert!(parse_event_line("").is_none());
        assert!(parse_event_line(": keep-alive").is_none());
        assert!(parse_event_line("event: message").is_none());
        assert!(parse_event_line("data:").is_none());
    }

    #[test]
    fn malformed_payload_is_an_error_not_a_skip() {
        assert!(matches!(parse_event_line("data: {not json"), Some(Err(_))));
        // Known type with a missing required field.
        assert!(matches!(
            parse_event_line(r#"data: {"type": "token"}"#),
            Some(Err(_))
        ));
    }
}
