use super::types::Message;

/// Coarse progress of an assistant turn before any text is visible.
///
/// Derived from the message every time it is needed; nothing stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Analyzing,
    Tools,
    Responding,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Analyzing => "Analyzing your request",
            Phase::Tools => "Running tools",
            Phase::Responding => "Generating response",
        }
    }
}

/// Phase to display for `msg`, or `None` once text is visible or the turn
/// has ended (the text itself is shown instead).
pub fn resolve_phase(msg: &Message) -> Option<Phase> {
    if msg.is_user() || !msg.streaming || !msg.content.is_empty() {
        return None;
    }
    Some(phase_of(&msg.tools, msg.contexts.len()))
}

fn phase_of(tools: &[String], context_count: usize) -> Phase {
    if tools.is_empty() {
        Phase::Analyzing
    } else if context_count == 0 {
        Phase::Tools
    } else {
        Phase::Responding
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLabel {
    pub label: String,
    pub icon: &'static str,
}

const TOOL_LABELS: &[(&str, &str, &str)] = &[
    ("search_tickets", "Searching tickets", "🔍"),
    ("search_knowledge_base", "Searching knowledge base", "📚"),
    ("get_ticket_statistics", "Pulling statistics", "📊"),
    ("check_ticket_status", "Checking ticket status", "🔎"),
];

const FALLBACK_ICON: &str = "⚙️";

pub fn tool_label(tool: &str) -> ToolLabel {
    TOOL_LABELS
        .iter()
        .find(|(id, _, _)| *id == tool)
        .map(|&(_, label, icon)| ToolLabel {
            label: label.to_string(),
            icon,
        })
        .unwrap_or_else(|| ToolLabel {
            label: humanize(tool),
            icon: FALLBACK_ICON,
        })
}

/// `check_ticket_status` → `check ticket status`.
pub fn humanize(tool: &str) -> String {
    tool.replace('_', " ")
}

/// "Used searching tickets, pulling statistics" line for a finished turn.
pub fn used_tools_summary(tools: &[String]) -> Option<String> {
    if tools.is_empty() {
        return None;
    }
    let names: Vec<String> = tools
        .iter()
        .map(|t| match TOOL_LABELS.iter().find(|(id, _, _)| *id == t.as_str()) {
            Some((_, label, _)) => label.to_lowercase(),
            None => humanize(t),
        })
        .collect();
    Some(format!("Used {}", names.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::ContextBlock;
    use serde_json::json;

    fn building(tools: &[&str], contexts: usize) -> Message {
        let mut msg = Message::assistant_placeholder();
        msg.tools = tools.iter().map(|t| t.to_string()).collect();
        msg.contexts = (0..contexts)
            .map(|_| ContextBlock {
                kind: "tickets".into(),
                data: json!([]),
            })
            .collect();
        msg
    }

    #[test]
    fn three_stage_precedence() {
        assert_eq!(resolve_phase(&building(&[], 0)), Some(Phase::Analyzing));
        assert_eq!(resolve_phase(&building(&["x"], 0)), Some(Phase::Tools));
        assert_eq!(resolve_phase(&building(&["x"], 1)), Some(Phase::Responding));
    }

    #[test]
    fn context_before_tools_still_reads_analyzing() {
        // Out-of-order arrival: the derivation just follows current data.
        let msg = building(&[], 2);
        assert_eq!(resolve_phase(&msg), Some(Phase::Analyzing));
        let mut msg = msg;
        msg.tools = vec!["search_tickets".into()];
        assert_eq!(resolve_phase(&msg), Some(Phase::Responding));
    }

    #[test]
    fn no_phase_once_text_visible_or_finished() {
        let mut msg = building(&["x"], 0);
        msg.content.push_str("Hi");
        assert_eq!(resolve_phase(&msg), None);

        let mut msg = building(&[], 0);
        msg.streaming = false;
        assert_eq!(resolve_phase(&msg), None);

        assert_eq!(resolve_phase(&Message::user("hello")), None);
    }

    #[test]
    fn tool_labels_fall_back_to_humanized_id() {
        assert_eq!(
            tool_label("search_tickets"),
            ToolLabel {
                label: "Searching tickets".into(),
                icon: "🔍"
            }
        );
        assert_eq!(
            tool_label("reset_mfa_device"),
            ToolLabel {
                label: "reset mfa device".into(),
                icon: FALLBACK_ICON
            }
        );
    }

    #[test]
    fn used_tools_summary_lowercases_known_labels() {
        let tools = vec!["get_ticket_statistics".to_string(), "lookup_asset".to_string()];
        assert_eq!(
            used_tools_summary(&tools).as_deref(),
            Some("Used pulling statistics, lookup asset")
        );
        assert_eq!(used_tools_summary(&[]), None);
    }
}
