use super::protocol::{ActionKind, StreamEvent};
use super::types::{ContextBlock, Message};

/// Apply one stream event to the assistant message being built.
///
/// Content and context blocks only grow, flags only go false → true, and
/// a message that has stopped streaming is returned untouched.
pub fn reduce(mut state: Message, event: &StreamEvent) -> Message {
    if !state.streaming {
        return state;
    }
    match event {
        StreamEvent::Tools { tools } => {
            state.tools = tools.clone();
        }
        StreamEvent::Context { context_type, data } => {
            state.contexts.push(ContextBlock {
                kind: context_type.clone(),
                data: data.clone(),
            });
        }
        StreamEvent::Token { content } => {
            state.content.push_str(content);
        }
        StreamEvent::Action { action } => match action {
            ActionKind::ShowEscalateOption => state.show_escalate = true,
            ActionKind::ShowTicketForm => state.show_ticket_form = true,
            ActionKind::Other(_) => {}
        },
        StreamEvent::Done => {
            state.streaming = false;
        }
        StreamEvent::Unknown => {}
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(events: &[StreamEvent]) -> Message {
        events
            .iter()
            .fold(Message::assistant_placeholder(), |msg, ev| reduce(msg, ev))
    }

    fn token(s: &str) -> StreamEvent {
        StreamEvent::Token { content: s.into() }
    }

    #[test]
    fn search_turn_reduces_to_expected_state() {
        let tickets = json!([{"id": "INC0012847", "priority": "P1", "status": "In Progress"}]);
        let msg = run(&[
            StreamEvent::Tools {
                tools: vec!["search_tickets".into()],
            },
            StreamEvent::Context {
                context_type: "tickets".into(),
                data: tickets.clone(),
            },
            token("Here"),
            token(" are"),
            StreamEvent::Done,
        ]);
        assert_eq!(msg.tools, vec!["search_tickets"]);
        assert_eq!(
            msg.contexts,
            vec![ContextBlock {
                kind: "tickets".into(),
                data: tickets,
            }]
        );
        assert_eq!(msg.content, "Here are");
        assert!(!msg.streaming);
    }

    #[test]
    fn tools_replace_and_contexts_append() {
        let msg = run(&[
            StreamEvent::Tools {
                tools: vec!["search_tickets".into()],
            },
            StreamEvent::Context {
                context_type: "stats".into(),
                data: json!({"total_open": 3}),
            },
            StreamEvent::Tools {
                tools: vec!["search_knowledge_base".into(), "get_ticket_statistics".into()],
            },
            StreamEvent::Context {
                context_type: "kb_articles".into(),
                data: json!([]),
            },
        ]);
        assert_eq!(msg.tools, vec!["search_knowledge_base", "get_ticket_statistics"]);
        let kinds: Vec<&str> = msg.contexts.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["stats", "kb_articles"]);
        assert!(msg.streaming);
    }

    #[test]
    fn actions_set_flags_and_unknown_actions_are_ignored() {
        let msg = run(&[
            StreamEvent::Action {
                action: ActionKind::Other("confetti".into()),
            },
            StreamEvent::Action {
                action: ActionKind::ShowEscalateOption,
            },
        ]);
        assert!(msg.show_escalate);
        assert!(!msg.show_ticket_form);

        let msg = reduce(
            msg,
            &StreamEvent::Action {
                action: ActionKind::ShowTicketForm,
            },
        );
        assert!(msg.show_escalate && msg.show_ticket_form);
    }

    #[test]
    fn content_never_shrinks() {
        let events = vec![
            token("Res"),
            StreamEvent::Tools { tools: vec![] },
            token(""),
            StreamEvent::Unknown,
            token("et your password"),
            StreamEvent::Done,
            token(" (late)"),
        ];
        let mut msg = Message::assistant_placeholder();
        let mut last_len = 0;
        for ev in &events {
            msg = reduce(msg, ev);
            assert!(msg.content.len() >= last_len);
            last_len = msg.content.len();
        }
        assert_eq!(msg.content, "Reset your password");
    }

    #[test]
    fn terminal_state_is_frozen() {
        let done = run(&[token("final"), StreamEvent::Done]);
        let after = [
            token(" more"),
            StreamEvent::Tools {
                tools: vec!["x".into()],
            },
            StreamEvent::Action {
                action: ActionKind::ShowTicketForm,
            },
        ]
        .iter()
        .fold(done.clone(), |msg, ev| reduce(msg, ev));
        assert_eq!(after, done);
        assert!(!after.streaming);
    }
}
