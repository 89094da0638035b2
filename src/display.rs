//! Plain-text rendering of the conversation for a line-based terminal.
//!
//! Everything here is stateless except [`TurnPrinter`], which remembers
//! how much of an in-flight assistant message has already been written so
//! updates can be printed as deltas.

use crate::engine::phase::{tool_label, used_tools_summary};
use crate::engine::{resolve_phase, ContextBlock, Message, Phase, RoleContext};
use crate::tickets::{KbArticle, Ticket};
use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

pub const CARET: &str = "▌";

fn bold_re() -> &'static Regex {
    static BOLD_RE: OnceLock<Regex> = OnceLock::new();
    BOLD_RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern"))
}

/// Drop `**` markers, keeping the emphasized text.
pub fn plain_text(text: &str) -> String {
    bold_re().replace_all(text, "$1").into_owned()
}

pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}

pub fn welcome(role: RoleContext) -> Vec<String> {
    let (title, subtitle) = role.welcome();
    let mut lines = vec![
        format!("{} ({})", title, role.display_name()),
        subtitle.to_string(),
        String::new(),
    ];
    for (i, action) in role.quick_actions().iter().enumerate() {
        lines.push(format!("  /{}  {}: \"{}\"", i + 1, action.label, action.query));
    }
    lines
}

/// Thinking steps shown before the first token.
pub fn render_phase(phase: Phase, tools: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    let analyzing = if phase == Phase::Analyzing { "…" } else { "✓" };
    lines.push(format!("  {} {}", analyzing, Phase::Analyzing.label()));
    for tool in tools {
        let info = tool_label(tool);
        let mark = match phase {
            Phase::Tools => "…",
            Phase::Responding => "✓",
            Phase::Analyzing => "·",
        };
        lines.push(format!("  {} {} {}", mark, info.icon, info.label));
    }
    if phase == Phase::Responding {
        lines.push(format!("  … {}", Phase::Responding.label()));
    }
    lines
}

pub fn render_context(block: &ContextBlock) -> Vec<String> {
    match block.kind.as_str() {
        "tickets" => render_ticket_table(&block.data),
        "ticket_status" => render_ticket_status(&block.data),
        "stats" => render_stats(&block.data),
        "kb_articles" | "resolution" => render_articles(&block.data),
        _ => Vec::new(),
    }
}

fn render_ticket_table(data: &JsonValue) -> Vec<String> {
    let tickets: Vec<Ticket> = serde_json::from_value(data.clone()).unwrap_or_default();
    ticket_table(&tickets)
}

pub fn ticket_table(tickets: &[Ticket]) -> Vec<String> {
    if tickets.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!(
        "  {:<11} {:<44} {:<4} {:<12} {:<18} {}",
        "Number", "Short description", "Pri", "State", "Assigned to", "Updated"
    )];
    for t in tickets {
        lines.push(format!(
            "  {:<11} {:<44} {:<4} {:<12} {:<18} {}",
            t.id,
            truncate(&t.subject, 44),
            t.priority,
            t.status,
            truncate(&t.assigned, 18),
            t.updated
        ));
    }
    lines
}

fn render_ticket_status(data: &JsonValue) -> Vec<String> {
    match serde_json::from_value::<Ticket>(data.clone()) {
        Ok(t) => ticket_card(&t),
        Err(_) => Vec::new(),
    }
}

pub fn ticket_card(t: &Ticket) -> Vec<String> {
    let mut lines = vec![
        format!("  {} [{}]", t.id, t.status),
        format!("  {}", t.subject),
        format!(
            "  Priority: {}  Assigned: {}  Updated: {}",
            t.priority, t.assigned, t.updated
        ),
    ];
    if let Some(resolution) = t.resolution.as_deref().filter(|r| !r.is_empty()) {
        lines.push(format!("  Resolution: {}", resolution));
    }
    lines
}

pub fn render_stats(data: &JsonValue) -> Vec<String> {
    let field = |key: &str| match data.get(key) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => "0".to_string(),
        Some(other) => other.to_string(),
    };
    vec![format!(
        "  Open: {}  P1 critical: {}  P2 high: {}  Week over week: {}",
        field("total_open"),
        field("p1_count"),
        field("p2_count"),
        field("trend")
    )]
}

fn render_articles(data: &JsonValue) -> Vec<String> {
    let articles: Vec<KbArticle> = match data {
        JsonValue::Array(_) => serde_json::from_value(data.clone()).unwrap_or_default(),
        JsonValue::Object(_) => serde_json::from_value(data.clone())
            .map(|a| vec![a])
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    let mut lines = Vec::new();
    for kb in &articles {
        lines.push(format!("  {}  {}", kb.id, kb.title));
        if !kb.excerpt.is_empty() {
            lines.push(format!("    {}", kb.excerpt));
        }
        if !kb.steps.is_empty() {
            lines.push("    Resolution Steps:".to_string());
            for (i, step) in kb.steps.iter().enumerate() {
                lines.push(format!("      {}. {}", i + 1, step));
            }
        }
    }
    lines
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn footer(msg: &Message) -> Vec<String> {
    let mut lines = Vec::new();
    if msg.show_escalate {
        lines.push("  Didn't solve your issue? Type /escalate to create a support ticket.".to_string());
    }
    if msg.show_ticket_form {
        lines.push("  Type /ticket to fill out the support ticket form.".to_string());
    }
    lines
}

/// Full rendering of a message that is not being streamed right now.
pub fn render_message(msg: &Message) -> Vec<String> {
    let time = format_time(&msg.timestamp);
    if msg.is_user() {
        return vec![format!("you [{}] › {}", time, msg.content)];
    }
    let mut lines = vec![format!("desk [{}]", time)];
    if let Some(phase) = resolve_phase(msg) {
        lines.extend(render_phase(phase, &msg.tools));
    }
    if !msg.streaming {
        if let Some(summary) = used_tools_summary(&msg.tools) {
            lines.push(format!("  ({})", summary));
        }
    }
    for block in &msg.contexts {
        lines.extend(render_context(block));
    }
    if !msg.content.is_empty() {
        let caret = if msg.streaming { CARET } else { "" };
        lines.push(format!("  {}{}", plain_text(&msg.content), caret));
    }
    lines.extend(footer(msg));
    lines
}

/// Longest prefix of streaming `content` whose bold markers are all
/// closed. An opening `**` (or a lone trailing `*`) is held back until
/// the rest of the pair arrives; finished content is returned whole.
fn settled_prefix(content: &str, streaming: bool) -> &str {
    if !streaming {
        return content;
    }
    let mut end = content.len();
    if content.matches("**").count() % 2 == 1 {
        end = content.rfind("**").unwrap_or(end);
    }
    let settled = &content[..end];
    settled.strip_suffix('*').unwrap_or(settled)
}

/// Prints an assistant message incrementally while it streams.
#[derive(Debug, Default)]
pub struct TurnPrinter {
    header_done: bool,
    last_phase: Option<Phase>,
    tools_shown: usize,
    contexts_shown: usize,
    /// Plain text already written for the message content.
    text_shown: String,
    finished: bool,
}

impl TurnPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to write for whatever changed since the previous call.
    pub fn update(&mut self, msg: &Message) -> String {
        if self.finished {
            return String::new();
        }
        let mut out = String::new();
        if !self.header_done {
            out.push_str(&format!("desk [{}]\n", format_time(&msg.timestamp)));
            self.header_done = true;
        }

        if let Some(phase) = resolve_phase(msg) {
            if self.last_phase != Some(phase) || msg.tools.len() != self.tools_shown {
                let step = match phase {
                    Phase::Analyzing => format!("  … {}\n", phase.label()),
                    Phase::Tools => msg
                        .tools
                        .iter()
                        .map(|t| {
                            let info = tool_label(t);
                            format!("  … {} {}\n", info.icon, info.label)
                        })
                        .collect(),
                    Phase::Responding => format!("  … {}\n", phase.label()),
                };
                out.push_str(&step);
                self.last_phase = Some(phase);
                self.tools_shown = msg.tools.len();
            }
        }

        for block in &msg.contexts[self.contexts_shown.min(msg.contexts.len())..] {
            for line in render_context(block) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        self.contexts_shown = msg.contexts.len();

        let text = plain_text(settled_prefix(&msg.content, msg.streaming));
        if text != self.text_shown {
            match text.strip_prefix(self.text_shown.as_str()) {
                Some(delta) => {
                    if self.text_shown.is_empty() {
                        out.push_str("  ");
                    }
                    out.push_str(delta);
                }
                // Content was replaced (connection failure notice).
                None => out.push_str(&format!("\n  {}", text)),
            }
            self.text_shown = text;
        }

        if !msg.streaming {
            self.finished = true;
            if !self.text_shown.is_empty() {
                out.push('\n');
            }
            if let Some(summary) = used_tools_summary(&msg.tools) {
                out.push_str(&format!("  ({})\n", summary));
            }
            for line in footer(msg) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}
