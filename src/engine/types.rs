use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Conversation data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Which audience the conversation is scoped to. Sent with every chat
/// request as `"user"` or `"admin"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleContext {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Copy)]
pub struct QuickAction {
    pub label: &'static str,
    pub query: &'static str,
}

const USER_QUICK_ACTIONS: [QuickAction; 4] = [
    QuickAction {
        label: "Password reset",
        query: "How do I reset my password?",
    },
    QuickAction {
        label: "VPN issues",
        query: "VPN not connecting",
    },
    QuickAction {
        label: "Email sync",
        query: "Email not syncing on my phone",
    },
    QuickAction {
        label: "Create ticket",
        query: "I need to create a support ticket",
    },
];

const ADMIN_QUICK_ACTIONS: [QuickAction; 4] = [
    QuickAction {
        label: "Open incidents",
        query: "Show all open incidents",
    },
    QuickAction {
        label: "P1 tickets",
        query: "What P1 tickets need attention?",
    },
    QuickAction {
        label: "Dashboard",
        query: "Show me the current ticket stats",
    },
    QuickAction {
        label: "Escalations",
        query: "Any escalated tickets?",
    },
];

impl RoleContext {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleContext::User => "user",
            RoleContext::Admin => "admin",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RoleContext::User => "End User",
            RoleContext::Admin => "Administrator",
        }
    }

    pub fn quick_actions(self) -> &'static [QuickAction] {
        match self {
            RoleContext::User => &USER_QUICK_ACTIONS,
            RoleContext::Admin => &ADMIN_QUICK_ACTIONS,
        }
    }

    pub fn welcome(self) -> (&'static str, &'static str) {
        match self {
            RoleContext::User => (
                "How can I help?",
                "Describe your issue and I'll find a solution or create a ticket for you.",
            ),
            RoleContext::Admin => (
                "Admin Console",
                "Search tickets, view metrics, and manage escalations with AI assistance.",
            ),
        }
    }
}

impl std::str::FromStr for RoleContext {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "end-user" | "enduser" => Ok(RoleContext::User),
            "admin" | "administrator" => Ok(RoleContext::Admin),
            other => anyhow::bail!("unknown role '{}' (expected 'user' or 'admin')", other),
        }
    }
}

impl std::fmt::Display for RoleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured side-data attached to an assistant turn (ticket lists,
/// single-ticket status, statistics, knowledge-base articles).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: JsonValue,
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub tools: Vec<String>,
    pub contexts: Vec<ContextBlock>,
    pub show_escalate: bool,
    pub show_ticket_form: bool,
    pub streaming: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, content: String, streaming: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            tools: Vec::new(),
            contexts: Vec::new(),
            show_escalate: false,
            show_ticket_form: false,
            streaming,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into(), false)
    }

    /// Empty assistant turn waiting for stream events.
    pub fn assistant_placeholder() -> Self {
        Self::new(MessageRole::Assistant, String::new(), true)
    }

    /// Assistant turn that is complete on creation (escalation prompts,
    /// ticket confirmations, notices).
    pub fn assistant_note(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), false)
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub role: RoleContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_starts_streaming_and_empty() {
        let msg = Message::assistant_placeholder();
        assert!(msg.streaming);
        assert!(msg.content.is_empty());
        assert!(msg.tools.is_empty());
        assert!(msg.contexts.is_empty());
        assert!(!msg.show_escalate && !msg.show_ticket_form);
    }

    #[test]
    fn message_ids_are_unique() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn role_parses_and_serializes() {
        assert_eq!("Admin".parse::<RoleContext>().unwrap(), RoleContext::Admin);
        assert_eq!(" user ".parse::<RoleContext>().unwrap(), RoleContext::User);
        assert!("root".parse::<RoleContext>().is_err());

        let req = ChatRequest {
            message: "VPN not connecting".into(),
            role: RoleContext::Admin,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"message": "VPN not connecting", "role": "admin"}));
    }

    #[test]
    fn quick_actions_differ_per_role() {
        let user: Vec<&str> = RoleContext::User.quick_actions().iter().map(|a| a.label).collect();
        let admin: Vec<&str> = RoleContext::Admin.quick_actions().iter().map(|a| a.label).collect();
        assert_eq!(user.len(), 4);
        assert_eq!(admin.len(), 4);
        assert!(user.contains(&"Password reset"));
        assert!(admin.contains(&"Escalations"));
    }
}
