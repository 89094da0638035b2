use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::OnceLock;

const SUBJECT_LEN: (usize, usize) = (5, 200);
const DESCRIPTION_LEN: (usize, usize) = (10, 2000);
const REASON_LEN: (usize, usize) = (10, 500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    #[default]
    P3,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::P1 => "P1 - High (Business Critical)",
            Priority::P2 => "P2 - Medium",
            Priority::P3 => "P3 - Low",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "P1" | "1" => Ok(Priority::P1),
            "P2" | "2" => Ok(Priority::P2),
            "P3" | "3" | "" => Ok(Priority::P3),
            other => anyhow::bail!("unknown priority '{}' (expected P1, P2 or P3)", other),
        }
    }
}

/// Body of `POST /tickets`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketDraft {
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub requester_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketFieldError {
    Subject { len: usize },
    Description { len: usize },
    Email(String),
    Reason { len: usize },
}

impl fmt::Display for TicketFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketFieldError::Subject { len } => write!(
                f,
                "subject must be {}-{} characters (got {})",
                SUBJECT_LEN.0, SUBJECT_LEN.1, len
            ),
            TicketFieldError::Description { len } => write!(
                f,
                "description must be {}-{} characters (got {})",
                DESCRIPTION_LEN.0, DESCRIPTION_LEN.1, len
            ),
            TicketFieldError::Email(email) => {
                write!(f, "'{}' is not a valid email address", email)
            }
            TicketFieldError::Reason { len } => write!(
                f,
                "escalation reason must be {}-{} characters (got {})",
                REASON_LEN.0, REASON_LEN.1, len
            ),
        }
    }
}

impl std::error::Error for TicketFieldError {}

fn email_re() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("email pattern"))
}

fn check_len(value: &str, (min, max): (usize, usize)) -> Result<(), usize> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        Err(len)
    } else {
        Ok(())
    }
}

pub fn validate_email(email: &str) -> Result<(), TicketFieldError> {
    if email_re().is_match(email.trim()) {
        Ok(())
    } else {
        Err(TicketFieldError::Email(email.trim().to_string()))
    }
}

impl TicketDraft {
    pub fn validate(&self) -> Result<(), TicketFieldError> {
        validate_email(&self.requester_email)?;
        check_len(&self.subject, SUBJECT_LEN).map_err(|len| TicketFieldError::Subject { len })?;
        check_len(&self.description, DESCRIPTION_LEN)
            .map_err(|len| TicketFieldError::Description { len })?;
        Ok(())
    }

    /// Copy with surrounding whitespace removed from every text field.
    pub fn trimmed(&self) -> Self {
        Self {
            subject: self.subject.trim().to_string(),
            description: self.description.trim().to_string(),
            priority: self.priority,
            requester_email: self.requester_email.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    #[serde(default, alias = "short_desc")]
    pub subject: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub assigned: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub requester: String,
    #[serde(default)]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbArticle {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Response of `POST /tickets`.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketCreated {
    pub ticket: Ticket,
    /// Knowledge-base article the backend thinks may already fix the issue.
    #[serde(default)]
    pub suggested_resolution: Option<JsonValue>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /escalate`.
#[derive(Debug, Clone, Serialize)]
pub struct EscalationRequest {
    pub ticket_id: String,
    pub reason: String,
}

impl EscalationRequest {
    pub fn validate(&self) -> Result<(), TicketFieldError> {
        check_len(&self.reason, REASON_LEN).map_err(|len| TicketFieldError::Reason { len })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Escalation {
    pub id: String,
    pub ticket_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EscalationCreated {
    pub escalation: Escalation,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> TicketDraft {
        TicketDraft {
            subject: "VPN drops every hour".into(),
            description: "Cisco AnyConnect disconnects roughly every 60 minutes.".into(),
            priority: Priority::P2,
            requester_email: "jane.doe@company.com".into(),
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert_eq!(draft().validate(), Ok(()));
    }

    #[test]
    fn field_limits_are_enforced() {
        let mut d = draft();
        d.subject = "VPN".into();
        assert_eq!(d.validate(), Err(TicketFieldError::Subject { len: 3 }));

        let mut d = draft();
        d.description = "broken".into();
        assert_eq!(d.validate(), Err(TicketFieldError::Description { len: 6 }));

        let mut d = draft();
        d.requester_email = "jane at company".into();
        assert!(matches!(d.validate(), Err(TicketFieldError::Email(_))));
    }

    #[test]
    fn priority_parses_and_defaults_to_p3() {
        assert_eq!("p1".parse::<Priority>().unwrap(), Priority::P1);
        assert_eq!("".parse::<Priority>().unwrap(), Priority::P3);
        assert!("P9".parse::<Priority>().is_err());
        assert_eq!(TicketDraft::default().priority, Priority::P3);
        assert_eq!(serde_json::to_value(Priority::P2).unwrap(), json!("P2"));
    }

    #[test]
    fn ticket_created_payload_decodes() {
        let body = json!({
            "ticket": {
                "id": "INC1234567",
                "subject": "VPN drops every hour",
                "priority": "P2",
                "status": "Open",
                "assigned": "Unassigned",
                "requester": "jane.doe@company.com",
                "resolution": null
            },
            "suggested_resolution": {"id": "KB001", "title": "VPN Troubleshooting"},
            "message": "Ticket INC1234567 created successfully."
        });
        let created: TicketCreated = serde_json::from_value(body).unwrap();
        assert_eq!(created.ticket.id, "INC1234567");
        assert_eq!(created.ticket.requester, "jane.doe@company.com");
        assert!(created.suggested_resolution.is_some());
    }

    #[test]
    fn escalation_reason_length() {
        let short = EscalationRequest {
            ticket_id: "INC0012847".into(),
            reason: "urgent".into(),
        };
        assert_eq!(short.validate(), Err(TicketFieldError::Reason { len: 6 }));
        let ok = EscalationRequest {
            ticket_id: "INC0012847".into(),
            reason: "Warehouse shipping has been blocked for two days".into(),
        };
        assert!(ok.validate().is_ok());
    }
}
