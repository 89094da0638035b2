use crate::desk_client::DeskClient;
use crate::display;
use crate::tickets::{EscalationRequest, Priority, TicketDraft};
use anyhow::Result;

#[derive(Debug, Clone)]
pub enum TicketsAction {
    List {
        status: Option<String>,
    },
    Show {
        id: String,
    },
    Create {
        subject: String,
        description: String,
        priority: String,
        email: String,
    },
}

pub async fn run(action: TicketsAction, client: &DeskClient) -> Result<()> {
    match action {
        TicketsAction::List { status } => {
            let tickets = client.list_tickets(status.as_deref()).await?;
            if tickets.is_empty() {
                println!("No tickets found.");
                return Ok(());
            }
            for line in display::ticket_table(&tickets) {
                println!("{}", line);
            }
            println!("\n{} ticket(s)", tickets.len());
        }
        TicketsAction::Show { id } => {
            let ticket = client.get_ticket(&id).await?;
            for line in display::ticket_card(&ticket) {
                println!("{}", line);
            }
        }
        TicketsAction::Create {
            subject,
            description,
            priority,
            email,
        } => {
            let draft = TicketDraft {
                subject,
                description,
                priority: priority.parse::<Priority>()?,
                requester_email: email,
            }
            .trimmed();
            draft.validate()?;

            let created = client.create_ticket(&draft).await?;
            println!(
                "{}",
                created
                    .message
                    .as_deref()
                    .unwrap_or("Ticket created successfully")
            );
            for line in display::ticket_card(&created.ticket) {
                println!("{}", line);
            }
            if let Some(resolution) = created.suggested_resolution.filter(|r| !r.is_null()) {
                println!("\nPossible solution from the knowledge base:");
                let block = crate::engine::ContextBlock {
                    kind: "resolution".to_string(),
                    data: resolution,
                };
                for line in display::render_context(&block) {
                    println!("{}", line);
                }
            }
        }
    }
    Ok(())
}

pub async fn stats(client: &DeskClient) -> Result<()> {
    let stats = client.stats().await?;
    for line in display::render_stats(&stats) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn escalate(client: &DeskClient, ticket_id: String, reason: String) -> Result<()> {
    let request = EscalationRequest {
        ticket_id: ticket_id.trim().to_string(),
        reason: reason.trim().to_string(),
    };
    request.validate()?;

    let created = client.escalate(&request).await?;
    println!(
        "{}",
        created
            .message
            .unwrap_or_else(|| format!("Ticket {} escalated", request.ticket_id))
    );
    println!(
        "  {}  ticket {}  [{}]",
        created.escalation.id, created.escalation.ticket_id, created.escalation.status
    );
    Ok(())
}

pub async fn escalations(client: &DeskClient) -> Result<()> {
    let list = client.list_escalations().await?;
    if list.is_empty() {
        println!("No escalations.");
        return Ok(());
    }
    for e in &list {
        println!(
            "  {:<10} {:<11} {:<10} {:<20} {}",
            e.id, e.ticket_id, e.status, e.created, e.reason
        );
    }
    Ok(())
}
