use super::decoder::{decode_stream, Decoded};
use super::protocol::StreamEvent;
use super::reducer::reduce;
use super::types::{ChatRequest, ContextBlock, Message, RoleContext};
use super::ChatTransport;
use crate::tickets::TicketCreated;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const CONNECTION_FAILURE_NOTICE: &str =
    "Unable to connect. Please check your connection and try again.";
pub const ESCALATION_PROMPT: &str =
    "I'll help you create a support ticket. Please fill out the form below:";
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejected {
    /// A turn is already in flight.
    Busy,
    EmptyInput,
    TooLong { len: usize },
}

impl fmt::Display for SubmitRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitRejected::Busy => f.write_str("still waiting for the previous answer"),
            SubmitRejected::EmptyInput => f.write_str("message is empty"),
            SubmitRejected::TooLong { len } => write!(
                f,
                "message is {} characters; the limit is {}",
                len, MAX_MESSAGE_CHARS
            ),
        }
    }
}

impl std::error::Error for SubmitRejected {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed(String),
    /// The session moved on (role switch) before the turn ended.
    Abandoned,
}

#[derive(Debug)]
struct ActiveTurn {
    assistant_id: String,
    cancel: CancellationToken,
}

/// One conversation: its messages, the role it is scoped to, and the
/// single-turn `loading` lock.
#[derive(Debug, Default)]
pub struct Session {
    messages: Vec<Message>,
    role: RoleContext,
    loading: bool,
    active: Option<ActiveTurn>,
    ticket_form_open: bool,
}

impl Session {
    pub fn new(role: RoleContext) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn role(&self) -> RoleContext {
        self.role
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn ticket_form_open(&self) -> bool {
        self.ticket_form_open
    }

    /// Idle → Submitting. Appends the user turn and an empty streaming
    /// assistant turn, and takes the `loading` lock.
    fn begin_turn(
        &mut self,
        input: &str,
    ) -> Result<(String, String, CancellationToken), SubmitRejected> {
        if self.loading {
            return Err(SubmitRejected::Busy);
        }
        let text = input.trim();
        if text.is_empty() {
            return Err(SubmitRejected::EmptyInput);
        }
        let len = text.chars().count();
        if len > MAX_MESSAGE_CHARS {
            return Err(SubmitRejected::TooLong { len });
        }

        self.messages.push(Message::user(text));
        let placeholder = Message::assistant_placeholder();
        let assistant_id = placeholder.id.clone();
        self.messages.push(placeholder);
        self.loading = true;
        self.ticket_form_open = false;

        let cancel = CancellationToken::new();
        self.active = Some(ActiveTurn {
            assistant_id: assistant_id.clone(),
            cancel: cancel.clone(),
        });
        Ok((assistant_id, text.to_string(), cancel))
    }

    /// Reduce `event` into the message with `id`. Returns the message's
    /// `streaming` flag afterwards, or `None` if the message is gone.
    fn apply_event(&mut self, id: &str, event: &StreamEvent) -> Option<bool> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        let next = reduce(self.messages[idx].clone(), event);
        if next.show_ticket_form && !self.messages[idx].show_ticket_form {
            self.ticket_form_open = true;
        }
        let streaming = next.streaming;
        self.messages[idx] = next;
        Some(streaming)
    }

    fn finish_turn(&mut self, id: &str) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
            msg.streaming = false;
        }
        self.release(id);
    }

    /// Failure replaces whatever partial text arrived with the fixed notice.
    fn fail_turn(&mut self, id: &str) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
            msg.content = CONNECTION_FAILURE_NOTICE.to_string();
            msg.streaming = false;
        }
        self.release(id);
    }

    fn release(&mut self, id: &str) {
        if self
            .active
            .as_ref()
            .is_some_and(|turn| turn.assistant_id == id)
        {
            self.active = None;
            self.loading = false;
        }
    }

    /// Scope the conversation to another role. All messages are dropped and
    /// any in-flight turn is cancelled. Returns `false` if nothing changed.
    pub fn switch_role(&mut self, role: RoleContext) -> bool {
        if role == self.role {
            return false;
        }
        if let Some(turn) = self.active.take() {
            debug!("Cancelling in-flight turn {} on role switch", turn.assistant_id);
            turn.cancel.cancel();
        }
        self.role = role;
        self.messages.clear();
        self.loading = false;
        self.ticket_form_open = false;
        true
    }

    /// User asked for a human: show the ticket form.
    pub fn escalate(&mut self) {
        let mut msg = Message::assistant_note(ESCALATION_PROMPT);
        msg.show_ticket_form = true;
        self.messages.push(msg);
        self.ticket_form_open = true;
    }

    pub fn ticket_created(&mut self, created: &TicketCreated) {
        let ticket = &created.ticket;
        let mut msg = match &created.suggested_resolution {
            Some(resolution) if !resolution.is_null() => {
                let mut msg = Message::assistant_note(format!(
                    "Ticket **{}** created! While you wait, here's a possible solution from our knowledge base:",
                    ticket.id
                ));
                msg.contexts.push(ContextBlock {
                    kind: "resolution".to_string(),
                    data: resolution.clone(),
                });
                msg
            }
            _ => Message::assistant_note(format!(
                "Ticket **{}** created successfully! Our team will review it shortly. You'll receive updates at {}.",
                ticket.id, ticket.requester
            )),
        };
        msg.show_ticket_form = false;
        self.messages.push(msg);
        self.ticket_form_open = false;
    }

    /// Ticket submission failed: tell the user and keep the form available.
    pub fn ticket_failed(&mut self, reason: &str) {
        let mut msg = Message::assistant_note(format!(
            "Sorry, the ticket could not be created ({}). Please review the details and try again.",
            reason
        ));
        msg.show_ticket_form = true;
        self.messages.push(msg);
        self.ticket_form_open = true;
    }

    pub fn close_ticket_form(&mut self) {
        self.ticket_form_open = false;
    }
}

/// Lazily opened, cancellable event source for one assistant turn.
pub struct Turn {
    assistant_id: String,
    events: BoxStream<'static, Decoded>,
    cancel: CancellationToken,
    idle_timeout: Duration,
    /// Armed on first poll, pushed back only when an item arrives.
    deadline: Option<Pin<Box<Sleep>>>,
    finished: bool,
}

impl Turn {
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Next decoded item. The transport gets at most the idle timeout
    /// between items, however often this future is dropped and restarted.
    /// Returns `None` after a terminal item or once the turn is cancelled.
    pub async fn next(&mut self) -> Option<Decoded> {
        if self.finished {
            return None;
        }
        let idle_timeout = self.idle_timeout;
        let deadline = self
            .deadline
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(idle_timeout)));
        let item = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.events.next() => {
                deadline.as_mut().reset(Instant::now() + idle_timeout);
                item
            }
            _ = deadline.as_mut() => Some(Decoded::Failed(format!(
                "stream stalled: no data for {}s",
                idle_timeout.as_secs_f32()
            ))),
        };
        if item.as_ref().map_or(true, Decoded::is_terminal) {
            self.finished = true;
        }
        item
    }
}

/// Drives turns for one [`Session`] over a [`ChatTransport`].
pub struct SessionController<T> {
    transport: T,
    session: Session,
    idle_timeout: Duration,
}

impl<T: ChatTransport> SessionController<T> {
    pub fn new(transport: T, role: RoleContext, idle_timeout: Duration) -> Self {
        Self {
            transport,
            session: Session::new(role),
            idle_timeout,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Start a turn. The request is only sent once the returned [`Turn`] is
    /// polled.
    pub fn submit(&mut self, input: &str) -> Result<Turn, SubmitRejected> {
        let (assistant_id, message, cancel) = self.session.begin_turn(input)?;
        let role = self.session.role();
        info!("Chat turn {} started (role={})", assistant_id, role);

        let transport = self.transport.clone();
        let request = ChatRequest { message, role };
        let events = stream::once(async move { transport.open_chat(request).await })
            .flat_map(|opened| match opened {
                Ok(chunks) => decode_stream(chunks).boxed(),
                Err(e) => stream::iter([Decoded::Failed(format!("{e:#}"))]).boxed(),
            })
            .boxed();

        Ok(Turn {
            assistant_id,
            events,
            cancel,
            idle_timeout: self.idle_timeout,
            deadline: None,
            finished: false,
        })
    }

    /// Apply one decoded item. Returns the outcome once the turn is over.
    pub fn apply(&mut self, turn: &Turn, item: Decoded) -> Option<TurnOutcome> {
        let id = turn.assistant_id();
        match item {
            Decoded::Event(event) => match self.session.apply_event(id, &event) {
                None => {
                    debug!("Dropping {} event for abandoned turn {}", event.kind(), id);
                    Some(TurnOutcome::Abandoned)
                }
                Some(true) => None,
                Some(false) => {
                    self.session.finish_turn(id);
                    info!("Chat turn {} completed", id);
                    Some(TurnOutcome::Completed)
                }
            },
            Decoded::Completed => {
                if self.session.message(id).is_none() {
                    return Some(TurnOutcome::Abandoned);
                }
                self.session.finish_turn(id);
                info!("Chat turn {} completed (stream closed)", id);
                Some(TurnOutcome::Completed)
            }
            Decoded::Failed(reason) => {
                if self.session.message(id).is_none() {
                    return Some(TurnOutcome::Abandoned);
                }
                warn!("Chat turn {} failed: {}", id, reason);
                self.session.fail_turn(id);
                Some(TurnOutcome::Failed(reason))
            }
        }
    }

    /// Consume `turn` to the end, calling `on_update` with the assistant
    /// message after every applied event.
    pub async fn run_with<F>(&mut self, mut turn: Turn, mut on_update: F) -> TurnOutcome
    where
        F: FnMut(&Message),
    {
        while let Some(item) = turn.next().await {
            let outcome = self.apply(&turn, item);
            if let Some(msg) = self.session.message(turn.assistant_id()) {
                on_update(msg);
            }
            if let Some(outcome) = outcome {
                return outcome;
            }
        }
        // Cancelled before any terminal item.
        self.session.finish_turn(turn.assistant_id());
        TurnOutcome::Abandoned
    }

    pub fn switch_role(&mut self, role: RoleContext) -> bool {
        let changed = self.session.switch_role(role);
        if changed {
            info!("Role context switched to {}; conversation cleared", role);
        }
        changed
    }
}
