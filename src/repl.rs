use crate::desk_client::DeskClient;
use crate::display::{self, TurnPrinter};
use crate::engine::{Decoded, RoleContext, SessionController, SubmitRejected, Turn, TurnOutcome};
use crate::tickets::{Priority, TicketDraft};
use anyhow::Result;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

type Input = Lines<BufReader<Stdin>>;

pub struct ChatSettings {
    pub client: DeskClient,
    pub role: RoleContext,
    pub idle_timeout: Duration,
}

pub async fn run_chat_repl(settings: ChatSettings) -> Result<()> {
    info!(
        "Starting interactive chat against {} (role={})",
        settings.client.base_url(),
        settings.role
    );
    let mut app = App::new(settings);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    if !app.client.health_check().await {
        println!(
            "Warning: backend at {} is not reachable yet.",
            app.client.base_url()
        );
    }
    print_lines(&display::welcome(app.controller.session().role()));
    println!("Type /help for commands.");

    loop {
        let line = match app.turn.take() {
            Some(mut turn) => {
                tokio::select! {
                    item = turn.next() => {
                        app.on_item(turn, item);
                        continue;
                    }
                    line = input.next_line() => {
                        app.turn = Some(turn);
                        line?
                    }
                }
            }
            None => {
                prompt(app.controller.session().role());
                input.next_line().await?
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if app.run_command(line, &mut input).await? {
            break;
        }
    }
    info!("Interactive chat finished");
    Ok(())
}

/// Send a single message and print the streamed answer. Fails if the turn
/// did not complete.
pub async fn ask_once(settings: ChatSettings, message: &str) -> Result<()> {
    let mut controller = SessionController::new(
        settings.client,
        settings.role,
        settings.idle_timeout,
    );
    let turn = controller.submit(message)?;
    let mut printer = TurnPrinter::new();
    let outcome = controller
        .run_with(turn, |msg| {
            print!("{}", printer.update(msg));
            let _ = std::io::stdout().flush();
        })
        .await;
    match outcome {
        TurnOutcome::Completed => Ok(()),
        TurnOutcome::Failed(reason) => anyhow::bail!("chat turn failed: {}", reason),
        TurnOutcome::Abandoned => anyhow::bail!("chat turn was abandoned"),
    }
}

struct App {
    client: DeskClient,
    controller: SessionController<DeskClient>,
    turn: Option<Turn>,
    printer: TurnPrinter,
}

impl App {
    fn new(settings: ChatSettings) -> Self {
        let controller = SessionController::new(
            settings.client.clone(),
            settings.role,
            settings.idle_timeout,
        );
        Self {
            client: settings.client,
            controller,
            turn: None,
            printer: TurnPrinter::new(),
        }
    }

    fn on_item(&mut self, turn: Turn, item: Option<Decoded>) {
        let Some(item) = item else {
            // Cancelled by a role switch; the session already moved on.
            return;
        };
        let outcome = self.controller.apply(&turn, item);
        if let Some(msg) = self.controller.session().message(turn.assistant_id()) {
            print!("{}", self.printer.update(msg));
            let _ = std::io::stdout().flush();
        }
        match outcome {
            None => self.turn = Some(turn),
            Some(TurnOutcome::Failed(reason)) => warn!("Turn ended with failure: {}", reason),
            Some(_) => {}
        }
        if self.turn.is_none() {
            prompt(self.controller.session().role());
        }
    }

    async fn run_command(&mut self, line: String, input: &mut Input) -> Result<bool> {
        if line == "/quit" || line == "/exit" {
            return Ok(true);
        }

        if line == "/help" {
            print_lines(&[
                "/role [user|admin]  show or switch the role (clears the conversation)",
                "/quick              list quick actions; /1 to /4 sends one",
                "/history            reprint the conversation",
                "/escalate           ask for a support ticket",
                "/ticket             fill out the support ticket form",
                "/cancel-form        close the ticket form",
                "/quit               exit",
            ]);
            return Ok(false);
        }

        if line == "/role" {
            let role = self.controller.session().role();
            println!("Current role: {} ({})", role, role.display_name());
            return Ok(false);
        }

        if let Some(rest) = line.strip_prefix("/role ") {
            match rest.parse::<RoleContext>() {
                Ok(role) => {
                    if self.controller.switch_role(role) {
                        self.turn = None;
                        self.printer = TurnPrinter::new();
                        println!();
                        print_lines(&display::welcome(role));
                    } else {
                        println!("Already in {} mode.", role.display_name());
                    }
                }
                Err(e) => println!("{}", e),
            }
            return Ok(false);
        }

        if line == "/quick" {
            print_lines(&display::welcome(self.controller.session().role())[3..]);
            return Ok(false);
        }

        if let Some(n) = line.strip_prefix('/').and_then(|n| n.parse::<usize>().ok()) {
            let actions = self.controller.session().role().quick_actions();
            match n.checked_sub(1).and_then(|i| actions.get(i)) {
                Some(action) => {
                    println!("you › {}", action.query);
                    self.submit(action.query);
                }
                None => println!("No quick action #{}.", n),
            }
            return Ok(false);
        }

        if line == "/history" {
            let session = self.controller.session();
            if session.is_empty() {
                print_lines(&display::welcome(session.role()));
                return Ok(false);
            }
            for msg in session.messages() {
                print_lines(&display::render_message(msg));
            }
            return Ok(false);
        }

        if line == "/escalate" {
            if self.controller.session().is_loading() {
                println!("Wait for the current answer to finish first.");
                return Ok(false);
            }
            self.controller.session_mut().escalate();
            self.print_last();
            return Ok(false);
        }

        if line == "/ticket" {
            if self.controller.session().is_loading() {
                println!("Wait for the current answer to finish first.");
                return Ok(false);
            }
            if !self.controller.session().ticket_form_open() {
                println!("No ticket form is open. Type /escalate to start one.");
                return Ok(false);
            }
            self.ticket_form(input).await?;
            return Ok(false);
        }

        if line == "/cancel-form" {
            self.controller.session_mut().close_ticket_form();
            println!("Ticket form closed.");
            return Ok(false);
        }

        if line.starts_with('/') {
            println!("Unknown command. Type /help for the list.");
            return Ok(false);
        }

        self.submit(&line);
        Ok(false)
    }

    fn submit(&mut self, text: &str) {
        match self.controller.submit(text) {
            Ok(turn) => {
                self.printer = TurnPrinter::new();
                self.turn = Some(turn);
            }
            Err(SubmitRejected::Busy) => {
                println!("Still answering the previous message; please wait.")
            }
            Err(e) => println!("Not sent: {}", e),
        }
    }

    async fn ticket_form(&mut self, input: &mut Input) -> Result<()> {
        let Some(requester_email) = ask_field(input, "Your email").await? else {
            return Ok(());
        };
        let Some(subject) = ask_field(input, "Subject").await? else {
            return Ok(());
        };
        let Some(description) = ask_field(input, "Description").await? else {
            return Ok(());
        };
        for p in [Priority::P1, Priority::P2, Priority::P3] {
            println!("    {}", p.label());
        }
        let Some(priority) = ask_field(input, "Priority [P1/P2/P3, default P3]").await? else {
            return Ok(());
        };
        let priority = match priority.parse::<Priority>() {
            Ok(p) => p,
            Err(e) => {
                println!("{}", e);
                return Ok(());
            }
        };

        let draft = TicketDraft {
            subject,
            description,
            priority,
            requester_email,
        }
        .trimmed();
        if let Err(e) = draft.validate() {
            println!("{}. Type /ticket to try again.", e);
            return Ok(());
        }

        println!("Creating ticket...");
        match self.client.create_ticket(&draft).await {
            Ok(created) => self.controller.session_mut().ticket_created(&created),
            Err(e) => {
                warn!("Ticket creation failed: {:#}", e);
                self.controller
                    .session_mut()
                    .ticket_failed(&format!("{:#}", e));
            }
        }
        self.print_last();
        Ok(())
    }

    fn print_last(&self) {
        if let Some(msg) = self.controller.session().messages().last() {
            print_lines(&display::render_message(msg));
        }
    }
}

async fn ask_field(input: &mut Input, label: &str) -> Result<Option<String>> {
    print!("  {}: ", label);
    let _ = std::io::stdout().flush();
    Ok(input.next_line().await?)
}

fn prompt(role: RoleContext) {
    print!("\n[{}] › ", role);
    let _ = std::io::stdout().flush();
}

fn print_lines<S: AsRef<str>>(lines: &[S]) {
    for line in lines {
        println!("{}", line.as_ref());
    }
}
