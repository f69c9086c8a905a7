#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;

use std::fs;
use std::io::Write;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendBox;
use crate::domain::models::Conversation;
use crate::domain::models::DomainError;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::SlashCommand;
use crate::domain::models::StoreEvent;
use crate::domain::models::EXAMPLE_PROMPTS;
use crate::domain::services::Generation;
use crate::domain::services::GenerationState;
use crate::domain::services::ModelCatalog;
use crate::domain::services::Orchestrator;
use crate::domain::services::SharedStore;

pub const EMPTY_STATE: &str = "No conversations left. Start a new one with /new.";
pub const FEEDBACK_HINT: &str = "Was this helpful? Answer with /good or /bad.";

pub fn help_text() -> String {
    let examples = EXAMPLE_PROMPTS
        .iter()
        .map(|prompt| return format!("- {prompt}"))
        .collect::<Vec<String>>()
        .join("\n");

    let text = r#"
COMMANDS:
/new (/n) - Start a new conversation.
/list (/l) - List all conversations.
/select (/s) [N] - Switch to conversation N.
/rename (/r) [N] [TITLE] - Rename conversation N.
/delete (/d) [N] - Delete conversation N.
/export (/x) [N] [PATH] - Print conversation N as text, or write it to PATH. Defaults to the active one.
/models (/ml) - List the models available on the server.
/model (/m) [NAME|N] - Switch the model used for new answers.
/good (/y) - The last answer was helpful.
/bad - The last answer wasn't helpful, ask for an alternative diagnosis.
/stop - Stop the answer being generated. Ctrl+c does the same.
/help (/h) - Show this help.
/quit (/q) - Exit. Ctrl+c does the same when nothing is generating.

EXAMPLES:
"#;

    return format!("{}{examples}", text.trim_start());
}

fn format_message(message: &Message) -> String {
    return format!("{}: {}", message.role.label(), message.content);
}

/// Every message of a conversation under its title.
pub fn format_thread(conversation: &Conversation) -> String {
    let mut lines = vec![format!("== {} ==", conversation.title)];
    for message in conversation.messages.iter() {
        lines.push(format_message(message));
    }

    let last = conversation.messages.last();
    if last.map(|message| return message.wants_feedback()) == Some(true) {
        lines.push(FEEDBACK_HINT.to_string());
    }

    return lines.join("\n");
}

pub fn format_conversations(conversations: &[Conversation], active_id: Option<&str>) -> String {
    if conversations.is_empty() {
        return EMPTY_STATE.to_string();
    }

    return conversations
        .iter()
        .enumerate()
        .map(|(idx, conversation)| {
            let marker = if Some(conversation.id.as_str()) == active_id {
                "*"
            } else {
                " "
            };
            return format!(
                "{marker} {}. {} ({} messages)",
                idx + 1,
                conversation.title,
                conversation.messages.len()
            );
        })
        .collect::<Vec<String>>()
        .join("\n");
}

/// Turns store notifications for the running generation into terminal output.
#[derive(Default)]
pub struct StreamPrinter {
    message_id: Option<String>,
    printed: String,
}

impl StreamPrinter {
    pub fn start(&mut self, message_id: &str) -> String {
        self.message_id = Some(message_id.to_string());
        self.printed = "".to_string();

        return format!("{}: ", Role::Model.label());
    }

    /// Text still missing from the terminal for `content`. A replaced message
    /// is printed again on a fresh line.
    pub fn update(&mut self, message_id: &str, content: &str) -> Option<String> {
        if self.message_id.as_deref() != Some(message_id) {
            return None;
        }

        let res = if content.starts_with(&self.printed) {
            content[self.printed.len()..].to_string()
        } else {
            format!("\n{content}")
        };
        self.printed = content.to_string();

        if res.is_empty() {
            return None;
        }

        return Some(res);
    }

    pub fn finish(&mut self, message_id: &str, message: Option<&Message>) -> Option<String> {
        if self.message_id.as_deref() != Some(message_id) {
            return None;
        }
        self.message_id = None;
        self.printed = "".to_string();

        if message.map(|message| return message.wants_feedback()) == Some(true) {
            return Some(format!("\n{FEEDBACK_HINT}"));
        }

        return Some("".to_string());
    }
}

fn print_flush(text: &str) {
    print!("{text}");
    if let Err(err) = std::io::stdout().flush() {
        tracing::warn!(error = ?err, "Failed to flush stdout");
    }
}

fn find_message(store: &SharedStore, conversation_id: &str, message_id: &str) -> Option<Message> {
    return store
        .lock()
        .conversation(conversation_id)
        .and_then(|conversation| return conversation.message(message_id).cloned());
}

async fn render_events(store: SharedStore, mut rx: mpsc::UnboundedReceiver<StoreEvent>) {
    let mut printer = StreamPrinter::default();

    while let Some(event) = rx.recv().await {
        match event {
            StoreEvent::MessageAdded {
                conversation_id,
                message_id,
            } => {
                if let Some(message) = find_message(&store, &conversation_id, &message_id) {
                    println!("{}", format_message(&message));
                }
            }
            StoreEvent::GenerationStarted { message_id, .. } => {
                print_flush(&Paint::green(printer.start(&message_id)).bold().to_string());
            }
            StoreEvent::MessageUpdated {
                conversation_id,
                message_id,
            } => {
                if let Some(message) = find_message(&store, &conversation_id, &message_id) {
                    if let Some(delta) = printer.update(&message_id, &message.content) {
                        print_flush(&delta);
                    }
                }
            }
            StoreEvent::GenerationFinished {
                conversation_id,
                message_id,
            } => {
                let message = find_message(&store, &conversation_id, &message_id);
                if let Some(text) = printer.finish(&message_id, message.as_ref()) {
                    println!("{}", Paint::yellow(text));
                }
            }
            _ => {}
        }
    }
}

/// Result of handling one line of input.
#[derive(Default)]
pub struct Reply {
    pub text: Option<String>,
    pub generation: Option<Generation>,
    pub quit: bool,
}

impl Reply {
    fn text(text: String) -> Reply {
        return Reply {
            text: Some(text),
            ..Reply::default()
        };
    }

    fn error(err: DomainError) -> Reply {
        return Reply::text(err.to_string());
    }
}

pub struct Repl {
    orchestrator: Orchestrator,
    catalog: ModelCatalog,
}

impl Repl {
    pub fn new(orchestrator: Orchestrator, catalog: ModelCatalog) -> Repl {
        return Repl {
            orchestrator,
            catalog,
        };
    }

    /// Conversation id for a 1-based position, or the active one without an
    /// argument.
    fn target(&self, command: &SlashCommand) -> Result<String, String> {
        let store = self.orchestrator.store();
        let store = store.lock();

        if command.args.is_empty() {
            return store
                .active_conversation_id()
                .ok_or_else(|| return DomainError::NoActiveConversation.to_string());
        }

        return command
            .index_arg()
            .and_then(|idx| return store.conversations().get(idx - 1))
            .map(|conversation| return conversation.id.to_string())
            .ok_or_else(|| return format!("No conversation at position {}.", command.args[0]));
    }

    fn active_thread(&self) -> String {
        let store = self.orchestrator.store();
        let store = store.lock();
        return match store.active_conversation() {
            Some(conversation) => format_thread(conversation),
            None => EMPTY_STATE.to_string(),
        };
    }

    fn list(&self) -> String {
        let state = self.orchestrator.store().lock().snapshot();
        return format_conversations(
            &state.conversations,
            state.active_conversation_id.as_deref(),
        );
    }

    /// Greeting shown when the app starts, creating a first conversation if
    /// the session has none.
    pub fn welcome(&self) -> String {
        let store = self.orchestrator.store();
        let mut store = store.lock();

        if store.active_conversation().is_none() {
            let first = store
                .conversations()
                .first()
                .map(|conversation| return conversation.id.to_string());
            let res = match first {
                Some(id) => store.select_conversation(&id),
                None => store.create_conversation().map(|_| return ()),
            };
            if let Err(err) = res {
                tracing::error!(error = %err, "Failed to open a conversation");
            }
        }

        let mut lines = vec![];
        if let Some(notice) = &self.catalog.notice {
            lines.push(notice.to_string());
        }
        lines.push(format!("Model: {}", store.selected_model()));

        if let Some(conversation) = store.active_conversation() {
            lines.push(format_thread(conversation));
            if conversation.messages.len() == 1 {
                lines.push("Try one of these:".to_string());
                for prompt in EXAMPLE_PROMPTS.iter() {
                    lines.push(format!("- {prompt}"));
                }
            }
        }
        lines.push("Type /help to see all commands.".to_string());

        return lines.join("\n");
    }

    pub fn dispatch(&mut self, input: &str) -> Reply {
        let input = input.trim();
        if input.is_empty() {
            return Reply::default();
        }

        let command = match SlashCommand::parse(input) {
            Some(command) => command,
            None => {
                if input.starts_with('/') && !input.contains(char::is_whitespace) {
                    return Reply::text(format!("Unknown command {input}. See /help."));
                }

                return match self.orchestrator.send_message(input) {
                    Ok(generation) => Reply {
                        generation: Some(generation),
                        ..Reply::default()
                    },
                    Err(err) => Reply::error(err),
                };
            }
        };

        if command.is_quit() {
            self.orchestrator.stop();
            return Reply {
                quit: true,
                ..Reply::default()
            };
        }

        if command.is_help() {
            return Reply::text(help_text());
        }

        if command.is_stop() {
            if self.orchestrator.stop() {
                return Reply::text("Stopped.".to_string());
            }
            return Reply::text("Nothing is being generated.".to_string());
        }

        if command.is_helpful() || command.is_not_helpful() {
            return self.feedback(command.is_helpful());
        }

        if command.is_model_list() {
            let selected = self.orchestrator.store().lock().selected_model().to_string();
            let mut text = self.catalog.format_list(&selected);
            if let Some(notice) = &self.catalog.notice {
                text = format!("{notice}\n{text}");
            }
            return Reply::text(text);
        }

        if command.is_model_set() {
            let input = command.args.join(" ");
            return match self.catalog.resolve(&input) {
                Some(name) => {
                    self.orchestrator.store().lock().select_model(&name);
                    Reply::text(format!("Model: {name}"))
                }
                None => Reply::text(format!(
                    "Unknown model '{input}'. Use /models to see what's available."
                )),
            };
        }

        if command.is_list_chats() {
            return Reply::text(self.list());
        }

        if command.is_new_chat() {
            let res = self.orchestrator.store().lock().create_conversation();
            return match res {
                Ok(_) => Reply::text(self.active_thread()),
                Err(err) => Reply::error(err),
            };
        }

        let target = match self.target(&command) {
            Ok(target) => target,
            Err(text) => return Reply::text(text),
        };

        if command.is_select_chat() {
            let res = self.orchestrator.store().lock().select_conversation(&target);
            return match res {
                Ok(_) => Reply::text(self.active_thread()),
                Err(err) => Reply::error(err),
            };
        }

        if command.is_rename_chat() {
            let title = command.rest_args();
            let title = title.trim();
            if title.is_empty() {
                return Reply::text("Usage: /rename N TITLE".to_string());
            }

            let res = self
                .orchestrator
                .store()
                .lock()
                .rename_conversation(&target, title);
            return match res {
                Ok(_) => Reply::text(self.list()),
                Err(err) => Reply::error(err),
            };
        }

        if command.is_delete_chat() {
            let res = self.orchestrator.store().lock().delete_conversation(&target);
            return match res {
                Ok(_) => Reply::text(self.active_thread()),
                Err(err) => Reply::error(err),
            };
        }

        if command.is_export_chat() {
            return self.export(&target, &command);
        }

        return Reply::text(format!("Unknown command {input}. See /help."));
    }

    /// The acknowledgement or follow-up question shows up through the store
    /// notifications like any other message.
    fn feedback(&mut self, was_helpful: bool) -> Reply {
        if self.orchestrator.store().lock().active_conversation().is_none() {
            return Reply::text(EMPTY_STATE.to_string());
        }

        return match self.orchestrator.submit_feedback(was_helpful) {
            Ok(generation) => Reply {
                generation,
                ..Reply::default()
            },
            Err(err) => Reply::error(err),
        };
    }

    fn export(&self, target: &str, command: &SlashCommand) -> Reply {
        let text = match self.orchestrator.store().lock().export_text(target) {
            Ok(text) => text,
            Err(err) => return Reply::error(err),
        };

        let path = command.rest_args();
        if command.args.is_empty() || path.is_empty() {
            return Reply::text(text);
        }

        return match fs::write(&path, text) {
            Ok(_) => Reply::text(format!("Exported to {path}")),
            Err(err) => Reply::text(format!("Failed to export to {path}: {err}")),
        };
    }
}

fn spawn_generation(generation: Generation) {
    tokio::spawn(async move {
        let outcome = generation.run().await;
        tracing::debug!(
            conversation_id = %outcome.conversation_id,
            state = %outcome.state,
            "Generation outcome"
        );
    });
}

pub async fn start(
    backend: BackendBox,
    orchestrator: Orchestrator,
    catalog: ModelCatalog,
) -> Result<()> {
    if let Err(err) = backend.health_check().await {
        tracing::warn!(error = ?err, "Health check failed");
        println!(
            "{}",
            Paint::yellow(format!(
                "Ollama doesn't seem to be running at {}. Answers will fail until it is.",
                Config::get(ConfigKey::OllamaURL)
            ))
        );
    }

    let store = orchestrator.store();
    let rx = store.lock().subscribe();
    tokio::spawn(render_events(store, rx));

    let mut repl = Repl::new(orchestrator.clone(), catalog);
    println!("{}", repl.welcome());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            line = lines.next_line() => Some(line?),
        };

        let line = match line {
            None => {
                if orchestrator.state() == GenerationState::Streaming && orchestrator.stop() {
                    println!("\nStopped.");
                    continue;
                }
                break;
            }
            Some(None) => break,
            Some(Some(line)) => line,
        };

        let reply = repl.dispatch(&line);
        if let Some(text) = reply.text {
            println!("{text}");
        }
        if let Some(generation) = reply.generation {
            spawn_generation(generation);
        }
        if reply.quit {
            break;
        }
    }

    return Ok(());
}
