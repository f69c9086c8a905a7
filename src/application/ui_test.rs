use std::fs;
use std::sync::Arc;

use anyhow::Result;

use super::format_conversations;
use super::format_thread;
use super::help_text;
use super::Repl;
use super::StreamPrinter;
use super::EMPTY_STATE;
use super::FEEDBACK_HINT;
use crate::domain::models::Conversation;
use crate::domain::models::DomainError;
use crate::domain::models::Message;
use crate::domain::models::ModelDescriptor;
use crate::domain::models::Role;
use crate::domain::models::SessionStorage;
use crate::domain::models::CONVERSATIONS_KEY;
use crate::domain::models::EXAMPLE_PROMPTS;
use crate::domain::models::GREETING;
use crate::domain::services::ConversationStore;
use crate::domain::services::GenerationState;
use crate::domain::services::ModelCatalog;
use crate::domain::services::Orchestrator;
use crate::infrastructure::backends::fake::FakeBackend;
use crate::infrastructure::storage::memory::MemoryStorage;

fn repl(backend: &FakeBackend) -> Repl {
    let mut store = ConversationStore::new(Box::<MemoryStorage>::default());
    store.select_model("llama3");
    let orchestrator = Orchestrator::new(Arc::new(backend.clone()), store.shared());
    let catalog = ModelCatalog {
        models: vec![
            ModelDescriptor::named("llama3"),
            ModelDescriptor::named("mistral"),
        ],
        notice: None,
    };

    return Repl::new(orchestrator, catalog);
}

fn text(repl: &mut Repl, input: &str) -> String {
    return repl.dispatch(input).text.unwrap_or_default();
}

fn titles(repl: &Repl) -> Vec<String> {
    return repl
        .orchestrator
        .store()
        .lock()
        .conversations()
        .iter()
        .map(|conversation| return conversation.title.to_string())
        .collect();
}

#[test]
fn it_lists_commands_and_examples_in_help() {
    let help = help_text();
    assert!(help.starts_with("COMMANDS:"));
    assert!(help.contains("/bad"));
    for prompt in EXAMPLE_PROMPTS.iter() {
        assert!(help.contains(prompt));
    }
}

#[test]
fn it_formats_a_thread() {
    let mut conversation = Conversation::default();
    conversation.title = "Coffee machine".to_string();
    conversation.push(Message::new(Role::User, "It leaks."));
    conversation.push(Message::new(Role::Model, "Check the gasket.").with_feedback(true));

    insta::assert_snapshot!(format_thread(&conversation), @r###"
    == Coffee machine ==
    AI: Hello! Please describe the fault you're observing in your system.
    You: It leaks.
    AI: Check the gasket.
    Was this helpful? Answer with /good or /bad.
    "###);
}

#[test]
fn it_formats_conversations_with_the_active_marker() {
    let mut first = Conversation::default();
    first.title = "Laptop fan".to_string();
    let second = Conversation::default();

    let res = format_conversations(&[first, second.clone()], Some(&second.id));
    assert_eq!(
        res,
        "  1. Laptop fan (1 messages)\n* 2. New Chat (1 messages)"
    );
    assert_eq!(format_conversations(&[], None), EMPTY_STATE);
}

#[test]
fn it_prints_streamed_deltas() {
    let mut printer = StreamPrinter::default();
    assert_eq!(printer.start("m1"), "AI: ");

    assert_eq!(printer.update("m1", "Check "), Some("Check ".to_string()));
    assert_eq!(
        printer.update("m1", "Check the fuse."),
        Some("the fuse.".to_string())
    );
    assert_eq!(printer.update("m1", "Check the fuse."), None);
    assert_eq!(printer.update("other", "ignored"), None);
}

#[test]
fn it_reprints_replaced_content() {
    let mut printer = StreamPrinter::default();
    printer.start("m1");
    printer.update("m1", "Checking ");

    assert_eq!(
        printer.update("m1", "Ollama error: boom"),
        Some("\nOllama error: boom".to_string())
    );
}

#[test]
fn it_hints_feedback_when_finished() {
    let mut printer = StreamPrinter::default();
    printer.start("m1");

    let message = Message::placeholder().with_feedback(true);
    assert_eq!(
        printer.finish("m1", Some(&message)),
        Some(format!("\n{FEEDBACK_HINT}"))
    );
    assert_eq!(printer.finish("m1", Some(&message)), None);
    assert_eq!(printer.update("m1", "late"), None);
}

#[test]
fn it_welcomes_with_a_fresh_conversation() {
    let backend = FakeBackend::default();
    let repl = repl(&backend);

    let res = repl.welcome();
    assert!(res.contains("Model: llama3"));
    assert!(res.contains(GREETING));
    assert!(res.contains(EXAMPLE_PROMPTS[0]));
    assert_eq!(titles(&repl), vec!["New Chat"]);
}

#[test]
fn it_welcomes_back_into_the_first_conversation() -> Result<()> {
    let mut conversation = Conversation::default();
    conversation.title = "Boiler".to_string();
    let storage = MemoryStorage::default();
    storage.set(
        CONVERSATIONS_KEY,
        &serde_json::to_string(&vec![conversation, Conversation::default()])?,
    )?;

    let store = ConversationStore::load(Box::new(storage));
    let orchestrator = Orchestrator::new(Arc::new(FakeBackend::default()), store.shared());
    let repl = Repl::new(orchestrator, ModelCatalog::default());

    let res = repl.welcome();
    assert!(res.contains("== Boiler =="));
    assert!(res.contains("Try one of these:"));
    assert_eq!(titles(&repl), vec!["Boiler", "New Chat"]);

    return Ok(());
}

#[test]
fn it_shows_the_fallback_notice() {
    let backend = FakeBackend::default();
    let mut repl = repl(&backend);
    repl.catalog.notice = Some("Could not fetch models. Using fallback list.".to_string());

    assert!(repl
        .welcome()
        .starts_with("Could not fetch models. Using fallback list."));
    assert!(text(&mut repl, "/models").contains("fallback"));
}

#[tokio::test]
async fn it_sends_plain_lines_as_messages() -> Result<()> {
    let backend = FakeBackend::default();
    backend.push_fragments(vec![Ok("Check the fuse.".to_string())]);
    let mut repl = repl(&backend);
    repl.welcome();

    let reply = repl.dispatch("  Lights are out.  ");
    assert!(reply.text.is_none());
    let outcome = reply.generation.unwrap().run().await;

    assert_eq!(outcome.state, GenerationState::Completed);
    assert_eq!(titles(&repl), vec!["Lights are out."]);
    assert_eq!(backend.prompts()[0].messages[1].content, "Lights are out.");

    return Ok(());
}

#[tokio::test]
async fn it_reports_rejected_messages() -> Result<()> {
    let backend = FakeBackend::default();
    let mut repl = repl(&backend);

    assert_eq!(
        text(&mut repl, "hello"),
        DomainError::NoActiveConversation.to_string()
    );

    repl.welcome();
    let reply = repl.dispatch("first");
    assert!(reply.generation.is_some());
    assert_eq!(
        text(&mut repl, "second"),
        DomainError::GenerationInFlight.to_string()
    );
    assert_eq!(
        text(&mut repl, "/new"),
        DomainError::GenerationInFlight.to_string()
    );

    assert_eq!(text(&mut repl, "/stop"), "Stopped.");
    assert_eq!(text(&mut repl, "/stop"), "Nothing is being generated.");

    return Ok(());
}

#[test]
fn it_manages_conversations() {
    let backend = FakeBackend::default();
    let mut repl = repl(&backend);
    repl.welcome();

    assert!(text(&mut repl, "/new").contains(GREETING));
    assert_eq!(
        text(&mut repl, "/list"),
        "* 1. New Chat (1 messages)\n  2. New Chat (1 messages)"
    );

    assert_eq!(
        text(&mut repl, "/rename 2 Washing machine drum"),
        "* 1. New Chat (1 messages)\n  2. Washing machine drum (1 messages)"
    );
    assert_eq!(text(&mut repl, "/rename 2"), "Usage: /rename N TITLE");
    assert!(text(&mut repl, "/select 2").starts_with("== Washing machine drum =="));
    assert_eq!(text(&mut repl, "/select 5"), "No conversation at position 5.");

    assert!(text(&mut repl, "/delete 2").starts_with("== New Chat =="));
    assert_eq!(text(&mut repl, "/delete"), EMPTY_STATE);
    assert_eq!(text(&mut repl, "/list"), EMPTY_STATE);
    assert_eq!(text(&mut repl, "/good"), EMPTY_STATE);
}

#[test]
fn it_switches_models() {
    let backend = FakeBackend::default();
    let mut repl = repl(&backend);

    assert_eq!(text(&mut repl, "/model 2"), "Model: mistral");
    assert_eq!(repl.orchestrator.store().lock().selected_model(), "mistral");
    assert_eq!(text(&mut repl, "/m llama3"), "Model: llama3");
    assert_eq!(
        text(&mut repl, "/model phi3"),
        "Unknown model 'phi3'. Use /models to see what's available."
    );
    assert_eq!(
        text(&mut repl, "/models"),
        "* 1. llama3\n  2. mistral"
    );
}

#[test]
fn it_exports_conversations() -> Result<()> {
    let backend = FakeBackend::default();
    let mut repl = repl(&backend);
    repl.welcome();

    assert!(text(&mut repl, "/export").starts_with("[AI]:\nHello!"));

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("chat.txt");
    let path = path.to_string_lossy().to_string();
    assert_eq!(
        text(&mut repl, &format!("/export 1 {path}")),
        format!("Exported to {path}")
    );
    assert!(fs::read_to_string(&path)?.contains(GREETING));

    return Ok(());
}

#[tokio::test]
async fn it_handles_feedback() -> Result<()> {
    let backend = FakeBackend::default();
    backend.push_fragments(vec![Ok("Replace the fuse.".to_string())]);
    backend.push_fragments(vec![Ok("Check the breaker.".to_string())]);
    let mut repl = repl(&backend);
    repl.welcome();
    repl.dispatch("Lights are out.").generation.unwrap().run().await;

    let reply = repl.dispatch("/bad");
    assert!(reply.text.is_none());
    let outcome = reply.generation.unwrap().run().await;
    assert_eq!(outcome.state, GenerationState::Completed);

    let reply = repl.dispatch("/good");
    assert!(reply.text.is_none());
    assert!(reply.generation.is_none());
    assert_eq!(backend.prompts().len(), 2);

    return Ok(());
}

#[test]
fn it_quits_and_rejects_unknown_commands() {
    let backend = FakeBackend::default();
    let mut repl = repl(&backend);

    assert!(repl.dispatch("/quit").quit);
    assert!(repl.dispatch("/q").quit);
    assert_eq!(
        text(&mut repl, "/frobnicate"),
        "Unknown command /frobnicate. See /help."
    );
    assert!(text(&mut repl, "/help").contains("COMMANDS:"));
    assert!(repl.dispatch("   ").text.is_none());
}
