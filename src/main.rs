#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::anyhow;
use anyhow::Error;
use anyhow::Result;
use yansi::Paint;

use crate::application::cli;
use crate::application::ui;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendBox;
use crate::domain::models::StorageName;
use crate::domain::services::ConversationStore;
use crate::domain::services::ModelCatalog;
use crate::domain::services::Orchestrator;
use crate::infrastructure::backends::ollama::Ollama;
use crate::infrastructure::storage::StorageManager;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        Paint::red(format!(
            "Oh no! Diagnosis AI has failed with the following app version and error.\n\nVersion: {}\nError: {}",
            env!("CARGO_PKG_VERSION"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

async fn run() -> Result<()> {
    let backend: BackendBox = Arc::new(Ollama::default());

    let storage_name = Config::get(ConfigKey::Storage);
    let storage_name = StorageName::parse(&storage_name)
        .ok_or_else(|| return anyhow!("Unknown storage '{storage_name}'"))?;
    let storage = StorageManager::get(storage_name, &Config::get(ConfigKey::SessionID))?;

    let mut store = ConversationStore::load(storage);
    let config_model = Config::get(ConfigKey::Model);
    if !config_model.is_empty() && store.selected_model().is_empty() {
        store.select_model(&config_model);
    }
    let store = store.shared();

    let orchestrator = Orchestrator::new(backend.clone(), store.clone());
    let catalog = ModelCatalog::load(&backend, &store).await;

    return ui::start(backend, orchestrator, catalog).await;
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let file_appender = tracing_appender::rolling::never(cli::log_dir(), "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("diagnosis")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    match cli::parse().await {
        Ok(true) => {}
        Ok(false) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    }

    if let Err(err) = run().await {
        handle_error(err);
    }

    process::exit(0);
}
