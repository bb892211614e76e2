use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xchat::app::Application;
use xchat::cli::Args;
use xchat::config::ConfigStore;
use xchat::context::ChatContext;
use xchat::display::TerminalPresenter;
use xchat::providers::{HttpClient, Router};

/// Environment variable holding the log filter, e.g. `XCHAT_LOG=debug`.
const LOG_ENV: &str = "XCHAT_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();
    let store = ConfigStore::new(args.config.clone().unwrap_or_else(ConfigStore::default_path));
    let config = store.load();
    debug!(path = %store.path().display(), backend = %config.backend, "configuration loaded");

    let client = match HttpClient::new(config.request_timeout()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{} {}", style("Error:").bold().red(), e);
            return ExitCode::FAILURE;
        }
    };

    let export_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let ctx = ChatContext::new(
        store,
        config,
        Router::new(Arc::new(client)),
        Box::new(TerminalPresenter::new(export_dir)),
    );

    let mut app = Application::new(args, ctx);
    match app.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").bold().red(), e);
            ExitCode::FAILURE
        }
    }
}
