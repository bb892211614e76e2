use crate::cli::Args;
use crate::commands::{CommandDispatcher, CommandOutcome, create_command_registry};
use crate::context::ChatContext;
use crate::core::error::ChatError;
use crate::input;
use crate::status::Status;
use console::style;
use is_terminal::IsTerminal;
use std::io::{self, Read};
use std::process::ExitCode;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct Application {
    args: Args,
    ctx: ChatContext,
    dispatcher: CommandDispatcher,
}

impl Application {
    /// Session overrides from the command line apply to this run only.
    pub fn new(args: Args, mut ctx: ChatContext) -> Self {
        let overrides = args.overrides();
        if !overrides.is_empty() {
            debug!(?overrides, "applying session overrides");
            ctx.apply_overrides(&overrides);
        }
        Self {
            args,
            ctx,
            dispatcher: create_command_registry(),
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode, ChatError> {
        let piped = if !io::stdin().is_terminal() {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| ChatError::Input(format!("Failed to read from stdin: {}", e)))?;
            Some(buffer).filter(|text| !text.trim().is_empty())
        } else {
            None
        };

        let result = match compose_query(self.args.query.as_deref(), piped.as_deref()) {
            Some(query) => self.handle_one_shot(&query).await.map(|answered| {
                if answered {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }),
            None => self.handle_interactive().await.map(|()| ExitCode::SUCCESS),
        };
        self.ctx.shutdown();
        result
    }

    /// Returns whether the backend produced a reply.
    async fn handle_one_shot(&mut self, query: &str) -> Result<bool, ChatError> {
        if !self.ctx.append_user(query) {
            return Err(ChatError::Input("No query provided".to_string()));
        }

        let watcher = watch_interrupt(self.ctx.cancellation_token());
        self.ctx.run_inference().await;
        watcher.abort();

        Ok(self.ctx.status() != Status::Error)
    }

    async fn handle_interactive(&mut self) -> Result<(), ChatError> {
        let config = self.ctx.config();
        println!(
            "{} {} · {}",
            style("xchat").bold().cyan(),
            config.backend,
            style(config.effective_model()).dim()
        );
        println!("Type /help for available commands. Press Ctrl+D or type /quit to exit.");

        let mut editor = input::create_editor(&self.dispatcher)?;

        while self.ctx.should_continue() {
            let Some(line) = input::read_input(&mut editor)? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            self.handle_line(&line).await;
        }

        if let Err(e) = input::save_history(&mut editor) {
            warn!(error = %e, "could not save input history");
        }
        Ok(())
    }

    /// Runs one line of input. Ctrl-C while it runs aborts the backend call
    /// without ending the session.
    async fn handle_line(&mut self, line: &str) {
        let watcher = watch_interrupt(self.ctx.cancellation_token());

        if self.dispatcher.dispatch(line, &mut self.ctx).await == CommandOutcome::NotCommand
            && self.ctx.append_user(line)
        {
            self.ctx.run_inference().await;
        }

        watcher.abort();
        self.ctx.reset_cancellation();
    }
}

fn watch_interrupt(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling request");
            token.cancel();
        }
    })
}

/// Combines the command-line question with piped input.
pub fn compose_query(query: Option<&str>, piped: Option<&str>) -> Option<String> {
    match (query, piped) {
        (Some(query), Some(piped)) => Some(format!("<pipe>{}</pipe>\n\n{}", piped, query)),
        (None, Some(piped)) => Some(format!("<pipe>{}</pipe>", piped)),
        (Some(query), None) => Some(query.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Backend, Config};
    use crate::testing::{RecordingTransport, harness};
    use serde_json::json;

    #[test]
    fn piped_input_is_wrapped_before_the_question() {
        assert_eq!(
            compose_query(Some("summarize"), Some("log line")),
            Some("<pipe>log line</pipe>\n\nsummarize".to_string())
        );
        assert_eq!(
            compose_query(None, Some("data")),
            Some("<pipe>data</pipe>".to_string())
        );
        assert_eq!(compose_query(Some("hi"), None), Some("hi".to_string()));
        assert_eq!(compose_query(None, None), None);
    }

    #[tokio::test]
    async fn chat_line_is_sent_and_command_line_is_not() {
        let h = harness(
            Config::default(),
            RecordingTransport::new()
                .respond_json(200, json!({"choices": [{"message": {"content": "pong"}}]})),
        );
        let transport = h.transport.clone();
        let mut app = Application::new(Args::default(), h.ctx);

        app.handle_line("/tokens 64").await;
        assert_eq!(transport.call_count(), 0);

        app.handle_line("ping").await;
        let sent = transport.single_request();
        assert_eq!(sent.payload["max_tokens"], json!(64));
        assert_eq!(app.ctx.session().messages().len(), 2);
    }

    #[tokio::test]
    async fn one_shot_failure_exits_non_zero() {
        let h = harness(Config::default(), RecordingTransport::new().respond(500, "down"));
        let mut app = Application::new(Args::default(), h.ctx);

        assert!(!app.handle_one_shot("hello").await.expect("ran"));
        assert!(app.ctx.session().messages()[1].is_error);
    }

    #[test]
    fn command_line_overrides_apply_to_session_only() {
        let h = harness(Config::default(), RecordingTransport::new());
        let args = Args {
            backend: Some(Backend::Anthropic),
            ..Default::default()
        };
        let app = Application::new(args, h.ctx);

        assert_eq!(app.ctx.config().backend, Backend::Anthropic);
        assert_eq!(h.store.load().backend, Backend::OpenAICompatible);
    }
}
