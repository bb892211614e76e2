use crate::config::{Backend, parse_max_tokens, parse_temperature};
use crate::context::ChatContext;
use crate::core::error::ChatError;
use crate::events::Panel;
use async_trait::async_trait;

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        args: &str,
    ) -> Result<Option<String>, ChatError>;

    fn help(&self) -> &'static str;
}

pub struct HelpCommand {
    lines: Vec<&'static str>,
}
pub struct SettingsCommand;
pub struct ClearCommand;
pub struct ModelCommand;
pub struct SystemCommand;
pub struct TempCommand;
pub struct TokensCommand;
pub struct RetryCommand;
pub struct ExportCommand;
pub struct SetCommand;
pub struct TestCommand;
pub struct RunCommand;
pub struct QuitCommand;

impl HelpCommand {
    pub const USAGE: &'static str = "/help - Show or hide available commands";

    pub fn new(lines: Vec<&'static str>) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        _args: &str,
    ) -> Result<Option<String>, ChatError> {
        if !ctx.toggle_panel(Panel::Help) {
            return Ok(None);
        }
        let mut text = vec!["Available commands:"];
        text.extend(self.lines.iter().copied());
        Ok(Some(text.join("\n")))
    }

    fn help(&self) -> &'static str {
        Self::USAGE
    }
}

fn mask_credential(credential: Option<&str>) -> String {
    match credential {
        None => "not set".to_string(),
        Some(key) => {
            let tail: String = key
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            if key.chars().count() > 8 {
                format!("set (…{})", tail)
            } else {
                "set".to_string()
            }
        }
    }
}

#[async_trait]
impl CommandHandler for SettingsCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        _args: &str,
    ) -> Result<Option<String>, ChatError> {
        if !ctx.toggle_panel(Panel::Settings) {
            return Ok(None);
        }

        let config = ctx.config();
        let temperature = if config.effective_temperature() < config.temperature {
            format!(
                "{} (sent as {})",
                config.temperature,
                config.effective_temperature()
            )
        } else {
            config.temperature.to_string()
        };
        let lines = [
            "Settings:".to_string(),
            format!("  backend      {}", config.backend),
            format!("  endpoint     {}", config.effective_endpoint()),
            format!("  model        {}", config.effective_model()),
            format!(
                "  api key      {}",
                mask_credential(config.effective_credential())
            ),
            format!("  temperature  {}", temperature),
            format!("  max tokens   {}", config.max_tokens),
            format!("  executor     {}", config.effective_executor_endpoint()),
            format!("  file         {}", ctx.config_path().display()),
            "Change with /set <backend|endpoint|key|model> <value>, then /test.".to_string(),
        ];
        Ok(Some(lines.join("\n")))
    }

    fn help(&self) -> &'static str {
        "/settings - Show or hide the current settings"
    }
}

#[async_trait]
impl CommandHandler for ClearCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        _args: &str,
    ) -> Result<Option<String>, ChatError> {
        ctx.clear();
        Ok(Some("Conversation cleared.".to_string()))
    }

    fn help(&self) -> &'static str {
        "/clear - Clear the conversation"
    }
}

#[async_trait]
impl CommandHandler for ModelCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        _args: &str,
    ) -> Result<Option<String>, ChatError> {
        let config = ctx.config();
        Ok(Some(format!(
            "Backend: {}\nModel: {}\nEndpoint: {}",
            config.backend,
            config.effective_model(),
            config.effective_endpoint()
        )))
    }

    fn help(&self) -> &'static str {
        "/model - Show the current backend, model and endpoint"
    }
}

#[async_trait]
impl CommandHandler for SystemCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        args: &str,
    ) -> Result<Option<String>, ChatError> {
        if args.is_empty() {
            let prompt = &ctx.config().system_prompt;
            return Ok(Some(if prompt.trim().is_empty() {
                "System prompt: (none)".to_string()
            } else {
                format!("System prompt: {}", prompt)
            }));
        }

        let prompt = args.to_string();
        ctx.update_config(|config| config.system_prompt = prompt.clone())?;
        Ok(Some("System prompt updated.".to_string()))
    }

    fn help(&self) -> &'static str {
        "/system [text] - Show or set the system prompt"
    }
}

#[async_trait]
impl CommandHandler for TempCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        args: &str,
    ) -> Result<Option<String>, ChatError> {
        if args.is_empty() {
            return Ok(Some(format!("Temperature: {}", ctx.config().temperature)));
        }

        let value = parse_temperature(args)?;
        ctx.update_config(|config| config.temperature = value)?;

        let backend = ctx.config().backend;
        match backend.temperature_ceiling() {
            Some(ceiling) if value > ceiling => {
                ctx.notice(format!("Temperature set to {}", value));
                Ok(Some(format!(
                    "Note: the {} backend accepts at most {:.1}; requests will be sent with {:.1}.",
                    backend, ceiling, ceiling
                )))
            }
            _ => Ok(Some(format!("Temperature set to {}", value))),
        }
    }

    fn help(&self) -> &'static str {
        "/temp [0-2] - Show or set the sampling temperature"
    }
}

#[async_trait]
impl CommandHandler for TokensCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        args: &str,
    ) -> Result<Option<String>, ChatError> {
        if args.is_empty() {
            return Ok(Some(format!("Max tokens: {}", ctx.config().max_tokens)));
        }

        let value = parse_max_tokens(args)?;
        ctx.update_config(|config| config.max_tokens = value)?;
        Ok(Some(format!("Max tokens set to {}", value)))
    }

    fn help(&self) -> &'static str {
        "/tokens [n] - Show or set the reply token budget"
    }
}

#[async_trait]
impl CommandHandler for RetryCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        _args: &str,
    ) -> Result<Option<String>, ChatError> {
        ctx.retry_last().await;
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "/retry - Resend the last message"
    }
}

#[async_trait]
impl CommandHandler for ExportCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        _args: &str,
    ) -> Result<Option<String>, ChatError> {
        ctx.export();
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "/export - Save the conversation to a text file"
    }
}

#[async_trait]
impl CommandHandler for SetCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        args: &str,
    ) -> Result<Option<String>, ChatError> {
        let (field, value) = match args.split_once(char::is_whitespace) {
            Some((field, value)) => (field, value.trim()),
            None => (args, ""),
        };
        let optional = (!value.is_empty()).then(|| value.to_string());

        match field.to_lowercase().as_str() {
            "backend" => {
                let backend = Backend::from_name(value).ok_or_else(|| {
                    ChatError::Validation(format!(
                        "unknown backend '{}' (use openai-compatible or anthropic)",
                        value
                    ))
                })?;
                ctx.update_config(|config| config.backend = backend)?;
                let config = ctx.config();
                let mut reply = format!(
                    "Backend set to {} (model {})",
                    backend,
                    config.effective_model()
                );
                if backend == Backend::Anthropic && config.effective_credential().is_none() {
                    reply.push_str(". Set an API key with /set key <key>.");
                }
                Ok(Some(reply))
            }
            "endpoint" => {
                ctx.update_config(|config| config.endpoint = optional.clone())?;
                Ok(Some(format!(
                    "Endpoint: {}",
                    ctx.config().effective_endpoint()
                )))
            }
            "key" | "credential" => {
                let cleared = optional.is_none();
                ctx.update_config(|config| config.credential = optional.clone())?;
                Ok(Some(
                    if cleared {
                        "API key cleared."
                    } else {
                        "API key saved."
                    }
                    .to_string(),
                ))
            }
            "model" => {
                ctx.update_config(|config| config.model = optional.clone())?;
                Ok(Some(format!("Model: {}", ctx.config().effective_model())))
            }
            "" => Err(ChatError::Input(self.help().to_string())),
            other => Err(ChatError::Validation(format!(
                "unknown setting '{}'",
                other
            ))),
        }
    }

    fn help(&self) -> &'static str {
        "/set <backend|endpoint|key|model> [value] - Change and save a setting"
    }
}

#[async_trait]
impl CommandHandler for TestCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        _args: &str,
    ) -> Result<Option<String>, ChatError> {
        ctx.test_connection().await;
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "/test - Save settings and check the backend connection"
    }
}

#[async_trait]
impl CommandHandler for RunCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        args: &str,
    ) -> Result<Option<String>, ChatError> {
        ctx.run_code(args).await?;
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "/run <code> - Execute Python code in the sandbox service"
    }
}

#[async_trait]
impl CommandHandler for QuitCommand {
    async fn execute(
        &self,
        ctx: &mut ChatContext,
        _args: &str,
    ) -> Result<Option<String>, ChatError> {
        ctx.request_quit();
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "/quit - Exit the chat session"
    }
}
