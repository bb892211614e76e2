use crate::config::{Backend, ConfigOverrides};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Chat with a local or hosted language model", long_about = None)]
pub struct Args {
    /// Ask a single question and exit. Without it an interactive session starts.
    pub query: Option<String>,

    /// Backend to use for this session [possible values: openai-compatible, anthropic]
    #[arg(short, long, value_parser = parse_backend)]
    pub backend: Option<Backend>,

    /// Model to use for this session
    #[arg(short, long)]
    pub model: Option<String>,

    /// Endpoint URL for this session (OpenAI-compatible backend only)
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Read and write settings at this path instead of ~/.xchat/config.yaml
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_backend(name: &str) -> Result<Backend, String> {
    Backend::from_name(name).ok_or_else(|| format!("unknown backend '{}'", name))
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backend: self.backend,
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_overrides() {
        let args = Args::parse_from(["xchat", "--backend", "claude", "-m", "claude-x", "hi"]);
        assert_eq!(args.query.as_deref(), Some("hi"));
        assert_eq!(
            args.overrides(),
            ConfigOverrides {
                backend: Some(Backend::Anthropic),
                model: Some("claude-x".to_string()),
                endpoint: None,
            }
        );
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(Args::try_parse_from(["xchat", "--backend", "pigeon"]).is_err());
    }

    #[test]
    fn no_arguments_means_interactive() {
        let args = Args::parse_from(["xchat"]);
        assert!(args.query.is_none());
        assert!(args.overrides().is_empty());
    }
}
