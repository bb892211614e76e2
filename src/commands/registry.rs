use crate::commands::handler::CommandHandler;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    order: Vec<String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: CommandHandler + 'static>(&mut self, name: &str, command: C) {
        self.register_shared(name, Arc::new(command));
    }

    pub fn register_shared(&mut self, name: &str, command: Arc<dyn CommandHandler>) {
        if self.handlers.insert(name.to_string(), command).is_none() {
            self.order.push(name.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Command names in registration order.
    pub fn get_command_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// One usage line per distinct handler, in registration order.
    pub fn help_lines(&self) -> Vec<&'static str> {
        let mut lines: Vec<&'static str> = Vec::new();
        for name in &self.order {
            if let Some(handler) = self.handlers.get(name) {
                let line = handler.help();
                if !lines.contains(&line) {
                    lines.push(line);
                }
            }
        }
        lines
    }
}
