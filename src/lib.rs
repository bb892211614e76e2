pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod core;
pub mod display;
pub mod events;
pub mod executor;
pub mod exporter;
pub mod input;
pub mod providers;
pub mod session;
pub mod status;
pub mod utils;

#[cfg(test)]
mod testing;
