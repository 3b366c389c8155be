//! CLI domain: parse, route, output, and presentation only.
//! No queue logic; a single route table dispatches to the queue and coordinator.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, DeadLetterCommands};
pub use presentation::QueueStatus;
pub use route::{command_name, RunContext};
