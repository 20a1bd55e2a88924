//! Host command surface over stdio

pub mod commands;
pub mod handler;
pub mod stdio;

pub use commands::{Command, CommandError, Outgoing, Request};
pub use handler::Host;
pub use stdio::serve;
