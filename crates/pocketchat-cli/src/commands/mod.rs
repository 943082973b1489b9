//! CLI commands.

pub mod chat;
pub mod model;
pub mod status;
