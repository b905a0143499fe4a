//! Application wiring and commands.

mod commands;
mod hooks;
mod init;

pub use commands::{await_purchase, force_refresh, logout, show_status};
pub use init::{build_services, SessionServices};
