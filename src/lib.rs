// Library target exists to expose internal modules for integration tests
// and the xtask man page generator. The binary entry point is in main.rs.

pub mod cdp;
pub mod chrome;
pub mod cli;
pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod framework;
pub mod logging;
pub mod markdown;
pub mod paths;
pub mod session;
pub mod stealth;

pub use cli::command;
