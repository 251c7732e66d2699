mod discovery;
mod error;
mod launcher;
mod platform;
mod provision;

pub use discovery::{BrowserVersion, query_version};
pub use error::ChromeError;
pub use launcher::{
    ChromeProcess, LaunchConfig, browser_args, find_available_port, launch_chrome, terminate,
};
pub use platform::{CHROME_PATH_ENV, Platform, executable_override};
pub use provision::{ensure_browser, install};
