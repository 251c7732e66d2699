mod client;
mod error;
mod transport;
mod types;

pub use client::{CdpClient, CdpConfig, CdpSession};
pub use error::CdpError;
pub use types::CdpEvent;
