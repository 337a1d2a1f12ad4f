pub mod api;
pub mod artifact;
pub mod config;
pub mod environment;
pub mod error;
pub mod poller;
mod rate_window;
pub mod render;
pub mod session;
pub mod validate;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{Backend, DownloadHandle, HttpBackend};
pub use config::Config;
pub use error::ClientError;
pub use session::{Outcome, Session};
