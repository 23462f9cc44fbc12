pub mod config;
pub mod daemon;
pub mod http;
pub mod refresh;
pub mod snapshot;
mod utils;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
