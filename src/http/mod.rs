pub mod models;
mod handlers;
pub mod server;

pub use handlers::StatusService;
pub use models::*;
