pub mod api;
pub mod booking;
pub mod config;
pub mod error;
pub mod identity;
pub mod navigation;
pub mod notify;
pub mod paths;
pub mod state;

pub use config::ClientConfig;
pub use error::{AppError, AppResult, ErrorKind, GENERIC_RETRY_MESSAGE};
pub use state::AppState;
