//! Versioned API handlers.

mod chat;
mod sessions;

pub use chat::chat;
pub use sessions::delete_session;
