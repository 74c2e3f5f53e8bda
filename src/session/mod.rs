//! Durable sessions: record, store, and resolution.

mod file;
mod record;
mod resolver;
mod store;

pub use file::FileSessionStore;
pub use record::SessionRecord;
pub use resolver::{Resolution, ResolveError, SessionResolver, TurnMode};
pub use store::{SessionStore, StoreError, StoreResult};
