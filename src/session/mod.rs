//! Pending-session storage — which chats have supplied an email and await a body.

pub mod memory;
pub mod traits;

pub use memory::{InMemorySessionStore, spawn_expiry_task};
pub use traits::{PendingSession, SessionStore};
